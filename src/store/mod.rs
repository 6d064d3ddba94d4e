//! Document store abstraction.
//!
//! Records are JSON objects addressed by collection name and an opaque document id.
//! Each document also carries a store-managed `version` that starts at 1 and grows by one
//! per update; conditional updates compare against it. Atomicity is per document only.

mod memory;
mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::{init_database, SqliteDocumentStore};

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::AppError;

/// Field map of a stored record.
pub type Record = Map<String, Value>;

/// A stored record together with its store-assigned metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version: i64,
    pub fields: Record,
}

/// A single field-level mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Replace the field value.
    Set(Value),
    /// Add to a numeric field, treating a missing field as 0.
    Increment(i64),
    /// Append each value not already present in the array field.
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of each value from the array field.
    ArrayRemove(Vec<Value>),
}

/// Partial update applied atomically to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub ops: Vec<(String, FieldOp)>,
    /// When set, the update only applies if the document is still at this version.
    pub expected_version: Option<i64>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push((field.to_string(), FieldOp::Set(value.into())));
        self
    }

    pub fn increment(mut self, field: &str, by: i64) -> Self {
        self.ops.push((field.to_string(), FieldOp::Increment(by)));
        self
    }

    pub fn array_union(mut self, field: &str, values: Vec<Value>) -> Self {
        self.ops.push((field.to_string(), FieldOp::ArrayUnion(values)));
        self
    }

    pub fn array_remove(mut self, field: &str, values: Vec<Value>) -> Self {
        self.ops.push((field.to_string(), FieldOp::ArrayRemove(values)));
        self
    }

    pub fn if_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Comparison used by a query predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Field equals the value.
    Eq,
    /// Array field contains the value.
    ArrayContains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: Comparison,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Predicate query over one collection. All predicates must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            field: field.to_string(),
            op: Comparison::Eq,
            value: value.into(),
        });
        self
    }

    pub fn array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            field: field.to_string(),
            op: Comparison::ArrayContains,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Persistence contract consumed by the engine.
///
/// Implementations never retry; failures surface as `StoreUnavailable` or
/// `PermissionDenied`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new record and return its assigned id.
    async fn create(&self, collection: &str, fields: Record) -> Result<String, AppError>;

    /// Point read.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError>;

    /// Apply a partial update to one document.
    ///
    /// Fails with `NotFound` if the document is absent and with `Conflict` if
    /// `expected_version` no longer matches.
    async fn update(&self, collection: &str, id: &str, update: &Update) -> Result<(), AppError>;

    /// Predicate query with optional ordering and limit.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, AppError>;

    fn backend_name(&self) -> &'static str;
}

/// Apply field operations to a record in place.
pub(crate) fn apply_ops(fields: &mut Record, ops: &[(String, FieldOp)]) -> Result<(), AppError> {
    for (field, op) in ops {
        match op {
            FieldOp::Set(value) => {
                fields.insert(field.clone(), value.clone());
            }
            FieldOp::Increment(by) => {
                let current = match fields.get(field) {
                    None | Some(Value::Null) => 0,
                    Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                        AppError::Validation(format!("Field {} is not an integer", field))
                    })?,
                    Some(_) => {
                        return Err(AppError::Validation(format!(
                            "Cannot increment non-numeric field {}",
                            field
                        )))
                    }
                };
                let next = current.checked_add(*by).ok_or_else(|| {
                    AppError::Validation(format!("Increment overflows field {}", field))
                })?;
                fields.insert(field.clone(), Value::from(next));
            }
            FieldOp::ArrayUnion(values) => {
                let items = array_field(fields, field)?;
                for value in values {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
            }
            FieldOp::ArrayRemove(values) => {
                let items = array_field(fields, field)?;
                items.retain(|item| !values.contains(item));
            }
        }
    }
    Ok(())
}

fn array_field<'a>(fields: &'a mut Record, field: &str) -> Result<&'a mut Vec<Value>, AppError> {
    let slot = fields
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| AppError::Validation(format!("Field {} is not an array", field)))
}

/// Whether a record satisfies a predicate.
pub(crate) fn matches(fields: &Record, predicate: &Predicate) -> bool {
    let Some(value) = fields.get(&predicate.field) else {
        return false;
    };
    match predicate.op {
        Comparison::Eq => value == &predicate.value,
        Comparison::ArrayContains => value
            .as_array()
            .map(|items| items.contains(&predicate.value))
            .unwrap_or(false),
    }
}

/// Total order over JSON scalars used for `order_by`; missing or null sorts first.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
