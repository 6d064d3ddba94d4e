//! In-memory implementation of the document store.
//!
//! Collections are `HashMap`s guarded by a single `tokio::sync::RwLock`. Nothing is durable;
//! this backend exists for tests and for throwaway local runs (`HACKMATE_STORE=memory`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    apply_ops, compare_values, matches, Direction, Document, DocumentStore, Query, Record, Update,
};
use crate::errors::AppError;

type Collection = HashMap<String, Document>;

/// In-memory document store.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    #[cfg(test)]
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Insert or replace a raw document, bypassing id assignment.
    #[cfg(test)]
    pub async fn put_raw(&self, collection: &str, id: &str, fields: Record) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(
                id.to_string(),
                Document {
                    id: id.to_string(),
                    version: 1,
                    fields,
                },
            );
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: &str, fields: Record) -> Result<String, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().insert(
            id.clone(),
            Document {
                id: id.clone(),
                version: 1,
                fields,
            },
        );
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn update(&self, collection: &str, id: &str, update: &Update) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| {
                AppError::NotFound(format!("Document {}/{} not found", collection, id))
            })?;

        if let Some(expected) = update.expected_version {
            if document.version != expected {
                return Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, document.version
                    ),
                    current_version: document.version,
                });
            }
        }

        // Apply to a copy so a failing op leaves the document untouched.
        let mut fields = document.fields.clone();
        apply_ops(&mut fields, &update.ops)?;
        document.fields = fields;
        document.version += 1;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, AppError> {
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<Document> = documents
            .values()
            .filter(|doc| query.predicates.iter().all(|p| matches(&doc.fields, p)))
            .cloned()
            .collect();

        if let Some(order) = &query.order_by {
            results.sort_by(|a, b| {
                let ordering =
                    compare_values(a.fields.get(&order.field), b.fields.get(&order.field));
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
