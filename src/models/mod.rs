//! Data models for the HackMate idea board.
//!
//! Stored records are camelCase JSON, matching what the browser front-end reads.

mod idea;
mod join_request;

pub use idea::*;
pub use join_request::*;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::AppError;
use crate::store::{Document, Record};

/// Current UTC time in fixed-width RFC 3339 form, so lexical order equals time order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored document into an entity, validating its schema version.
///
/// Store metadata (`id`, `version`) is merged into the field map before decoding.
pub(crate) fn decode_document<T: DeserializeOwned>(
    document: Document,
    kind: &str,
    schema_version: i32,
) -> Result<T, AppError> {
    let found = document
        .fields
        .get("schemaVersion")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if found != schema_version as i64 {
        return Err(AppError::InvalidRecord(format!(
            "{} {} has schema version {}, expected {}",
            kind, document.id, found, schema_version
        )));
    }

    let id = document.id.clone();
    let mut fields = document.fields;
    fields.insert("id".to_string(), Value::String(document.id));
    fields.insert("version".to_string(), Value::from(document.version));

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::InvalidRecord(format!("{} {} is malformed: {}", kind, id, e)))
}

/// Encode an entity into a record, dropping store-managed metadata.
pub(crate) fn encode_record<T: serde::Serialize>(entity: &T) -> Result<Record, AppError> {
    match serde_json::to_value(entity)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            fields.remove("version");
            Ok(fields)
        }
        _ => Err(AppError::Internal("Entity did not encode to an object".to_string())),
    }
}
