//! Join request model.

use serde::{Deserialize, Serialize};

use super::{decode_document, encode_record};
use crate::errors::AppError;
use crate::store::{Document, Record};

/// Collection holding join request records.
pub const JOIN_REQUESTS: &str = "joinRequests";

pub const JOIN_REQUEST_SCHEMA_VERSION: i32 = 1;

/// Lifecycle state of a join request. Only `Pending` may transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A principal's ask to join an idea's team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: String,
    pub schema_version: i32,
    pub idea_id: String,
    pub idea_title: String,
    pub requester_id: String,
    pub requester_email: String,
    pub requester_name: String,
    pub owner_id: String,
    pub owner_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: RequestStatus,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<String>,
    /// Store document version, used for conditional writes
    #[serde(default)]
    pub version: i64,
}

impl JoinRequest {
    pub fn from_document(document: Document) -> Result<Self, AppError> {
        decode_document(document, "JoinRequest", JOIN_REQUEST_SCHEMA_VERSION)
    }

    pub fn to_record(&self) -> Result<Record, AppError> {
        encode_record(self)
    }
}

/// Request body for sending a join request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendJoinRequest {
    #[serde(default)]
    pub message: Option<String>,
}
