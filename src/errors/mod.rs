//! Error handling module for the HackMate backend.
//!
//! Every failure the engine, the store or the session layer can produce is a distinct
//! `AppError` variant so the front-end can pick a specific affordance for it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const ACCESS_RESTRICTED: &str = "ACCESS_RESTRICTED";
    pub const NOT_AUTHORIZED: &str = "NOT_AUTHORIZED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const SELF_JOIN_FORBIDDEN: &str = "SELF_JOIN_FORBIDDEN";
    pub const ALREADY_MEMBER: &str = "ALREADY_MEMBER";
    pub const TEAM_FULL: &str = "TEAM_FULL";
    pub const DUPLICATE_REQUEST: &str = "DUPLICATE_REQUEST";
    pub const ALREADY_DECIDED: &str = "ALREADY_DECIDED";
    pub const OWNER_REMOVAL_FORBIDDEN: &str = "OWNER_REMOVAL_FORBIDDEN";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const INVALID_RECORD: &str = "INVALID_RECORD";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// No authenticated principal
    Unauthenticated(String),
    /// The identity provider denied or cancelled sign-in
    AuthFailed(String),
    /// Principal is outside the allowed email domain
    AccessRestricted(String),
    /// Principal is authenticated but may not perform the action
    NotAuthorized(String),
    /// The document store refused the operation
    PermissionDenied(String),
    /// Resource not found
    NotFound(String),
    /// Idea authors cannot request to join their own team
    SelfJoinForbidden(String),
    /// Requester is already on the team
    AlreadyMember(String),
    /// Team roster is at capacity
    TeamFull(String),
    /// A pending request already exists for this idea and requester
    DuplicateRequest(String),
    /// Join request was already approved or rejected
    AlreadyDecided(String),
    /// The author cannot be removed from their own team
    OwnerRemovalForbidden(String),
    /// Optimistic concurrency conflict
    Conflict {
        message: String,
        current_version: i64,
    },
    /// Validation error
    Validation(String),
    /// Bad request
    BadRequest(String),
    /// Document store could not be reached
    StoreUnavailable(String),
    /// Stored record does not match the expected schema
    InvalidRecord(String),
    /// Invalid configuration
    Config(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) | AppError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessRestricted(_)
            | AppError::NotAuthorized(_)
            | AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SelfJoinForbidden(_)
            | AppError::AlreadyMember(_)
            | AppError::TeamFull(_)
            | AppError::DuplicateRequest(_)
            | AppError::AlreadyDecided(_)
            | AppError::OwnerRemovalForbidden(_)
            | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidRecord(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => codes::UNAUTHENTICATED,
            AppError::AuthFailed(_) => codes::AUTH_FAILED,
            AppError::AccessRestricted(_) => codes::ACCESS_RESTRICTED,
            AppError::NotAuthorized(_) => codes::NOT_AUTHORIZED,
            AppError::PermissionDenied(_) => codes::PERMISSION_DENIED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::SelfJoinForbidden(_) => codes::SELF_JOIN_FORBIDDEN,
            AppError::AlreadyMember(_) => codes::ALREADY_MEMBER,
            AppError::TeamFull(_) => codes::TEAM_FULL,
            AppError::DuplicateRequest(_) => codes::DUPLICATE_REQUEST,
            AppError::AlreadyDecided(_) => codes::ALREADY_DECIDED,
            AppError::OwnerRemovalForbidden(_) => codes::OWNER_REMOVAL_FORBIDDEN,
            AppError::Conflict { .. } => codes::VERSION_MISMATCH,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::StoreUnavailable(_) => codes::STORE_UNAVAILABLE,
            AppError::InvalidRecord(_) => codes::INVALID_RECORD,
            AppError::Config(_) => codes::CONFIG_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthenticated(msg)
            | AppError::AuthFailed(msg)
            | AppError::AccessRestricted(msg)
            | AppError::NotAuthorized(msg)
            | AppError::PermissionDenied(msg)
            | AppError::NotFound(msg)
            | AppError::SelfJoinForbidden(msg)
            | AppError::AlreadyMember(msg)
            | AppError::TeamFull(msg)
            | AppError::DuplicateRequest(msg)
            | AppError::AlreadyDecided(msg)
            | AppError::OwnerRemovalForbidden(msg)
            | AppError::Validation(msg)
            | AppError::BadRequest(msg)
            | AppError::StoreUnavailable(msg)
            | AppError::InvalidRecord(msg)
            | AppError::Config(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Conflict { message, .. } => message.clone(),
        }
    }

    /// Whether the caller may reasonably retry the same operation.
    ///
    /// The engine never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable(_) | AppError::Conflict { .. }
        )
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

// SQLite primary result codes for SQLITE_PERM, SQLITE_READONLY and SQLITE_AUTH.
const SQLITE_PERMISSION_CODES: [i32; 3] = [3, 8, 23];

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Store error: {:?}", err);
        if let sqlx::Error::Database(db_err) = &err {
            // sqlx reports extended result codes; the low byte is the primary code.
            let denied = db_err
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| SQLITE_PERMISSION_CODES.contains(&(c & 0xff)))
                .unwrap_or(false);
            if denied {
                return AppError::PermissionDenied(format!("Store refused operation: {}", err));
            }
        }
        AppError::StoreUnavailable(format!("Store error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::Conflict {
                current_version, ..
            } => Some(serde_json::json!({
                "currentVersion": current_version,
                "retryable": true,
            })),
            AppError::StoreUnavailable(_) => Some(serde_json::json!({ "retryable": true })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_conflict() {
        let errors = [
            AppError::SelfJoinForbidden("x".into()),
            AppError::AlreadyMember("x".into()),
            AppError::TeamFull("x".into()),
            AppError::DuplicateRequest("x".into()),
            AppError::AlreadyDecided("x".into()),
            AppError::OwnerRemovalForbidden("x".into()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::CONFLICT, "{}", err);
        }
    }

    #[test]
    fn test_only_store_and_version_errors_are_retryable() {
        assert!(AppError::StoreUnavailable("down".into()).is_retryable());
        assert!(AppError::Conflict {
            message: "changed".into(),
            current_version: 3
        }
        .is_retryable());
        assert!(!AppError::TeamFull("full".into()).is_retryable());
        assert!(!AppError::PermissionDenied("no".into()).is_retryable());
    }

    #[test]
    fn test_error_response_envelope() {
        let body = ErrorResponse::new(&AppError::Conflict {
            message: "Concurrent modification detected".into(),
            current_version: 7,
        });
        assert!(!body.success);
        assert_eq!(body.error.code, codes::VERSION_MISMATCH);
        let details = body.error.details.unwrap();
        assert_eq!(details["currentVersion"], 7);
        assert_eq!(details["retryable"], true);
    }

    #[test]
    fn test_display_includes_code() {
        let err = AppError::AccessRestricted("Only @nitp.ac.in emails are allowed".into());
        assert_eq!(
            err.to_string(),
            "ACCESS_RESTRICTED: Only @nitp.ac.in emails are allowed"
        );
    }
}
