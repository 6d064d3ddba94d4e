//! Identity provider contract.
//!
//! The provider authenticates principals and broadcasts session changes. It applies no
//! policy of its own; the email-domain restriction lives in the session layer.

mod directory;

pub use directory::{Account, DirectoryIdentityProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::errors::AppError;

/// An authenticated identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

/// Sign-in credential presented to the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub email: String,
    pub access_key: String,
}

/// Session state change emitted by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Principal),
    SignedOut(String),
}

pub type AuthListener = Box<dyn Fn(AuthEvent) + Send + Sync + 'static>;

/// Handle for an auth-change registration. Delivery stops on `cancel` or drop.
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate a credential. Fails with `AuthFailed` when denied.
    async fn sign_in(&self, credential: &Credential) -> Result<Principal, AppError>;

    /// End the provider session for a principal. Signing out twice is harmless.
    async fn sign_out(&self, principal_id: &str) -> Result<(), AppError>;

    /// Register a listener for session changes.
    ///
    /// Delivery order relative to in-flight engine calls is not guaranteed.
    fn on_auth_change(&self, listener: AuthListener) -> Subscription;
}
