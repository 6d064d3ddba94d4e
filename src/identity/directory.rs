//! Account-directory identity provider.
//!
//! Accounts come from a JSON file of `{ id, email, displayName, accessKey }` entries.
//! Access keys are compared in constant time to mitigate timing attacks.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tokio::sync::{broadcast, Mutex};

use super::{AuthEvent, AuthListener, Credential, IdentityProvider, Principal, Subscription};
use crate::errors::AppError;

const EVENT_BUFFER: usize = 64;

/// A directory entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub access_key: String,
}

impl Account {
    fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Identity provider backed by a fixed account directory.
pub struct DirectoryIdentityProvider {
    accounts: Vec<Account>,
    signed_in: Mutex<HashSet<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl DirectoryIdentityProvider {
    pub fn new(accounts: Vec<Account>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            accounts,
            signed_in: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Load the directory from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, AppError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Config(format!("Cannot read accounts file {:?}: {}", path, e))
        })?;
        let accounts: Vec<Account> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("Invalid accounts file {:?}: {}", path, e))
        })?;
        Ok(Self::new(accounts))
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for DirectoryIdentityProvider {
    async fn sign_in(&self, credential: &Credential) -> Result<Principal, AppError> {
        let email = credential.email.trim();
        let account = self
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .filter(|a| constant_time_compare(&a.access_key, &credential.access_key))
            .ok_or_else(|| AppError::AuthFailed("Invalid email or access key".to_string()))?;

        let principal = account.principal();
        self.signed_in.lock().await.insert(principal.id.clone());
        tracing::info!("Principal {} signed in", principal.id);
        self.publish(AuthEvent::SignedIn(principal.clone()));
        Ok(principal)
    }

    async fn sign_out(&self, principal_id: &str) -> Result<(), AppError> {
        let was_signed_in = self.signed_in.lock().await.remove(principal_id);
        if was_signed_in {
            tracing::info!("Principal {} signed out", principal_id);
            self.publish(AuthEvent::SignedOut(principal_id.to_string()));
        }
        Ok(())
    }

    fn on_auth_change(&self, listener: AuthListener) -> Subscription {
        let mut receiver = self.events.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => listener(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Auth listener lagged, {} events dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription::new(task)
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    a_bytes.ct_eq(b_bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn provider() -> DirectoryIdentityProvider {
        DirectoryIdentityProvider::new(vec![Account {
            id: "u-1".to_string(),
            email: "asha@nitp.ac.in".to_string(),
            display_name: "Asha".to_string(),
            access_key: "key-1".to_string(),
        }])
    }

    fn credential(email: &str, key: &str) -> Credential {
        Credential {
            email: email.to_string(),
            access_key: key.to_string(),
        }
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare("short", "much-longer-key"));
    }

    #[tokio::test]
    async fn test_sign_in_matches_email_case_insensitively() {
        let provider = provider();
        let principal = provider
            .sign_in(&credential(" ASHA@nitp.ac.in", "key-1"))
            .await
            .unwrap();
        assert_eq!(principal.id, "u-1");
        assert_eq!(principal.display_name, "Asha");
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_key_and_unknown_email() {
        let provider = provider();
        let err = provider
            .sign_in(&credential("asha@nitp.ac.in", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthFailed(_)));

        let err = provider
            .sign_in(&credential("nobody@nitp.ac.in", "key-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_listener_receives_events_until_cancelled() {
        let provider = Arc::new(provider());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = provider.on_auth_change(Box::new(move |event| {
            let _ = tx.send(event);
        }));
        assert!(subscription.is_active());

        provider
            .sign_in(&credential("asha@nitp.ac.in", "key-1"))
            .await
            .unwrap();
        provider.sign_out("u-1").await.unwrap();
        // Second sign-out is a no-op and emits nothing.
        provider.sign_out("u-1").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, AuthEvent::SignedIn(ref p) if p.id == "u-1"));
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::SignedOut("u-1".to_string()));

        subscription.cancel();
        provider
            .sign_in(&credential("asha@nitp.ac.in", "key-1"))
            .await
            .unwrap();
        let after_cancel = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        // Either nothing arrives or the sender was dropped with the aborted task.
        assert!(!matches!(after_cancel, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_load_reads_accounts_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        tokio::fs::write(
            &path,
            r#"[{"id":"u-9","email":"ravi@nitp.ac.in","displayName":"Ravi","accessKey":"k"}]"#,
        )
        .await
        .unwrap();

        let provider = DirectoryIdentityProvider::load(&path).await.unwrap();
        assert_eq!(provider.account_count(), 1);

        let err = DirectoryIdentityProvider::load(&dir.path().join("missing.json"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}
