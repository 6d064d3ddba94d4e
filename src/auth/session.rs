//! Session bookkeeping and the institutional email-domain policy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::AppError;
use crate::identity::{AuthEvent, Credential, IdentityProvider, Principal, Subscription};

/// Restricts sign-in to one email domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPolicy {
    allowed_domain: Option<String>,
}

impl DomainPolicy {
    /// `None` allows every domain.
    pub fn new(allowed_domain: Option<String>) -> Self {
        Self {
            allowed_domain: allowed_domain.map(|d| d.trim_start_matches('@').to_ascii_lowercase()),
        }
    }

    pub fn allows(&self, email: &str) -> bool {
        let Some(allowed) = &self.allowed_domain else {
            return true;
        };
        email
            .rsplit_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.eq_ignore_ascii_case(allowed))
            .unwrap_or(false)
    }

    pub fn check(&self, principal: &Principal) -> Result<(), AppError> {
        if self.allows(&principal.email) {
            return Ok(());
        }
        let domain = self.allowed_domain.as_deref().unwrap_or_default();
        Err(AppError::AccessRestricted(format!(
            "Access Restricted: only @{} emails are allowed",
            domain
        )))
    }
}

type SessionTable = Arc<RwLock<HashMap<String, Principal>>>;

/// Issues bearer tokens for signed-in principals.
///
/// Registers once with the identity provider at construction so that provider-side
/// sign-outs revoke every token of that principal.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    policy: DomainPolicy,
    sessions: SessionTable,
    _subscription: Subscription,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, policy: DomainPolicy) -> Self {
        let sessions: SessionTable = Arc::new(RwLock::new(HashMap::new()));

        let listener_sessions = sessions.clone();
        let listener_policy = policy.clone();
        let listener_provider = provider.clone();
        let subscription = provider.on_auth_change(Box::new(move |event| match event {
            AuthEvent::SignedOut(principal_id) => {
                let revoked = revoke_principal(&listener_sessions, &principal_id);
                if revoked > 0 {
                    tracing::info!("Revoked {} session(s) for {}", revoked, principal_id);
                }
            }
            AuthEvent::SignedIn(principal) => {
                // Provider sessions opened outside `sign_in` are held to the same policy.
                if let Err(err) = listener_policy.check(&principal) {
                    tracing::warn!("{} for {}; signing out", err.message(), principal.email);
                    revoke_principal(&listener_sessions, &principal.id);
                    let provider = listener_provider.clone();
                    tokio::spawn(async move {
                        if let Err(err) = provider.sign_out(&principal.id).await {
                            tracing::warn!("Forced sign-out of {} failed: {}", principal.id, err);
                        }
                    });
                }
            }
        }));

        Self {
            provider,
            policy,
            sessions,
            _subscription: subscription,
        }
    }

    /// Sign in through the provider and open a session.
    ///
    /// A principal outside the allowed domain is signed straight back out and gets
    /// `AccessRestricted`.
    pub async fn sign_in(&self, credential: &Credential) -> Result<(String, Principal), AppError> {
        let principal = self.provider.sign_in(credential).await?;

        if let Err(err) = self.policy.check(&principal) {
            tracing::warn!("Rejected sign-in from {}: outside allowed domain", principal.email);
            self.provider.sign_out(&principal.id).await?;
            return Err(err);
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        write_sessions(&self.sessions).insert(token.clone(), principal.clone());
        Ok((token, principal))
    }

    /// Close one session; the provider session ends once no tokens remain.
    pub async fn sign_out(&self, token: &str) -> Result<(), AppError> {
        let (principal, remaining) = {
            let mut sessions = write_sessions(&self.sessions);
            let Some(principal) = sessions.remove(token) else {
                return Ok(());
            };
            let remaining = sessions.values().filter(|p| p.id == principal.id).count();
            (principal, remaining)
        };

        if remaining == 0 {
            self.provider.sign_out(&principal.id).await?;
        }
        Ok(())
    }

    /// Resolve a bearer token to its principal.
    pub fn principal(&self, token: &str) -> Option<Principal> {
        read_sessions(&self.sessions).get(token).cloned()
    }

    pub fn active_sessions(&self) -> usize {
        read_sessions(&self.sessions).len()
    }
}

fn read_sessions(
    sessions: &SessionTable,
) -> std::sync::RwLockReadGuard<'_, HashMap<String, Principal>> {
    sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_sessions(
    sessions: &SessionTable,
) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Principal>> {
    sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn revoke_principal(sessions: &SessionTable, principal_id: &str) -> usize {
    let mut sessions = write_sessions(sessions);
    let before = sessions.len();
    sessions.retain(|_, p| p.id != principal_id);
    before - sessions.len()
}
