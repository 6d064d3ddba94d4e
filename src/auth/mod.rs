//! Bearer-session authentication layer.
//!
//! Resolves the session token on every API request into a `Caller` extension. Handlers
//! pass the caller's principal explicitly into the engine.

mod session;

pub use session::{DomainPolicy, SessionManager};

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;
use crate::identity::Principal;

/// Alternate header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// The principal behind the current request, if any.
#[derive(Debug, Clone)]
pub struct Caller {
    pub principal: Option<Principal>,
    pub token: Option<String>,
}

impl Caller {
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The authenticated principal, or `Unauthenticated`.
    pub fn require(&self) -> Result<&Principal, AppError> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::Unauthenticated("Sign in required".to_string()))
    }
}

/// Extract the session token from `x-session-token` or an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let direct = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string());
    if direct.is_some() {
        return direct;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

/// Session layer function that takes the session manager as a parameter.
///
/// A missing token yields an anonymous caller; a token that does not resolve is rejected
/// outright with `Unauthenticated`.
pub async fn session_auth_layer(
    sessions: Arc<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = session_token(request.headers());

    let principal = match &token {
        Some(token) => match sessions.principal(token) {
            Some(principal) => Some(principal),
            None => {
                return AppError::Unauthenticated("Session expired or invalid".to_string())
                    .into_response()
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Caller { principal, token });
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Account, Credential, DirectoryIdentityProvider};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    async fn whoami(Extension(caller): Extension<Caller>) -> String {
        caller
            .principal()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    async fn app() -> (Router, String) {
        let provider = Arc::new(DirectoryIdentityProvider::new(vec![Account {
            id: "asha".to_string(),
            email: "asha@nitp.ac.in".to_string(),
            display_name: "Asha".to_string(),
            access_key: "k".to_string(),
        }]));
        let sessions = Arc::new(SessionManager::new(provider, DomainPolicy::new(None)));
        let (token, _) = sessions
            .sign_in(&Credential {
                email: "asha@nitp.ac.in".to_string(),
                access_key: "k".to_string(),
            })
            .await
            .unwrap();

        let router = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn(move |req, next| {
                session_auth_layer(sessions.clone(), req, next)
            }));
        (router, token)
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_session_token_prefers_session_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-bearer".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("from-bearer"));

        headers.insert(SESSION_HEADER, "from-header".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));

        assert!(session_token(&HeaderMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_layer_resolves_token() {
        let (router, token) = app().await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "asha");
    }

    #[tokio::test]
    async fn test_layer_allows_anonymous() {
        let (router, _) = app().await;
        let response = router
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_layer_rejects_unknown_token() {
        let (router, _) = app().await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(SESSION_HEADER, "forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("UNAUTHENTICATED"));
    }
}
