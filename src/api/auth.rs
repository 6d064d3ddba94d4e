//! Session API endpoints.

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::identity::{Credential, Principal};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub token: String,
    pub principal: Principal,
}

/// POST /api/auth/sign-in - Open a session.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(credential): Json<Credential>,
) -> ApiResult<SignInResponse> {
    let (token, principal) = state.sessions.sign_in(&credential).await?;
    tracing::info!("{} signed in", principal.id);
    success(SignInResponse { token, principal })
}

/// POST /api/auth/sign-out - Close the current session.
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<()> {
    let principal = caller.require()?;
    if let Some(token) = &caller.token {
        state.sessions.sign_out(token).await?;
    }
    tracing::info!("{} signed out", principal.id);
    success(())
}

/// GET /api/auth/me - Current principal.
pub async fn me(Extension(caller): Extension<Caller>) -> ApiResult<Principal> {
    success(caller.require()?.clone())
}
