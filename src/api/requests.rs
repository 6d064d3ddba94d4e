//! Join request endpoints for owners and requesters.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::models::JoinRequest;
use crate::AppState;

/// GET /api/requests/incoming - Pending requests for the caller's ideas.
pub async fn incoming_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<JoinRequest>> {
    let owner = caller.require()?;
    success(state.engine.incoming_requests(owner).await?)
}

/// GET /api/requests/sent - Every request the caller has sent.
pub async fn sent_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<JoinRequest>> {
    let requester = caller.require()?;
    success(state.engine.sent_requests(requester).await?)
}

/// POST /api/requests/:id/approve - Approve a pending request.
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<JoinRequest> {
    let acting = caller.require()?;
    state.engine.approve_join_request(&id, acting).await?;
    success(state.engine.get_request(&id).await?)
}

/// POST /api/requests/:id/reject - Reject a pending request.
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<JoinRequest> {
    let acting = caller.require()?;
    state.engine.reject_join_request(&id, acting).await?;
    success(state.engine.get_request(&id).await?)
}
