//! Idea board and roster endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::auth::Caller;
use crate::engine::ActionState;
use crate::models::{CreateIdeaRequest, Idea, RequestStatus, RosterMember, SendJoinRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListIdeasParams {
    pub skill: Option<String>,
}

/// Join-button state for the caller on one idea.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaStatusResponse {
    pub status: Option<RequestStatus>,
    pub action: ActionState,
    pub can_request: bool,
    pub open_slots: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentRequestResponse {
    pub request_id: String,
}

/// GET /api/ideas - List ideas, newest first, optionally by skill.
pub async fn list_ideas(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ListIdeasParams>,
) -> ApiResult<Vec<Idea>> {
    caller.require()?;
    success(state.engine.list_ideas(params.skill.as_deref()).await?)
}

/// POST /api/ideas - Post a new idea.
pub async fn create_idea(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<CreateIdeaRequest>,
) -> ApiResult<Idea> {
    let author = caller.require()?;
    success(state.engine.post_idea(author, &request).await?)
}

/// GET /api/ideas/mine - Ideas posted by the caller.
pub async fn my_ideas(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<Idea>> {
    let author = caller.require()?;
    success(state.engine.ideas_by_author(&author.id).await?)
}

/// GET /api/ideas/:id - Get a single idea.
pub async fn get_idea(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<Idea> {
    caller.require()?;
    success(state.engine.get_idea(&id).await?)
}

/// GET /api/ideas/:id/status - Caller's request status and action state.
pub async fn idea_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<IdeaStatusResponse> {
    let viewer = caller.require()?;
    let viewer_status = state.engine.action_state(&id, viewer).await?;

    success(IdeaStatusResponse {
        status: viewer_status.latest,
        action: viewer_status.action,
        can_request: viewer_status.action.can_request(),
        open_slots: viewer_status.idea.open_slots(),
    })
}

/// GET /api/ideas/:id/members - Roster with member emails and names.
pub async fn team_roster(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> ApiResult<Vec<RosterMember>> {
    caller.require()?;
    success(state.engine.team_roster(&id).await?)
}

/// POST /api/ideas/:id/requests - Ask to join an idea's team.
pub async fn send_join_request(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    request: Option<Json<SendJoinRequest>>,
) -> ApiResult<SentRequestResponse> {
    // The body is optional; a bare POST sends no message.
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let request_id = state
        .engine
        .send_join_request(&id, caller.principal(), request.message.as_deref())
        .await?;
    success(SentRequestResponse { request_id })
}

/// DELETE /api/ideas/:id/members/:member_id - Remove a team member.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, member_id)): Path<(String, String)>,
) -> ApiResult<Vec<RosterMember>> {
    let acting = caller.require()?;
    state
        .engine
        .remove_member_from_team(&id, &member_id, acting)
        .await?;
    success(state.engine.team_roster(&id).await?)
}
