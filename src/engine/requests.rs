//! Join request lifecycle: send, approve, reject, and roster removal.

use super::{principal_value, TeamEngine};
use crate::errors::AppError;
use crate::identity::Principal;
use crate::models::{
    timestamp_now, JoinRequest, RequestStatus, IDEAS, JOIN_REQUESTS,
    JOIN_REQUEST_SCHEMA_VERSION,
};
use crate::store::{Direction, Query, Update};

impl TeamEngine {
    /// File a pending request to join an idea's team and count it as interest.
    ///
    /// The duplicate check and the insert are separate round-trips, so two concurrent
    /// sends from the same requester can both succeed.
    pub async fn send_join_request(
        &self,
        idea_id: &str,
        requester: Option<&Principal>,
        message: Option<&str>,
    ) -> Result<String, AppError> {
        let requester = requester
            .ok_or_else(|| AppError::Unauthenticated("Sign in to request to join".to_string()))?;

        let idea = self.get_idea(idea_id).await?;

        if idea.is_author(&requester.id) {
            return Err(AppError::SelfJoinForbidden(
                "You cannot request to join your own idea".to_string(),
            ));
        }
        if idea.is_member(&requester.id) {
            return Err(AppError::AlreadyMember(format!(
                "You are already on the team for {}",
                idea.title
            )));
        }
        if idea.is_full() {
            return Err(AppError::TeamFull(format!(
                "Team for {} is full ({}/{})",
                idea.title,
                idea.team_members.len(),
                idea.max_team_size
            )));
        }

        let pending = self
            .store
            .query(
                JOIN_REQUESTS,
                &Query::new()
                    .eq("ideaId", idea_id)
                    .eq("requesterId", requester.id.as_str())
                    .eq("status", RequestStatus::Pending.as_str())
                    .limit(1),
            )
            .await?;
        if !pending.is_empty() {
            return Err(AppError::DuplicateRequest(
                "You already have a pending request for this idea".to_string(),
            ));
        }

        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let request = JoinRequest {
            id: String::new(),
            schema_version: JOIN_REQUEST_SCHEMA_VERSION,
            idea_id: idea.id.clone(),
            idea_title: idea.title.clone(),
            requester_id: requester.id.clone(),
            requester_email: requester.email.clone(),
            requester_name: requester.display_name.clone(),
            owner_id: idea.author_id.clone(),
            owner_email: idea.author_email.clone(),
            message,
            status: RequestStatus::Pending,
            created_at: timestamp_now(),
            approved_at: None,
            rejected_at: None,
            version: 1,
        };
        let request_id = self.store.create(JOIN_REQUESTS, request.to_record()?).await?;

        // Not rolled back on failure: the request stands even if the counter does not move.
        if let Err(err) = self
            .store
            .update(IDEAS, idea_id, &Update::new().increment("interestedCount", 1))
            .await
        {
            tracing::warn!(
                "Join request {} created but interest count for {} not updated: {}",
                request_id,
                idea_id,
                err
            );
            return Err(err);
        }

        tracing::info!(
            "Join request {} sent by {} for idea {}",
            request_id,
            requester.id,
            idea_id
        );
        Ok(request_id)
    }

    /// Approve a pending request and add the requester to the roster.
    ///
    /// The roster append is conditional on the idea version read during the capacity check,
    /// and the status write on the request version read during the status check. A
    /// concurrent change to either surfaces as `Conflict`.
    pub async fn approve_join_request(
        &self,
        request_id: &str,
        acting: &Principal,
    ) -> Result<(), AppError> {
        let request = self.decidable_request(request_id, acting).await?;

        let idea = self.get_idea(&request.idea_id).await?;
        if idea.is_full() {
            return Err(AppError::TeamFull(format!(
                "Team for {} is full ({}/{})",
                idea.title,
                idea.team_members.len(),
                idea.max_team_size
            )));
        }

        self.store
            .update(
                IDEAS,
                &idea.id,
                &Update::new()
                    .array_union("teamMembers", vec![principal_value(&request.requester_id)])
                    .if_version(idea.version),
            )
            .await?;

        if let Err(err) = self
            .store
            .update(
                JOIN_REQUESTS,
                request_id,
                &Update::new()
                    .set("status", RequestStatus::Approved.as_str())
                    .set("approvedAt", timestamp_now())
                    .if_version(request.version),
            )
            .await
        {
            tracing::warn!(
                "Added {} to idea {} but could not mark request {} approved: {}",
                request.requester_id,
                idea.id,
                request_id,
                err
            );
            return Err(err);
        }

        tracing::info!(
            "Join request {} approved; {} joined idea {}",
            request_id,
            request.requester_id,
            idea.id
        );
        Ok(())
    }

    /// Reject a pending request. The roster is not touched.
    pub async fn reject_join_request(
        &self,
        request_id: &str,
        acting: &Principal,
    ) -> Result<(), AppError> {
        let request = self.decidable_request(request_id, acting).await?;

        self.store
            .update(
                JOIN_REQUESTS,
                request_id,
                &Update::new()
                    .set("status", RequestStatus::Rejected.as_str())
                    .set("rejectedAt", timestamp_now())
                    .if_version(request.version),
            )
            .await?;

        tracing::info!("Join request {} rejected by {}", request_id, acting.id);
        Ok(())
    }

    /// Remove a member from an idea's roster. Removing a non-member is a no-op.
    pub async fn remove_member_from_team(
        &self,
        idea_id: &str,
        member_id: &str,
        acting: &Principal,
    ) -> Result<(), AppError> {
        let idea = self.get_idea(idea_id).await?;

        if !idea.is_author(&acting.id) {
            return Err(AppError::NotAuthorized(
                "Only the idea owner can remove team members".to_string(),
            ));
        }
        if idea.is_author(member_id) {
            return Err(AppError::OwnerRemovalForbidden(
                "The owner cannot be removed from their own team".to_string(),
            ));
        }
        if !idea.is_member(member_id) {
            return Ok(());
        }

        self.store
            .update(
                IDEAS,
                idea_id,
                &Update::new().array_remove("teamMembers", vec![principal_value(member_id)]),
            )
            .await?;

        tracing::info!("Removed {} from idea {}", member_id, idea_id);
        Ok(())
    }

    /// Status of the most recent request for an idea and requester.
    pub async fn query_request_status(
        &self,
        idea_id: &str,
        requester_id: &str,
    ) -> Result<Option<RequestStatus>, AppError> {
        Ok(self
            .latest_request(idea_id, requester_id)
            .await?
            .map(|r| r.status))
    }

    pub(crate) async fn latest_request(
        &self,
        idea_id: &str,
        requester_id: &str,
    ) -> Result<Option<JoinRequest>, AppError> {
        self.store
            .query(
                JOIN_REQUESTS,
                &Query::new()
                    .eq("ideaId", idea_id)
                    .eq("requesterId", requester_id)
                    .order_by("createdAt", Direction::Desc)
                    .limit(1),
            )
            .await?
            .into_iter()
            .next()
            .map(JoinRequest::from_document)
            .transpose()
    }

    /// Shared guards for approve and reject: exists, owned by `acting`, still pending.
    async fn decidable_request(
        &self,
        request_id: &str,
        acting: &Principal,
    ) -> Result<JoinRequest, AppError> {
        let request = self.get_request(request_id).await?;

        if request.owner_id != acting.id {
            return Err(AppError::NotAuthorized(
                "Only the idea owner can decide on join requests".to_string(),
            ));
        }
        if request.status.is_decided() {
            return Err(AppError::AlreadyDecided(format!(
                "Join request was already {}",
                request.status.as_str()
            )));
        }
        Ok(request)
    }
}
