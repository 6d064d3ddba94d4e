//! Action-state derivation for the join button.

use serde::Serialize;

use super::TeamEngine;
use crate::errors::AppError;
use crate::identity::Principal;
use crate::models::{Idea, RequestStatus};

/// What a viewer can do about an idea's team. Exactly one state applies.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActionState {
    /// Viewer authored the idea.
    Owner,
    /// Viewer is on the roster.
    Member,
    /// Viewer's latest request awaits a decision.
    Pending,
    /// Roster is at capacity.
    Full,
    /// Viewer's latest request was rejected; a new one may be sent.
    Rejected,
    /// Viewer may send a request.
    Available,
}

impl ActionState {
    /// Derive the state; earlier rules win.
    pub fn derive(idea: &Idea, viewer_id: &str, latest: Option<RequestStatus>) -> Self {
        if idea.is_author(viewer_id) {
            return ActionState::Owner;
        }
        if idea.is_member(viewer_id) {
            return ActionState::Member;
        }
        if latest == Some(RequestStatus::Pending) {
            return ActionState::Pending;
        }
        if idea.is_full() {
            return ActionState::Full;
        }
        if latest == Some(RequestStatus::Rejected) {
            return ActionState::Rejected;
        }
        // Includes an approved request whose member was later removed.
        ActionState::Available
    }

    /// Whether `send_join_request` is expected to succeed from this state.
    pub fn can_request(&self) -> bool {
        matches!(self, ActionState::Available | ActionState::Rejected)
    }
}

/// A viewer's standing on an idea, derived from one read of the idea.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerStatus {
    pub idea: Idea,
    pub action: ActionState,
    pub latest: Option<RequestStatus>,
}

impl TeamEngine {
    /// Resolve the single action state for a viewer on an idea.
    pub async fn action_state(
        &self,
        idea_id: &str,
        viewer: &Principal,
    ) -> Result<ViewerStatus, AppError> {
        let idea = self.get_idea(idea_id).await?;
        let latest = self.query_request_status(idea_id, &viewer.id).await?;
        Ok(ViewerStatus {
            action: ActionState::derive(&idea, &viewer.id, latest),
            latest,
            idea,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IDEA_SCHEMA_VERSION;

    fn idea(members: &[&str], max: u32) -> Idea {
        Idea {
            id: "idea-1".to_string(),
            schema_version: IDEA_SCHEMA_VERSION,
            title: "EcoTrack".to_string(),
            description: "Tracker".to_string(),
            skills: vec!["Frontend".to_string()],
            author_id: "owner".to_string(),
            author_email: "owner@nitp.ac.in".to_string(),
            author_name: "Owner".to_string(),
            max_team_size: max,
            team_members: members.iter().map(|m| m.to_string()).collect(),
            interested_count: 0,
            created_at: "2026-03-01T10:00:00.000000Z".to_string(),
            version: 1,
        }
    }

    #[test]
    fn test_decision_table() {
        let open = idea(&["owner", "alice"], 3);
        let full = idea(&["owner", "alice"], 2);

        assert_eq!(ActionState::derive(&full, "owner", None), ActionState::Owner);
        assert_eq!(
            ActionState::derive(&full, "alice", Some(RequestStatus::Approved)),
            ActionState::Member
        );
        assert_eq!(
            ActionState::derive(&full, "bob", Some(RequestStatus::Pending)),
            ActionState::Pending
        );
        assert_eq!(
            ActionState::derive(&full, "bob", Some(RequestStatus::Rejected)),
            ActionState::Full
        );
        assert_eq!(
            ActionState::derive(&open, "bob", Some(RequestStatus::Rejected)),
            ActionState::Rejected
        );
        assert_eq!(ActionState::derive(&open, "bob", None), ActionState::Available);
        assert_eq!(
            ActionState::derive(&open, "bob", Some(RequestStatus::Approved)),
            ActionState::Available
        );
    }

    #[test]
    fn test_can_request() {
        assert!(ActionState::Available.can_request());
        assert!(ActionState::Rejected.can_request());
        assert!(!ActionState::Full.can_request());
        assert!(!ActionState::Owner.can_request());
    }
}
