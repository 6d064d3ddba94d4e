//! Team membership engine.
//!
//! Owns the lifecycle of idea rosters and the join requests directed at them. The engine
//! keeps no state of its own: every operation re-reads what it decides on from the
//! document store, and the acting principal is always passed in by the caller.
//!
//! Operations are sequences of independent store round-trips. Only the store's
//! per-document atomicity holds; see `approve_join_request` for the one conditional write
//! that closes the capacity race.

mod requests;
mod status;

pub use status::{ActionState, ViewerStatus};

use std::sync::Arc;

use serde_json::Value;

use crate::errors::AppError;
use crate::identity::Principal;
use crate::models::{
    timestamp_now, CreateIdeaRequest, Idea, JoinRequest, RequestStatus, RosterMember, IDEAS,
    IDEA_SCHEMA_VERSION, JOIN_REQUESTS,
};
use crate::store::{Direction, DocumentStore, Query};

/// Skill filter value meaning "no filter".
pub const ALL_SKILLS: &str = "all";

/// Service object exposing idea board and membership operations.
#[derive(Clone)]
pub struct TeamEngine {
    store: Arc<dyn DocumentStore>,
}

impl TeamEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    // ==================== IDEA OPERATIONS ====================

    /// Post a new idea with the author as its only member.
    pub async fn post_idea(
        &self,
        author: &Principal,
        request: &CreateIdeaRequest,
    ) -> Result<Idea, AppError> {
        let request = request.normalized()?;

        let mut idea = Idea {
            id: String::new(),
            schema_version: IDEA_SCHEMA_VERSION,
            title: request.title,
            description: request.description,
            skills: request.skills,
            author_id: author.id.clone(),
            author_email: author.email.clone(),
            author_name: author.display_name.clone(),
            max_team_size: request.max_team_size,
            team_members: vec![author.id.clone()],
            interested_count: 0,
            created_at: timestamp_now(),
            version: 1,
        };

        idea.id = self.store.create(IDEAS, idea.to_record()?).await?;
        tracing::info!("Idea {} posted by {}", idea.id, author.id);
        Ok(idea)
    }

    /// Load an idea, failing with `NotFound` if absent.
    pub async fn get_idea(&self, idea_id: &str) -> Result<Idea, AppError> {
        self.find_idea(idea_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Idea {} not found", idea_id)))
    }

    pub(crate) async fn find_idea(&self, idea_id: &str) -> Result<Option<Idea>, AppError> {
        self.store
            .get(IDEAS, idea_id)
            .await?
            .map(Idea::from_document)
            .transpose()
    }

    /// All ideas, newest first, optionally restricted to one skill.
    pub async fn list_ideas(&self, skill: Option<&str>) -> Result<Vec<Idea>, AppError> {
        let mut query = Query::new();
        if let Some(skill) = skill.map(str::trim) {
            if !skill.is_empty() && !skill.eq_ignore_ascii_case(ALL_SKILLS) {
                query = query.array_contains("skills", skill);
            }
        }
        self.query_ideas(query.order_by("createdAt", Direction::Desc))
            .await
    }

    /// Ideas posted by one author, newest first.
    pub async fn ideas_by_author(&self, author_id: &str) -> Result<Vec<Idea>, AppError> {
        self.query_ideas(
            Query::new()
                .eq("authorId", author_id)
                .order_by("createdAt", Direction::Desc),
        )
        .await
    }

    /// An idea's roster in order, each member resolved to an email and name.
    pub async fn team_roster(&self, idea_id: &str) -> Result<Vec<RosterMember>, AppError> {
        let idea = self.get_idea(idea_id).await?;
        let approved = self
            .query_requests(
                Query::new()
                    .eq("ideaId", idea_id)
                    .eq("status", RequestStatus::Approved.as_str())
                    .order_by("createdAt", Direction::Desc),
            )
            .await?;

        let roster = idea
            .team_members
            .iter()
            .map(|member_id| {
                if idea.is_author(member_id) {
                    return RosterMember {
                        id: member_id.clone(),
                        email: Some(idea.author_email.clone()),
                        display_name: Some(idea.author_name.clone()),
                        is_owner: true,
                    };
                }
                let request = approved.iter().find(|r| &r.requester_id == member_id);
                RosterMember {
                    id: member_id.clone(),
                    email: request.map(|r| r.requester_email.clone()),
                    display_name: request.map(|r| r.requester_name.clone()),
                    is_owner: false,
                }
            })
            .collect();
        Ok(roster)
    }

    async fn query_ideas(&self, query: Query) -> Result<Vec<Idea>, AppError> {
        self.store
            .query(IDEAS, &query)
            .await?
            .into_iter()
            .map(Idea::from_document)
            .collect()
    }

    // ==================== REQUEST LISTINGS ====================

    /// Pending requests addressed to an idea owner, newest first.
    pub async fn incoming_requests(&self, owner: &Principal) -> Result<Vec<JoinRequest>, AppError> {
        self.query_requests(
            Query::new()
                .eq("ownerId", owner.id.as_str())
                .eq("status", RequestStatus::Pending.as_str())
                .order_by("createdAt", Direction::Desc),
        )
        .await
    }

    /// Every request a principal has sent, newest first.
    pub async fn sent_requests(&self, requester: &Principal) -> Result<Vec<JoinRequest>, AppError> {
        self.query_requests(
            Query::new()
                .eq("requesterId", requester.id.as_str())
                .order_by("createdAt", Direction::Desc),
        )
        .await
    }

    async fn query_requests(&self, query: Query) -> Result<Vec<JoinRequest>, AppError> {
        self.store
            .query(JOIN_REQUESTS, &query)
            .await?
            .into_iter()
            .map(JoinRequest::from_document)
            .collect()
    }

    pub(crate) async fn get_request(&self, request_id: &str) -> Result<JoinRequest, AppError> {
        self.store
            .get(JOIN_REQUESTS, request_id)
            .await?
            .map(JoinRequest::from_document)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("Join request {} not found", request_id)))
    }
}

fn principal_value(principal_id: &str) -> Value {
    Value::String(principal_id.to_string())
}
