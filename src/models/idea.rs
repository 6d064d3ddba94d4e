//! Idea model: a posted project proposal with a bounded team roster.

use serde::{Deserialize, Serialize};

use super::{decode_document, encode_record};
use crate::errors::AppError;
use crate::store::{Document, Record};

/// Collection holding idea records.
pub const IDEAS: &str = "ideas";

pub const IDEA_SCHEMA_VERSION: i32 = 1;

/// A project idea and its team roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: String,
    pub schema_version: i32,
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
    pub author_id: String,
    pub author_email: String,
    pub author_name: String,
    pub max_team_size: u32,
    /// Principal ids; the author is always first.
    pub team_members: Vec<String>,
    pub interested_count: u64,
    pub created_at: String,
    /// Store document version, used for conditional writes
    #[serde(default)]
    pub version: i64,
}

impl Idea {
    pub fn from_document(document: Document) -> Result<Self, AppError> {
        let idea: Idea = decode_document(document, "Idea", IDEA_SCHEMA_VERSION)?;
        if idea.team_members.first() != Some(&idea.author_id) {
            return Err(AppError::InvalidRecord(format!(
                "Idea {} roster does not start with its author",
                idea.id
            )));
        }
        Ok(idea)
    }

    pub fn to_record(&self) -> Result<Record, AppError> {
        encode_record(self)
    }

    pub fn is_author(&self, principal_id: &str) -> bool {
        self.author_id == principal_id
    }

    pub fn is_member(&self, principal_id: &str) -> bool {
        self.team_members.iter().any(|m| m == principal_id)
    }

    pub fn is_full(&self) -> bool {
        self.team_members.len() >= self.max_team_size as usize
    }

    pub fn open_slots(&self) -> u32 {
        (self.max_team_size as usize).saturating_sub(self.team_members.len()) as u32
    }
}

/// A roster entry resolved to a displayable profile.
///
/// Profiles come from the author fields and the approved join requests; a member with
/// neither has no email or name.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterMember {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_owner: bool,
}

/// Request body for posting a new idea.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdeaRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub max_team_size: u32,
}

impl CreateIdeaRequest {
    /// Validate and normalise the request: trims text and de-duplicates skills.
    pub fn normalized(&self) -> Result<CreateIdeaRequest, AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(AppError::Validation("Description is required".to_string()));
        }

        let mut skills: Vec<String> = Vec::new();
        for skill in &self.skills {
            let skill = skill.trim();
            if !skill.is_empty() && !skills.iter().any(|s| s == skill) {
                skills.push(skill.to_string());
            }
        }
        if skills.is_empty() {
            return Err(AppError::Validation(
                "Please select at least one required skill".to_string(),
            ));
        }

        if self.max_team_size == 0 {
            return Err(AppError::Validation(
                "Team size must be at least 1".to_string(),
            ));
        }

        Ok(CreateIdeaRequest {
            title: title.to_string(),
            description: description.to_string(),
            skills,
            max_team_size: self.max_team_size,
        })
    }
}
