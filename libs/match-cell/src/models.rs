use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

use practitioner_cell::PractitionerError;
use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// MATCH MODELS
// ==============================================================================

/// A user's standing decision about one practitioner. One row per pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: Uuid,
    pub user_id: Uuid,
    pub practitioner_id: Uuid,
    pub match_type: MatchType,
    /// 0-100 score from onboarding.
    pub onboarding_score: Option<u8>,
    #[serde(default)]
    pub message_status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Liked,
    Shortlisted,
    Passed,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Liked => write!(f, "liked"),
            MatchType::Shortlisted => write!(f, "shortlisted"),
            MatchType::Passed => write!(f, "passed"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatus {
    pub has_messaged: bool,
    pub message_date: Option<DateTime<Utc>>,
}

impl MessageStatus {
    pub fn new(has_messaged: bool) -> Self {
        Self {
            has_messaged,
            message_date: has_messaged.then(Utc::now),
        }
    }
}

/// Practitioner already presented to a user during discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShownPractitioner {
    pub user_id: Uuid,
    pub practitioner_id: Uuid,
    pub shown_at: DateTime<Utc>,
}

/// New decision for a pair, as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub user_id: Uuid,
    pub practitioner_id: Uuid,
    pub match_type: MatchType,
    pub onboarding_score: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub match_type: Option<MatchType>,
    pub has_messaged: Option<bool>,
}

impl MatchFilter {
    pub fn of_type(match_type: MatchType) -> Self {
        Self { match_type: Some(match_type), has_messaged: None }
    }

    pub fn matches(&self, record: &Match) -> bool {
        self.match_type.map_or(true, |t| record.match_type == t)
            && self.has_messaged.map_or(true, |m| record.message_status.has_messaged == m)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDecisionRequest {
    pub practitioner_id: Uuid,
    pub match_type: MatchType,
    pub onboarding_score: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMessagedRequest {
    pub practitioner_id: Uuid,
    pub has_messaged: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    #[serde(rename = "type")]
    pub match_type: Option<MatchType>,
    pub has_messaged: Option<bool>,
}

impl From<MatchQuery> for MatchFilter {
    fn from(query: MatchQuery) -> Self {
        Self {
            match_type: query.match_type,
            has_messaged: query.has_messaged,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShownPractitionersRequest {
    pub practitioner_ids: Vec<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("No match with this practitioner yet")]
    NotFound,

    #[error("Practitioner not found")]
    PractitionerNotFound,

    #[error("Shortlist is full ({0} practitioners), remove one first")]
    ShortlistFull(usize),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<PractitionerError> for MatchError {
    fn from(e: PractitionerError) -> Self {
        match e {
            PractitionerError::NotFound => MatchError::PractitionerNotFound,
            PractitionerError::Database(db) => MatchError::Database(db),
            PractitionerError::Seed(msg) => MatchError::ValidationError(msg),
        }
    }
}

impl From<MatchError> for AppError {
    fn from(e: MatchError) -> Self {
        match e {
            MatchError::NotFound | MatchError::PractitionerNotFound => AppError::NotFound(e.to_string()),
            MatchError::ShortlistFull(_) => AppError::Conflict(e.to_string()),
            MatchError::ValidationError(msg) => AppError::ValidationError(msg),
            MatchError::Database(db) => AppError::Database(db.to_string()),
        }
    }
}
