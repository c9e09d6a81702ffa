use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Practitioner {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    /// Base price of a regular (non-introductory) session.
    pub price: f64,
    #[serde(default)]
    pub rating: f32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Practitioner {
    pub fn summary(&self) -> PractitionerSummary {
        PractitionerSummary {
            id: self.id,
            name: self.name.clone(),
            title: self.title.clone(),
            profile_image_url: self.profile_image_url.clone(),
            price: self.price,
            rating: self.rating,
        }
    }
}

/// Display details attached to appointments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerSummary {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub profile_image_url: Option<String>,
    pub price: f64,
    pub rating: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum PractitionerError {
    #[error("Practitioner not found")]
    NotFound,

    #[error("Failed to load practitioner seed data: {0}")]
    Seed(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<PractitionerError> for AppError {
    fn from(e: PractitionerError) -> Self {
        match e {
            PractitionerError::NotFound => AppError::NotFound("Practitioner not found".to_string()),
            PractitionerError::Seed(msg) => AppError::Internal(msg),
            PractitionerError::Database(db) => AppError::Database(db.to_string()),
        }
    }
}
