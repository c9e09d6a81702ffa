use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{Decision, Match, MatchFilter, MessageStatus, ShownPractitioner};

/// Persistence for match decisions and discovery history. Pairs
/// `(userId, practitionerId)` are unique in both collections.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Creates the pair's match or overwrites its decision.
    async fn upsert_decision(&self, decision: &Decision) -> Result<Match, DatabaseError>;

    async fn set_message_status(
        &self,
        user_id: Uuid,
        practitioner_id: Uuid,
        status: &MessageStatus,
    ) -> Result<Option<Match>, DatabaseError>;

    /// Most recently updated first.
    async fn list(&self, user_id: Uuid, filter: &MatchFilter) -> Result<Vec<Match>, DatabaseError>;

    async fn shown(&self, user_id: Uuid) -> Result<Vec<ShownPractitioner>, DatabaseError>;

    /// Records practitioners as shown; already shown ones keep their timestamp.
    async fn add_shown(&self, user_id: Uuid, practitioner_ids: &[Uuid]) -> Result<(), DatabaseError>;

    /// Returns how many entries were removed.
    async fn clear_shown(&self, user_id: Uuid) -> Result<usize, DatabaseError>;
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
struct MatchTables {
    matches: HashMap<(Uuid, Uuid), Match>,
    shown: HashMap<(Uuid, Uuid), ShownPractitioner>,
}

#[derive(Default)]
pub struct InMemoryMatchStore {
    tables: RwLock<MatchTables>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn upsert_decision(&self, decision: &Decision) -> Result<Match, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let record = tables
            .matches
            .entry((decision.user_id, decision.practitioner_id))
            .and_modify(|existing| {
                existing.match_type = decision.match_type;
                if decision.onboarding_score.is_some() {
                    existing.onboarding_score = decision.onboarding_score;
                }
                existing.updated_at = now;
            })
            .or_insert_with(|| Match {
                id: Uuid::new_v4(),
                user_id: decision.user_id,
                practitioner_id: decision.practitioner_id,
                match_type: decision.match_type,
                onboarding_score: decision.onboarding_score,
                message_status: MessageStatus::default(),
                created_at: now,
                updated_at: now,
            });

        Ok(record.clone())
    }

    async fn set_message_status(
        &self,
        user_id: Uuid,
        practitioner_id: Uuid,
        status: &MessageStatus,
    ) -> Result<Option<Match>, DatabaseError> {
        let mut tables = self.tables.write().await;

        Ok(tables.matches.get_mut(&(user_id, practitioner_id)).map(|record| {
            record.message_status = status.clone();
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn list(&self, user_id: Uuid, filter: &MatchFilter) -> Result<Vec<Match>, DatabaseError> {
        let mut matches: Vec<Match> = self.tables
            .read()
            .await
            .matches
            .values()
            .filter(|m| m.user_id == user_id && filter.matches(m))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches)
    }

    async fn shown(&self, user_id: Uuid) -> Result<Vec<ShownPractitioner>, DatabaseError> {
        let mut shown: Vec<ShownPractitioner> = self.tables
            .read()
            .await
            .shown
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        shown.sort_by_key(|s| s.shown_at);
        Ok(shown)
    }

    async fn add_shown(&self, user_id: Uuid, practitioner_ids: &[Uuid]) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        for &practitioner_id in practitioner_ids {
            tables.shown.entry((user_id, practitioner_id)).or_insert(ShownPractitioner {
                user_id,
                practitioner_id,
                shown_at: now,
            });
        }
        Ok(())
    }

    async fn clear_shown(&self, user_id: Uuid) -> Result<usize, DatabaseError> {
        let mut tables = self.tables.write().await;
        let before = tables.shown.len();
        tables.shown.retain(|(owner, _), _| *owner != user_id);
        Ok(before - tables.shown.len())
    }
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

/// `matches` and `shown_practitioners` tables, each with a unique
/// `(userId, practitionerId)` index.
pub struct SupabaseMatchStore {
    supabase: SupabaseClient,
}

impl SupabaseMatchStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: SupabaseClient::new(config) }
    }
}

pub(crate) fn list_query(user_id: Uuid, filter: &MatchFilter) -> String {
    let mut query_parts = vec![format!("userId=eq.{}", user_id)];

    if let Some(match_type) = filter.match_type {
        query_parts.push(format!("matchType=eq.{}", match_type));
    }
    if let Some(has_messaged) = filter.has_messaged {
        query_parts.push(format!("messageStatus->>hasMessaged=eq.{}", has_messaged));
    }
    query_parts.push("order=updatedAt.desc".to_string());

    query_parts.join("&")
}

#[async_trait]
impl MatchStore for SupabaseMatchStore {
    async fn upsert_decision(&self, decision: &Decision) -> Result<Match, DatabaseError> {
        let now = Utc::now();
        // id, createdAt and messageStatus take column defaults on insert and are
        // left untouched when the pair already exists.
        let mut body = json!({
            "userId": decision.user_id,
            "practitionerId": decision.practitioner_id,
            "matchType": decision.match_type,
            "updatedAt": now,
        });
        if let Some(score) = decision.onboarding_score {
            body["onboardingScore"] = json!(score);
        }

        let result: Vec<Match> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/matches?on_conflict=userId,practitionerId",
            Some(body),
            Some(SupabaseClient::merge_duplicates()),
        ).await?;

        result.into_iter().next().ok_or_else(|| {
            DatabaseError::Decode("upsert returned no match".to_string())
        })
    }

    async fn set_message_status(
        &self,
        user_id: Uuid,
        practitioner_id: Uuid,
        status: &MessageStatus,
    ) -> Result<Option<Match>, DatabaseError> {
        let path = format!(
            "/rest/v1/matches?userId=eq.{}&practitionerId=eq.{}",
            user_id, practitioner_id
        );
        let result: Vec<Match> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(json!({
                "messageStatus": status,
                "updatedAt": Utc::now(),
            })),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Ok(result.into_iter().next())
    }

    async fn list(&self, user_id: Uuid, filter: &MatchFilter) -> Result<Vec<Match>, DatabaseError> {
        let path = format!("/rest/v1/matches?{}", list_query(user_id, filter));
        debug!("Listing matches: {}", path);
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn shown(&self, user_id: Uuid) -> Result<Vec<ShownPractitioner>, DatabaseError> {
        let path = format!("/rest/v1/shown_practitioners?userId=eq.{}&order=shownAt.asc", user_id);
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn add_shown(&self, user_id: Uuid, practitioner_ids: &[Uuid]) -> Result<(), DatabaseError> {
        if practitioner_ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let rows: Vec<ShownPractitioner> = practitioner_ids
            .iter()
            .map(|&practitioner_id| ShownPractitioner { user_id, practitioner_id, shown_at: now })
            .collect();
        let body = serde_json::to_value(rows).map_err(|e| DatabaseError::Decode(e.to_string()))?;

        self.supabase.execute_with_headers(
            Method::POST,
            "/rest/v1/shown_practitioners?on_conflict=userId,practitionerId",
            Some(body),
            Some(SupabaseClient::ignore_duplicates()),
        ).await
    }

    async fn clear_shown(&self, user_id: Uuid) -> Result<usize, DatabaseError> {
        let path = format!("/rest/v1/shown_practitioners?userId=eq.{}", user_id);
        let removed: Vec<ShownPractitioner> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            None,
            Some(SupabaseClient::return_representation()),
        ).await?;

        Ok(removed.len())
    }
}
