use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use practitioner_cell::{Practitioner, PractitionerStore};
use shared_config::AppConfig;

use crate::models::{
    Decision, Match, MatchError, MatchFilter, MatchType, MessageStatus, RecordDecisionRequest,
    SetMessagedRequest, ShownPractitioner,
};
use crate::services::store::MatchStore;

pub struct MatchService {
    store: Arc<dyn MatchStore>,
    practitioners: Arc<dyn PractitionerStore>,
    max_shortlist: usize,
}

impl MatchService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn MatchStore>,
        practitioners: Arc<dyn PractitionerStore>,
    ) -> Self {
        Self {
            store,
            practitioners,
            max_shortlist: config.max_shortlist,
        }
    }

    /// Records (or overwrites) the user's decision about a practitioner.
    pub async fn record_decision(
        &self,
        user_id: Uuid,
        request: RecordDecisionRequest,
    ) -> Result<Match, MatchError> {
        if request.onboarding_score.is_some_and(|score| score > 100) {
            return Err(MatchError::ValidationError(
                "Onboarding score must be between 0 and 100".to_string(),
            ));
        }

        self.practitioners.require(request.practitioner_id).await?;

        if request.match_type == MatchType::Shortlisted {
            let shortlisted = self.store
                .list(user_id, &MatchFilter::of_type(MatchType::Shortlisted))
                .await?;
            let others = shortlisted
                .iter()
                .filter(|m| m.practitioner_id != request.practitioner_id)
                .count();

            if others >= self.max_shortlist {
                warn!("User {} shortlist full ({} entries)", user_id, others);
                return Err(MatchError::ShortlistFull(self.max_shortlist));
            }
        }

        let record = self.store.upsert_decision(&Decision {
            user_id,
            practitioner_id: request.practitioner_id,
            match_type: request.match_type,
            onboarding_score: request.onboarding_score,
        }).await?;

        info!("User {} marked practitioner {} as {}", user_id, request.practitioner_id, record.match_type);
        Ok(record)
    }

    pub async fn set_messaged(
        &self,
        user_id: Uuid,
        request: SetMessagedRequest,
    ) -> Result<Match, MatchError> {
        let status = MessageStatus::new(request.has_messaged);

        let record = self.store
            .set_message_status(user_id, request.practitioner_id, &status)
            .await?
            .ok_or(MatchError::NotFound)?;

        debug!("Message status of {} -> {} is now {}", user_id, request.practitioner_id, request.has_messaged);
        Ok(record)
    }

    pub async fn list_matches(&self, user_id: Uuid, filter: MatchFilter) -> Result<Vec<Match>, MatchError> {
        Ok(self.store.list(user_id, &filter).await?)
    }

    pub async fn shown_practitioners(&self, user_id: Uuid) -> Result<Vec<ShownPractitioner>, MatchError> {
        Ok(self.store.shown(user_id).await?)
    }

    pub async fn add_shown_practitioners(
        &self,
        user_id: Uuid,
        practitioner_ids: Vec<Uuid>,
    ) -> Result<Vec<ShownPractitioner>, MatchError> {
        if practitioner_ids.is_empty() {
            return Err(MatchError::ValidationError("practitionerIds cannot be empty".to_string()));
        }

        let mut seen = HashSet::new();
        let unique: Vec<Uuid> = practitioner_ids.into_iter().filter(|id| seen.insert(*id)).collect();
        for &practitioner_id in &unique {
            self.practitioners.require(practitioner_id).await?;
        }

        self.store.add_shown(user_id, &unique).await?;
        Ok(self.store.shown(user_id).await?)
    }

    pub async fn clear_shown_practitioners(&self, user_id: Uuid) -> Result<usize, MatchError> {
        let removed = self.store.clear_shown(user_id).await?;
        info!("Cleared {} shown practitioners for user {}", removed, user_id);
        Ok(removed)
    }

    /// Active practitioners the user has neither been shown nor passed on,
    /// highest rated first.
    pub async fn remaining_practitioners(&self, user_id: Uuid) -> Result<Vec<Practitioner>, MatchError> {
        let mut excluded: HashSet<Uuid> = self.store
            .shown(user_id)
            .await?
            .into_iter()
            .map(|s| s.practitioner_id)
            .collect();
        excluded.extend(
            self.store
                .list(user_id, &MatchFilter::of_type(MatchType::Passed))
                .await?
                .into_iter()
                .map(|m| m.practitioner_id),
        );

        let remaining: Vec<Practitioner> = self.practitioners
            .list_active()
            .await?
            .into_iter()
            .filter(|p| !excluded.contains(&p.id))
            .collect();

        debug!("{} practitioners remaining for user {}", remaining.len(), user_id);
        Ok(remaining)
    }
}
