use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, BookingBlock, HandshakeVotes};
use crate::services::eligibility::{assess_pair_history, ensure_single_active_introduction};
use crate::services::pricing::BookingKind;

/// Partial unique index on `appointments ("userId") WHERE "isIntroductorySession"
/// AND status = 'confirmed'`.
pub const SINGLE_ACTIVE_INTRO_INDEX: &str = "appointments_single_active_intro";

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error(transparent)]
    Blocked(#[from] BookingBlock),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Persistence gateway for appointments. Implementations enforce `bookingId`
/// uniqueness and apply the conditional writes atomically.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with [`DatabaseError::Conflict`] when the booking id is taken.
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError>;

    /// Inserts an introductory session only while the user has no live
    /// introduction with anyone else and the pair has no live history.
    async fn insert_introduction(&self, appointment: &Appointment) -> Result<Appointment, InsertError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// Matching appointments in chronological order.
    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DatabaseError>;

    /// Writes `new` only while the stored status is still `expected`.
    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
    ) -> Result<Option<Appointment>, DatabaseError>;

    /// Writes `new` votes (and derived handshake fields) only while the stored
    /// votes still equal `expected`.
    async fn compare_and_set_handshake(
        &self,
        id: Uuid,
        expected: HandshakeVotes,
        new: HandshakeVotes,
    ) -> Result<Option<Appointment>, DatabaseError>;
}

fn sort_chronologically(appointments: &mut [Appointment]) {
    appointments.sort_by_key(|a| a.sort_key());
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let mut appointments = self.appointments.write().await;

        if appointments.contains_key(&appointment.id) {
            return Err(DatabaseError::Conflict(format!("appointment {} already exists", appointment.id)));
        }
        if appointments.values().any(|a| a.booking_id == appointment.booking_id) {
            return Err(DatabaseError::Conflict(format!(
                "booking id {} already exists",
                appointment.booking_id
            )));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn insert_introduction(&self, appointment: &Appointment) -> Result<Appointment, InsertError> {
        let mut appointments = self.appointments.write().await;

        let user_introductions: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.user_id == appointment.user_id && a.is_introductory_session)
            .cloned()
            .collect();
        ensure_single_active_introduction(&user_introductions, appointment.practitioner_id)?;

        let pair_history: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.user_id == appointment.user_id && a.practitioner_id == appointment.practitioner_id)
            .cloned()
            .collect();
        if assess_pair_history(&pair_history)? != BookingKind::Introductory {
            return Err(BookingBlock::IntroductionScheduled.into());
        }

        if appointments.contains_key(&appointment.id)
            || appointments.values().any(|a| a.booking_id == appointment.booking_id)
        {
            return Err(DatabaseError::Conflict(format!(
                "booking id {} already exists",
                appointment.booking_id
            )).into());
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DatabaseError> {
        let mut matching: Vec<Appointment> = self.appointments
            .read()
            .await
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        sort_chronologically(&mut matching);
        Ok(matching)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut appointments = self.appointments.write().await;

        match appointments.get_mut(&id) {
            Some(appointment) if appointment.status == expected => {
                appointment.status = new;
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn compare_and_set_handshake(
        &self,
        id: Uuid,
        expected: HandshakeVotes,
        new: HandshakeVotes,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut appointments = self.appointments.write().await;

        match appointments.get_mut(&id) {
            Some(appointment) if appointment.votes() == expected => {
                appointment.apply_votes(new);
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

/// `appointments` table over PostgREST; `bookingId` carries a unique index.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: SupabaseClient::new(config) }
    }

    async fn patch_one(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            path,
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Ok(result.into_iter().next())
    }
}

/// PostgREST filter value for a tri-state boolean column.
fn tri_state_filter(value: Option<bool>) -> &'static str {
    match value {
        None => "is.null",
        Some(true) => "is.true",
        Some(false) => "is.false",
    }
}

pub(crate) fn filter_query(filter: &AppointmentFilter) -> String {
    let mut query_parts = Vec::new();

    if let Some(user_id) = filter.user_id {
        query_parts.push(format!("userId=eq.{}", user_id));
    }
    if let Some(practitioner_id) = filter.practitioner_id {
        query_parts.push(format!("practitionerId=eq.{}", practitioner_id));
    }
    if !filter.statuses.is_empty() {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();
        query_parts.push(format!("status=in.({})", statuses.join(",")));
    }
    if let Some(introductory) = filter.introductory {
        query_parts.push(format!("isIntroductorySession=is.{}", introductory));
    }
    query_parts.push("order=date.asc,createdAt.asc".to_string());

    query_parts.join("&")
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| DatabaseError::Decode(e.to_string()))?;

        let result: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        result.into_iter().next().ok_or_else(|| {
            DatabaseError::Decode("insert returned no appointment".to_string())
        })
    }

    async fn insert_introduction(&self, appointment: &Appointment) -> Result<Appointment, InsertError> {
        match self.insert(appointment).await {
            Err(DatabaseError::Conflict(detail)) if detail.contains(SINGLE_ACTIVE_INTRO_INDEX) => {
                warn!("User {} already holds a confirmed introduction", appointment.user_id);
                Err(BookingBlock::ActiveIntroductionElsewhere.into())
            }
            result => Ok(result?),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        debug!("Fetching appointment: {}", id);

        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let result: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(result.into_iter().next())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, DatabaseError> {
        debug!("Listing appointments with filter: {:?}", filter);

        let path = format!("/rest/v1/appointments?{}", filter_query(filter));
        let mut result: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;

        // Times are stored in display form, so order within a day here.
        sort_chronologically(&mut result);
        Ok(result)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);
        let updated = self.patch_one(&path, json!({
            "status": new,
            "updatedAt": Utc::now(),
        })).await?;

        if updated.is_none() {
            warn!("Status update of {} skipped, status no longer {}", id, expected);
        }
        Ok(updated)
    }

    async fn compare_and_set_handshake(
        &self,
        id: Uuid,
        expected: HandshakeVotes,
        new: HandshakeVotes,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&userHandshake={}&practitionerHandshake={}",
            id,
            tri_state_filter(expected.user),
            tri_state_filter(expected.practitioner),
        );

        let updated = self.patch_one(&path, json!({
            "userHandshake": new.user,
            "practitionerHandshake": new.practitioner,
            "handshakeStatus": new.status(),
            "handshakeCompleted": new.completed(),
            "updatedAt": Utc::now(),
        })).await?;

        if updated.is_none() {
            warn!("Handshake write for {} lost a race, votes changed", id);
        }
        Ok(updated)
    }
}
