// libs/appointment-cell/src/services/booking.rs
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use practitioner_cell::{Practitioner, PractitionerStore, PractitionerSummary};
use shared_config::{AppConfig, HandshakeMode};

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AppointmentFilter, AppointmentStatus,
    Caller, ClientSummary, CreateAppointmentRequest, HandshakeOutcome, HandshakeParty,
    HandshakeStatus, HandshakeStatusView, PractitionerSessionStats, ScheduleSessionRequest,
    SessionType, UserSessionStats,
};
use crate::services::booking_id::{BookingIdSource, RandomBookingIds};
use crate::services::datetime::{parse_session_date, parse_session_time};
use crate::services::eligibility::{assess_pair_history, ensure_single_active_introduction};
use crate::services::handshake::{cast_vote, outcome_message, VoteChange};
use crate::services::lifecycle::{AppointmentLifecycleService, StatusActor};
use crate::services::pricing::{BookingKind, PricingService, SessionQuote};
use crate::services::store::{AppointmentStore, InsertError};

const MAX_BOOKING_ID_ATTEMPTS: usize = 3;
const MAX_HANDSHAKE_ATTEMPTS: usize = 3;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    practitioners: Arc<dyn PractitionerStore>,
    pricing: PricingService,
    lifecycle_service: AppointmentLifecycleService,
    handshake_mode: HandshakeMode,
    booking_ids: Arc<dyn BookingIdSource>,
}

/// Slot and session details shared by user bookings and practitioner follow-ups.
struct SessionSlot<'a> {
    date: &'a str,
    time: &'a str,
    session_type: SessionType,
    notes: Option<String>,
}

impl AppointmentBookingService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        practitioners: Arc<dyn PractitionerStore>,
    ) -> Self {
        Self {
            store,
            practitioners,
            pricing: PricingService::new(config),
            lifecycle_service: AppointmentLifecycleService::new(),
            handshake_mode: config.handshake_mode,
            booking_ids: Arc::new(RandomBookingIds),
        }
    }

    pub fn with_booking_ids(mut self, booking_ids: Arc<dyn BookingIdSource>) -> Self {
        self.booking_ids = booking_ids;
        self
    }

    pub fn handshake_mode(&self) -> HandshakeMode {
        self.handshake_mode
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Books a session for a user. The first session with a practitioner is an
    /// introduction; later ones are only allowed once its handshake succeeded.
    pub async fn create_appointment(
        &self,
        caller: Caller,
        request: CreateAppointmentRequest,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let user_id = request.user_id.unwrap_or(caller.id);
        if user_id != caller.id && !caller.is_admin {
            warn!("Caller {} attempted to book on behalf of {}", caller.id, user_id);
            return Err(AppointmentError::Forbidden(
                "You can only book appointments for yourself".to_string(),
            ));
        }

        info!("Booking session for user {} with practitioner {}", user_id, request.practitioner_id);

        let practitioner = self.practitioners.require(request.practitioner_id).await?;
        let today = Utc::now().date_naive();
        let slot = SessionSlot {
            date: &request.date,
            time: &request.time,
            session_type: request.session_type,
            notes: request.notes,
        };
        let (date, time) = parse_slot(&slot, today)?;

        let history = self.store
            .list(&AppointmentFilter::for_pair(user_id, practitioner.id))
            .await?;
        let kind = assess_pair_history(&history)?;

        if kind == BookingKind::Introductory {
            let introductions = self.store
                .list(&AppointmentFilter::for_user(user_id).introductory(true))
                .await?;
            ensure_single_active_introduction(&introductions, practitioner.id)?;
        }

        let quote = self.pricing.quote(kind, &practitioner, request.duration.as_deref())?;
        let appointment = new_appointment(user_id, &practitioner, date, time, &slot, quote);
        let appointment = self.insert_with_fresh_booking_id(appointment).await?;

        info!("Booked {} ({}) for user {} at {:.2}",
              appointment.booking_id,
              if appointment.is_introductory_session { "introductory" } else { "regular" },
              user_id,
              appointment.session_price);

        Ok(AppointmentDetails::new(appointment, Some(practitioner.summary())))
    }

    /// Practitioner-initiated regular session with an existing client.
    pub async fn schedule_follow_up(
        &self,
        caller: Caller,
        request: ScheduleSessionRequest,
    ) -> Result<AppointmentDetails, AppointmentError> {
        if !caller.is_practitioner {
            return Err(AppointmentError::Forbidden(
                "Only practitioners can schedule follow-up sessions".to_string(),
            ));
        }
        if request.practitioner_id.is_some_and(|id| id != caller.id) {
            return Err(AppointmentError::Forbidden(
                "Practitioners can only schedule their own sessions".to_string(),
            ));
        }

        let practitioner = self.practitioners.require(caller.id).await?;
        let today = Utc::now().date_naive();
        let slot = SessionSlot {
            date: &request.date,
            time: &request.time,
            session_type: request.session_type,
            notes: request.notes,
        };
        let (date, time) = parse_slot(&slot, today)?;

        let history = self.store
            .list(&AppointmentFilter::for_pair(request.user_id, practitioner.id))
            .await?;
        // Same gate as a user rebooking: the introduction must have ended in a match.
        if assess_pair_history(&history)? == BookingKind::Introductory {
            return Err(AppointmentError::Forbidden(
                "Follow-up sessions can only be scheduled with existing clients".to_string(),
            ));
        }

        let quote = self.pricing.quote(BookingKind::Regular, &practitioner, request.duration.as_deref())?;
        let appointment = new_appointment(request.user_id, &practitioner, date, time, &slot, quote);
        let appointment = self.insert_with_fresh_booking_id(appointment).await?;

        info!("Practitioner {} scheduled follow-up {} with client {}",
              practitioner.id, appointment.booking_id, request.user_id);

        Ok(AppointmentDetails::new(appointment, Some(practitioner.summary())))
    }

    async fn insert_with_fresh_booking_id(
        &self,
        mut appointment: Appointment,
    ) -> Result<Appointment, AppointmentError> {
        for attempt in 1..=MAX_BOOKING_ID_ATTEMPTS {
            appointment.booking_id = self.booking_ids.next_id();

            // Introductions are re-checked by the store at write time.
            let inserted = if appointment.is_introductory_session {
                self.store.insert_introduction(&appointment).await
            } else {
                self.store.insert(&appointment).await.map_err(InsertError::from)
            };

            match inserted {
                Ok(stored) => return Ok(stored),
                Err(InsertError::Database(e)) if e.is_conflict() => {
                    warn!("Booking id {} already taken (attempt {}/{})",
                          appointment.booking_id, attempt, MAX_BOOKING_ID_ATTEMPTS);
                }
                Err(InsertError::Blocked(block)) => {
                    warn!("Introduction for user {} refused at write time: {}", appointment.user_id, block);
                    return Err(block.into());
                }
                Err(InsertError::Database(e)) => return Err(e.into()),
            }
        }

        Err(AppointmentError::BookingIdCollision)
    }

    // ==========================================================================
    // STATUS
    // ==========================================================================

    pub async fn update_status(
        &self,
        caller: Caller,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.require(appointment_id).await?;

        let actor = if caller.id == appointment.practitioner_id && caller.is_practitioner {
            StatusActor::Practitioner
        } else if caller.id == appointment.user_id {
            StatusActor::User
        } else if caller.is_admin {
            StatusActor::Operator
        } else {
            return Err(AppointmentError::Forbidden(
                "You are not a party to this appointment".to_string(),
            ));
        };

        if appointment.status == new_status {
            debug!("Appointment {} already {}", appointment_id, new_status);
            return self.with_practitioner(appointment).await;
        }

        self.lifecycle_service.validate_actor(actor, new_status)?;
        self.lifecycle_service.validate_status_transition(appointment.status, new_status)?;

        let updated = match self.store
            .update_status(appointment_id, appointment.status, new_status)
            .await?
        {
            Some(updated) => updated,
            None => {
                // Someone else moved the appointment first.
                let current = self.require(appointment_id).await?;
                if current.status != new_status {
                    return Err(AppointmentError::ConcurrentUpdate);
                }
                current
            }
        };

        info!("Appointment {} moved {} -> {} by {:?}",
              appointment_id, appointment.status, new_status, actor);
        self.with_practitioner(updated).await
    }

    // ==========================================================================
    // HANDSHAKE
    // ==========================================================================

    pub async fn submit_handshake(
        &self,
        caller: Caller,
        appointment_id: Uuid,
        party: HandshakeParty,
        agrees: bool,
    ) -> Result<HandshakeOutcome, AppointmentError> {
        for attempt in 1..=MAX_HANDSHAKE_ATTEMPTS {
            let appointment = self.require(appointment_id).await?;
            ensure_handshake_open(&caller, &appointment, party)?;

            let current = appointment.votes();
            let next = match cast_vote(self.handshake_mode, current, party, agrees)? {
                VoteChange::Unchanged => {
                    debug!("Repeated {} handshake on {} ignored", party, appointment_id);
                    return Ok(handshake_outcome(appointment, party));
                }
                VoteChange::Changed(next) => next,
            };

            match self.store.compare_and_set_handshake(appointment_id, current, next).await? {
                Some(updated) => {
                    info!("{} handshake on {} recorded, status now {}",
                          party, appointment_id, updated.handshake_status);
                    return Ok(handshake_outcome(updated, party));
                }
                None => {
                    warn!("Handshake on {} changed underneath us (attempt {}/{})",
                          appointment_id, attempt, MAX_HANDSHAKE_ATTEMPTS);
                }
            }
        }

        Err(AppointmentError::ConcurrentUpdate)
    }

    pub async fn get_handshake(
        &self,
        caller: Caller,
        appointment_id: Uuid,
    ) -> Result<HandshakeStatusView, AppointmentError> {
        let appointment = self.require_visible(caller, appointment_id).await?;
        Ok(HandshakeStatusView::from(&appointment))
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        caller: Caller,
        appointment_id: Uuid,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.require_visible(caller, appointment_id).await?;
        self.with_practitioner(appointment).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let appointments = self.store.list(&AppointmentFilter::for_user(user_id)).await?;
        self.attach_practitioners(appointments).await
    }

    pub async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let appointments = self.store
            .list(&AppointmentFilter::for_practitioner(practitioner_id))
            .await?;
        self.attach_practitioners(appointments).await
    }

    pub async fn user_stats(&self, user_id: Uuid) -> Result<UserSessionStats, AppointmentError> {
        let appointments = self.store.list(&AppointmentFilter::for_user(user_id)).await?;
        Ok(derive_user_stats(&appointments, Utc::now().date_naive()))
    }

    pub async fn practitioner_stats(
        &self,
        practitioner_id: Uuid,
    ) -> Result<PractitionerSessionStats, AppointmentError> {
        let appointments = self.store
            .list(&AppointmentFilter::for_practitioner(practitioner_id))
            .await?;
        Ok(derive_practitioner_stats(&appointments, Utc::now().date_naive()))
    }

    pub async fn clients(&self, practitioner_id: Uuid) -> Result<Vec<ClientSummary>, AppointmentError> {
        let appointments = self.store
            .list(&AppointmentFilter::for_practitioner(practitioner_id))
            .await?;
        Ok(derive_clients(&appointments))
    }

    async fn require(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(appointment_id).await?.ok_or(AppointmentError::NotFound)
    }

    async fn require_visible(&self, caller: Caller, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.require(appointment_id).await?;
        if !caller.is_party_to(&appointment) && !caller.is_admin {
            return Err(AppointmentError::Forbidden(
                "You are not a party to this appointment".to_string(),
            ));
        }
        Ok(appointment)
    }

    async fn with_practitioner(&self, appointment: Appointment) -> Result<AppointmentDetails, AppointmentError> {
        let practitioner = self.practitioners
            .get(appointment.practitioner_id)
            .await?
            .map(|p| p.summary());
        Ok(AppointmentDetails::new(appointment, practitioner))
    }

    async fn attach_practitioners(
        &self,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let mut summaries: HashMap<Uuid, Option<PractitionerSummary>> = HashMap::new();
        let mut details = Vec::with_capacity(appointments.len());

        for appointment in appointments {
            let summary = match summaries.get(&appointment.practitioner_id) {
                Some(summary) => summary.clone(),
                None => {
                    let summary = self.practitioners
                        .get(appointment.practitioner_id)
                        .await?
                        .map(|p| p.summary());
                    summaries.insert(appointment.practitioner_id, summary.clone());
                    summary
                }
            };
            details.push(AppointmentDetails::new(appointment, summary));
        }

        Ok(details)
    }
}

fn parse_slot(
    slot: &SessionSlot<'_>,
    today: NaiveDate,
) -> Result<(NaiveDate, chrono::NaiveTime), AppointmentError> {
    let date = parse_session_date(slot.date, today).map_err(AppointmentError::ValidationError)?;
    if date < today {
        return Err(AppointmentError::ValidationError(
            "Sessions cannot be booked in the past".to_string(),
        ));
    }
    let time = parse_session_time(slot.time).map_err(AppointmentError::ValidationError)?;
    Ok((date, time))
}

fn new_appointment(
    user_id: Uuid,
    practitioner: &Practitioner,
    date: NaiveDate,
    time: chrono::NaiveTime,
    slot: &SessionSlot<'_>,
    quote: SessionQuote,
) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        user_id,
        practitioner_id: practitioner.id,
        date,
        time,
        session_type: slot.session_type,
        booking_id: String::new(),
        status: AppointmentStatus::Confirmed,
        duration: quote.duration,
        session_price: quote.price,
        is_introductory_session: quote.is_introductory,
        handshake_status: HandshakeStatus::PendingUser,
        user_handshake: None,
        practitioner_handshake: None,
        handshake_completed: false,
        notes: slot.notes.clone(),
        session_link: None,
        session_started: None,
        session_ended: None,
        created_at: now,
        updated_at: now,
    }
}

fn ensure_handshake_open(
    caller: &Caller,
    appointment: &Appointment,
    party: HandshakeParty,
) -> Result<(), AppointmentError> {
    let is_party = match party {
        HandshakeParty::User => caller.id == appointment.user_id,
        HandshakeParty::Practitioner => caller.is_practitioner && caller.id == appointment.practitioner_id,
    };
    if !is_party {
        return Err(AppointmentError::Forbidden(format!(
            "Only the {} of this appointment can submit this handshake",
            party
        )));
    }
    if !appointment.is_introductory_session {
        return Err(AppointmentError::InvalidState(
            "Handshakes only apply to introductory sessions".to_string(),
        ));
    }
    if appointment.status != AppointmentStatus::Completed {
        return Err(AppointmentError::InvalidState(
            "The handshake opens once the introductory session is completed".to_string(),
        ));
    }
    Ok(())
}

fn handshake_outcome(appointment: Appointment, party: HandshakeParty) -> HandshakeOutcome {
    HandshakeOutcome {
        message: outcome_message(appointment.handshake_status, party).to_string(),
        appointment,
    }
}

fn is_upcoming(appointment: &Appointment, today: NaiveDate) -> bool {
    appointment.status == AppointmentStatus::Confirmed && appointment.date >= today
}

pub fn derive_user_stats(appointments: &[Appointment], today: NaiveDate) -> UserSessionStats {
    UserSessionStats {
        upcoming_sessions: appointments.iter().filter(|a| is_upcoming(a, today)).count(),
        completed_sessions: appointments.iter().filter(|a| a.status == AppointmentStatus::Completed).count(),
        cancelled_sessions: appointments.iter().filter(|a| a.status == AppointmentStatus::Cancelled).count(),
    }
}

pub fn derive_practitioner_stats(appointments: &[Appointment], today: NaiveDate) -> PractitionerSessionStats {
    let booked: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.status != AppointmentStatus::Cancelled)
        .collect();
    let clients: HashSet<Uuid> = booked.iter().map(|a| a.user_id).collect();

    PractitionerSessionStats {
        total_sessions: booked.len(),
        upcoming_sessions: booked.iter().filter(|a| is_upcoming(a, today)).count(),
        completed_sessions: booked.iter().filter(|a| a.status == AppointmentStatus::Completed).count(),
        clients: clients.len(),
    }
}

/// Distinct users with non-cancelled sessions, most recent first.
pub fn derive_clients(appointments: &[Appointment]) -> Vec<ClientSummary> {
    let mut by_user: BTreeMap<Uuid, ClientSummary> = BTreeMap::new();

    for appointment in appointments.iter().filter(|a| a.status != AppointmentStatus::Cancelled) {
        let entry = by_user.entry(appointment.user_id).or_insert(ClientSummary {
            user_id: appointment.user_id,
            sessions: 0,
            last_session_date: appointment.date,
            handshake_completed: false,
        });
        entry.sessions += 1;
        entry.last_session_date = entry.last_session_date.max(appointment.date);
        entry.handshake_completed |= appointment.handshake_completed;
    }

    let mut clients: Vec<ClientSummary> = by_user.into_values().collect();
    clients.sort_by(|a, b| b.last_session_date.cmp(&a.last_session_date));
    clients
}
