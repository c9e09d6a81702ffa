// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};
use std::fmt;

use practitioner_cell::{PractitionerError, PractitionerSummary};
use shared_database::DatabaseError;
use shared_models::error::AppError;

use crate::services::datetime::{self, display_time};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "display_time")]
    pub time: NaiveTime,
    pub session_type: SessionType,
    pub booking_id: String,
    pub status: AppointmentStatus,
    pub duration: String,
    pub session_price: f64,
    pub is_introductory_session: bool,
    pub handshake_status: HandshakeStatus,
    pub user_handshake: Option<bool>,
    pub practitioner_handshake: Option<bool>,
    pub handshake_completed: bool,
    pub notes: Option<String>,
    pub session_link: Option<String>,
    pub session_started: Option<DateTime<Utc>>,
    pub session_ended: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn votes(&self) -> HandshakeVotes {
        HandshakeVotes {
            user: self.user_handshake,
            practitioner: self.practitioner_handshake,
        }
    }

    /// Writes the votes together with the fields derived from them.
    pub fn apply_votes(&mut self, votes: HandshakeVotes) {
        self.user_handshake = votes.user;
        self.practitioner_handshake = votes.practitioner;
        self.handshake_status = votes.status();
        self.handshake_completed = votes.completed();
    }

    /// Chronological ordering key: session date, time, then creation.
    pub fn sort_key(&self) -> (NaiveDate, NaiveTime, DateTime<Utc>) {
        (self.date, self.time, self.created_at)
    }

    /// An introduction that still ties the user to this practitioner.
    pub fn is_active_introduction(&self) -> bool {
        if !self.is_introductory_session {
            return false;
        }
        match self.status {
            AppointmentStatus::Confirmed => true,
            AppointmentStatus::Completed => self.handshake_status.is_pending(),
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Video,
    Audio,
    Text,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Video => write!(f, "video"),
            SessionType::Audio => write!(f, "audio"),
            SessionType::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStatus {
    PendingUser,
    PendingPractitioner,
    Completed,
    Declined,
}

impl HandshakeStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, HandshakeStatus::PendingUser | HandshakeStatus::PendingPractitioner)
    }
}

impl fmt::Display for HandshakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeStatus::PendingUser => write!(f, "pending_user"),
            HandshakeStatus::PendingPractitioner => write!(f, "pending_practitioner"),
            HandshakeStatus::Completed => write!(f, "completed"),
            HandshakeStatus::Declined => write!(f, "declined"),
        }
    }
}

/// The two tri-state handshake votes of an appointment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeVotes {
    pub user: Option<bool>,
    pub practitioner: Option<bool>,
}

impl HandshakeVotes {
    pub fn status(&self) -> HandshakeStatus {
        match (self.user, self.practitioner) {
            (Some(false), _) | (_, Some(false)) => HandshakeStatus::Declined,
            (Some(true), Some(true)) => HandshakeStatus::Completed,
            (None, _) => HandshakeStatus::PendingUser,
            (Some(true), None) => HandshakeStatus::PendingPractitioner,
        }
    }

    pub fn completed(&self) -> bool {
        self.user == Some(true) && self.practitioner == Some(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeParty {
    User,
    Practitioner,
}

impl fmt::Display for HandshakeParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeParty::User => write!(f, "user"),
            HandshakeParty::Practitioner => write!(f, "practitioner"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    /// Defaults to the caller.
    pub user_id: Option<Uuid>,
    pub practitioner_id: Uuid,
    /// ISO date, RFC 3339 timestamp or a display date such as "Fri, Jun 27".
    pub date: String,
    /// "3:00 PM", "3 PM" or "15:00".
    pub time: String,
    pub session_type: SessionType,
    pub duration: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSessionRequest {
    pub user_id: Uuid,
    /// Must match the caller when present.
    pub practitioner_id: Option<Uuid>,
    pub date: String,
    pub time: String,
    pub session_type: SessionType,
    pub duration: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub agrees: bool,
}

/// An appointment with display fields and practitioner details attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub display_date: String,
    pub practitioner: Option<PractitionerSummary>,
}

impl AppointmentDetails {
    pub fn new(appointment: Appointment, practitioner: Option<PractitionerSummary>) -> Self {
        Self {
            display_date: datetime::format_display_date(appointment.date),
            appointment,
            practitioner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeStatusView {
    pub appointment_id: Uuid,
    pub user_handshake: Option<bool>,
    pub practitioner_handshake: Option<bool>,
    pub handshake_completed: bool,
    pub handshake_status: HandshakeStatus,
    pub is_introductory_session: bool,
}

impl From<&Appointment> for HandshakeStatusView {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id,
            user_handshake: appointment.user_handshake,
            practitioner_handshake: appointment.practitioner_handshake,
            handshake_completed: appointment.handshake_completed,
            handshake_status: appointment.handshake_status,
            is_introductory_session: appointment.is_introductory_session,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeOutcome {
    pub appointment: Appointment,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSessionStats {
    pub upcoming_sessions: usize,
    pub completed_sessions: usize,
    pub cancelled_sessions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerSessionStats {
    pub total_sessions: usize,
    pub upcoming_sessions: usize,
    pub completed_sessions: usize,
    pub clients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub user_id: Uuid,
    pub sessions: usize,
    pub last_session_date: NaiveDate,
    pub handshake_completed: bool,
}

/// Authenticated identity as seen by the appointment services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub is_practitioner: bool,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(id: Uuid) -> Self {
        Self { id, is_practitioner: false, is_admin: false }
    }

    pub fn practitioner(id: Uuid) -> Self {
        Self { id, is_practitioner: true, is_admin: false }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, is_practitioner: false, is_admin: true }
    }

    pub fn is_party_to(&self, appointment: &Appointment) -> bool {
        self.id == appointment.user_id || self.id == appointment.practitioner_id
    }
}

/// Store-side selection of appointments.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub user_id: Option<Uuid>,
    pub practitioner_id: Option<Uuid>,
    /// Empty means any status.
    pub statuses: Vec<AppointmentStatus>,
    pub introductory: Option<bool>,
}

impl AppointmentFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self { user_id: Some(user_id), ..Self::default() }
    }

    pub fn for_practitioner(practitioner_id: Uuid) -> Self {
        Self { practitioner_id: Some(practitioner_id), ..Self::default() }
    }

    pub fn for_pair(user_id: Uuid, practitioner_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            practitioner_id: Some(practitioner_id),
            ..Self::default()
        }
    }

    pub fn introductory(mut self, introductory: bool) -> Self {
        self.introductory = Some(introductory);
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.user_id.map_or(true, |id| appointment.user_id == id)
            && self.practitioner_id.map_or(true, |id| appointment.practitioner_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&appointment.status))
            && self.introductory.map_or(true, |intro| appointment.is_introductory_session == intro)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Reasons a new booking for a (user, practitioner) pair is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BookingBlock {
    #[error("Your introductory session with this practitioner has not taken place yet")]
    IntroductionScheduled,

    #[error("Please complete the handshake for your introductory session first")]
    HandshakeRequired,

    #[error("Waiting for the practitioner to confirm the handshake")]
    AwaitingPractitioner,

    #[error("No match with this practitioner - please try a different practitioner")]
    HandshakeDeclined,

    #[error("You already have an active introductory session with another practitioner")]
    ActiveIntroductionElsewhere,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Practitioner not found")]
    PractitionerNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    BookingBlocked(#[from] BookingBlock),

    #[error("Handshake already submitted by the {0}")]
    HandshakeAlreadySubmitted(HandshakeParty),

    #[error("Could not allocate a unique booking id, please retry")]
    BookingIdCollision,

    #[error("Appointment was modified concurrently, please retry")]
    ConcurrentUpdate,

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

impl From<PractitionerError> for AppointmentError {
    fn from(e: PractitionerError) -> Self {
        match e {
            PractitionerError::NotFound => AppointmentError::PractitionerNotFound,
            PractitionerError::Database(db) => AppointmentError::DatabaseError(db),
            PractitionerError::Seed(msg) => AppointmentError::InvalidState(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound | AppointmentError::PractitionerNotFound => {
                AppError::NotFound(e.to_string())
            }
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::InvalidState(_)
            | AppointmentError::BookingBlocked(_)
            | AppointmentError::HandshakeAlreadySubmitted(_)
            | AppointmentError::BookingIdCollision
            | AppointmentError::ConcurrentUpdate => AppError::Conflict(e.to_string()),
            AppointmentError::DatabaseError(db) => AppError::Database(db.to_string()),
        }
    }
}
