// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{caller_id, practitioner_caller_id};

use crate::models::{
    Caller, CreateAppointmentRequest, HandshakeParty, HandshakeRequest, ScheduleSessionRequest,
    UpdateStatusRequest,
};
use crate::services::booking::AppointmentBookingService;

pub type AppointmentState = Arc<AppointmentBookingService>;

fn caller(user: &User) -> Result<Caller, AppError> {
    Ok(Caller {
        id: caller_id(user)?,
        is_practitioner: user.is_practitioner(),
        is_admin: user.is_admin(),
    })
}

// ==============================================================================
// USER APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(service): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = service.list_for_user(caller_id(&user)?).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(service): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let details = service.create_appointment(caller(&user)?, request).await?;

    let message = if details.appointment.is_introductory_session {
        "Introductory session booked successfully"
    } else {
        "Session booked successfully"
    };

    Ok(Json(json!({
        "success": true,
        "appointment": details,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn get_user_stats(
    State(service): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let stats = service.user_stats(caller_id(&user)?).await?;
    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let details = service.get_appointment(caller(&user)?, appointment_id).await?;
    Ok(Json(json!(details)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(service): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("Status change to {} requested for {}", request.status, appointment_id);

    let details = service
        .update_status(caller(&user)?, appointment_id, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": details,
        "message": format!("Appointment is {}", request.status)
    })))
}

// ==============================================================================
// HANDSHAKE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_user_handshake(
    State(service): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<HandshakeRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = service
        .submit_handshake(caller(&user)?, appointment_id, HandshakeParty::User, request.agrees)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "message": outcome.message
    })))
}

#[axum::debug_handler]
pub async fn get_handshake_status(
    State(service): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let view = service.get_handshake(caller(&user)?, appointment_id).await?;
    Ok(Json(json!(view)))
}

// ==============================================================================
// PRACTITIONER PORTAL HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn schedule_session(
    State(service): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<ScheduleSessionRequest>,
) -> Result<Json<Value>, AppError> {
    practitioner_caller_id(&user)?;
    let details = service.schedule_follow_up(caller(&user)?, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": details,
        "message": "Follow-up session scheduled"
    })))
}

#[axum::debug_handler]
pub async fn list_practitioner_appointments(
    State(service): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let practitioner_id = practitioner_caller_id(&user)?;
    let appointments = service.list_for_practitioner(practitioner_id).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_practitioner_clients(
    State(service): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let practitioner_id = practitioner_caller_id(&user)?;
    let clients = service.clients(practitioner_id).await?;

    Ok(Json(json!({
        "clients": clients,
        "total": clients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_practitioner_stats(
    State(service): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let practitioner_id = practitioner_caller_id(&user)?;
    let stats = service.practitioner_stats(practitioner_id).await?;
    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn submit_practitioner_handshake(
    State(service): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<HandshakeRequest>,
) -> Result<Json<Value>, AppError> {
    practitioner_caller_id(&user)?;
    let outcome = service
        .submit_handshake(caller(&user)?, appointment_id, HandshakeParty::Practitioner, request.agrees)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "message": outcome.message
    })))
}
