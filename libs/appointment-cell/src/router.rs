// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

/// User-facing booking, status and handshake routes, mounted at `/appointments`.
pub fn appointment_routes(config: Arc<AppConfig>, service: AppointmentState) -> Router {
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::create_appointment))
        .route("/stats", get(handlers::get_user_stats))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route(
            "/{appointment_id}/handshake",
            get(handlers::get_handshake_status).post(handlers::submit_user_handshake),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}

/// Practitioner portal routes, mounted at `/practitioner`.
pub fn practitioner_portal_routes(config: Arc<AppConfig>, service: AppointmentState) -> Router {
    Router::new()
        .route("/schedule-session", post(handlers::schedule_session))
        .route("/appointments", get(handlers::list_practitioner_appointments))
        .route("/clients", get(handlers::list_practitioner_clients))
        .route("/stats", get(handlers::get_practitioner_stats))
        .route(
            "/appointments/{appointment_id}/handshake",
            post(handlers::submit_practitioner_handshake),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
