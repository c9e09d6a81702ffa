use axum::{routing::get, Router};

use crate::handlers::{self, PractitionerState};

/// Public roster reads; no authentication required.
pub fn practitioner_routes(store: PractitionerState) -> Router {
    Router::new()
        .route("/practitioners", get(handlers::list_practitioners))
        .route("/practitioners/{practitioner_id}", get(handlers::get_practitioner))
        .with_state(store)
}
