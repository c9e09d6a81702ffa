use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, MatchState};

/// Match decisions and discovery history. Paths are absolute because
/// `/practitioners/shown` sits beside the public practitioner routes.
pub fn match_routes(config: Arc<AppConfig>, service: MatchState) -> Router {
    Router::new()
        .route(
            "/matches",
            get(handlers::list_matches)
                .post(handlers::record_decision)
                .patch(handlers::set_messaged),
        )
        .route("/matches/remaining", get(handlers::remaining_practitioners))
        .route(
            "/practitioners/shown",
            get(handlers::list_shown)
                .post(handlers::add_shown)
                .delete(handlers::clear_shown),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(service)
}
