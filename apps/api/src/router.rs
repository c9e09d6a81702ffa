use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, practitioner_portal_routes};
use appointment_cell::{AppointmentBookingService, AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
use match_cell::router::match_routes;
use match_cell::{InMemoryMatchStore, MatchService, MatchStore, SupabaseMatchStore};
use practitioner_cell::router::practitioner_routes;
use practitioner_cell::{
    InMemoryPractitionerStore, PractitionerError, PractitionerStore, SupabasePractitionerStore,
};
use shared_config::AppConfig;

/// Persistence backends shared by every cell.
pub struct AppStores {
    pub practitioners: Arc<dyn PractitionerStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub matches: Arc<dyn MatchStore>,
}

impl AppStores {
    pub fn supabase(config: &AppConfig) -> Self {
        Self {
            practitioners: Arc::new(SupabasePractitionerStore::new(config)),
            appointments: Arc::new(SupabaseAppointmentStore::new(config)),
            matches: Arc::new(SupabaseMatchStore::new(config)),
        }
    }

    /// Process-local stores, seeded with practitioners when a seed file is configured.
    pub fn in_memory(config: &AppConfig) -> Result<Self, PractitionerError> {
        let practitioners = match &config.practitioner_seed_file {
            Some(path) => InMemoryPractitionerStore::from_seed_file(path)?,
            None => InMemoryPractitionerStore::new(),
        };

        Ok(Self::with_practitioners(practitioners))
    }

    pub fn with_practitioners(practitioners: InMemoryPractitionerStore) -> Self {
        Self {
            practitioners: Arc::new(practitioners),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            matches: Arc::new(InMemoryMatchStore::new()),
        }
    }
}

pub fn create_router(config: Arc<AppConfig>, stores: AppStores) -> Router {
    let booking = Arc::new(AppointmentBookingService::new(
        &config,
        stores.appointments,
        stores.practitioners.clone(),
    ));
    let matching = Arc::new(MatchService::new(
        &config,
        stores.matches,
        stores.practitioners.clone(),
    ));

    Router::new()
        .route("/", get(|| async { "Wellness sessions API is running!" }))
        .nest("/appointments", appointment_routes(config.clone(), booking.clone()))
        .nest("/practitioner", practitioner_portal_routes(config.clone(), booking))
        .merge(match_routes(config, matching))
        .merge(practitioner_routes(stores.practitioners))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn app() -> (Router, Arc<AppConfig>) {
        let config = TestConfig::default().to_arc();
        let stores = AppStores::with_practitioners(InMemoryPractitionerStore::new());
        (create_router(config.clone(), stores), config)
    }

    async fn get(app: &Router, uri: &str, authorization: Option<String>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        let response = app.clone().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_liveness() {
        let (app, _) = app();
        let (status, body) = get(&app, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(String::from_utf8(body).unwrap(), "Wellness sessions API is running!");
    }

    #[tokio::test]
    async fn test_shown_route_is_not_a_profile_lookup() {
        let (app, config) = app();
        let user = TestUser::user("client@example.com");

        let (status, _) = get(&app, "/practitioners/shown", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = get(&app, "/practitioners/shown", Some(JwtTestUtils::bearer(&user, &config))).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["total"], 0);

        let (status, _) = get(&app, "/practitioners", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_every_cell_is_mounted_behind_auth() {
        let (app, _) = app();

        for uri in ["/appointments", "/appointments/stats", "/matches", "/practitioner/stats"] {
            let (status, body) = get(&app, uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            let json: Value = serde_json::from_slice(&body).unwrap();
            assert!(json["error"].is_string());
        }
    }
}
