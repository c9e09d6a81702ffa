use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::router::{appointment_routes, practitioner_portal_routes};
use appointment_cell::{AppointmentBookingService, InMemoryAppointmentStore};
use practitioner_cell::{InMemoryPractitionerStore, Practitioner};
use shared_config::{AppConfig, HandshakeMode};
use shared_models::auth::ROLE_PRACTITIONER;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    router: Router,
    config: Arc<AppConfig>,
}

impl TestApp {
    fn new(mode: HandshakeMode, practitioners: Vec<Practitioner>) -> Self {
        let config = Arc::new(AppConfig {
            handshake_mode: mode,
            ..TestConfig::default().to_app_config()
        });
        let store = Arc::new(InMemoryAppointmentStore::new());
        let roster = Arc::new(InMemoryPractitionerStore::with_practitioners(practitioners));
        let service = Arc::new(AppointmentBookingService::new(&config, store, roster));

        let router = Router::new()
            .nest("/appointments", appointment_routes(config.clone(), service.clone()))
            .nest("/practitioner", practitioner_portal_routes(config.clone(), service));

        Self { router, config }
    }

    async fn send(&self, method: &str, uri: &str, caller: Option<&TestUser>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header("authorization", JwtTestUtils::bearer(caller, &self.config));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn book(&self, user: &TestUser, practitioner_id: Uuid) -> (StatusCode, Value) {
        self.send("POST", "/appointments", Some(user), Some(json!({
            "practitionerId": practitioner_id,
            "date": "2030-01-04",
            "time": "3 PM",
            "sessionType": "video"
        }))).await
    }

    async fn complete(&self, practitioner: &TestUser, appointment_id: &str) {
        let (status, _) = self.send(
            "PATCH",
            &format!("/appointments/{}/status", appointment_id),
            Some(practitioner),
            Some(json!({ "status": "completed" })),
        ).await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn user_handshake(&self, user: &TestUser, appointment_id: &str, agrees: bool) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/appointments/{}/handshake", appointment_id),
            Some(user),
            Some(json!({ "agrees": agrees })),
        ).await
    }
}

fn practitioner(name: &str, price: f64) -> Practitioner {
    Practitioner {
        id: Uuid::new_v4(),
        name: name.to_string(),
        title: Some("Clinical Psychologist".to_string()),
        specialties: vec!["burnout".to_string()],
        languages: vec!["en".to_string()],
        bio: None,
        profile_image_url: None,
        price,
        rating: 4.7,
        is_active: true,
        created_at: Utc::now(),
    }
}

fn practitioner_user(practitioner: &Practitioner) -> TestUser {
    TestUser::with_id(practitioner.id, "practitioner@example.com", ROLE_PRACTITIONER)
}

fn appointment_id(body: &Value) -> String {
    body["appointment"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new(HandshakeMode::TwoParty, vec![]);

    for (method, uri) in [
        ("GET", "/appointments"),
        ("POST", "/appointments"),
        ("GET", "/appointments/stats"),
        ("GET", "/practitioner/clients"),
    ] {
        let (status, body) = app.send(method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert!(body.get("appointments").is_none());
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_two_party_success_path() {
    let p = practitioner("Jordan Reyes", 180.0);
    let app = TestApp::new(HandshakeMode::TwoParty, vec![p.clone()]);
    let user = TestUser::user("client@example.com");
    let portal = practitioner_user(&p);

    let (status, intro) = app.book(&user, p.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intro["appointment"]["isIntroductorySession"], true);
    assert_eq!(intro["appointment"]["sessionPrice"], 99.0);
    assert_eq!(intro["appointment"]["duration"], "20 minutes");
    assert_eq!(intro["appointment"]["status"], "confirmed");
    assert_eq!(intro["appointment"]["handshakeStatus"], "pending_user");
    assert_eq!(intro["appointment"]["time"], "3:00 PM");
    assert_eq!(intro["appointment"]["displayDate"], "Fri, Jan 4");
    assert_eq!(intro["appointment"]["practitioner"]["name"], "Jordan Reyes");
    assert!(intro["appointment"]["bookingId"].as_str().unwrap().starts_with("BK"));
    let intro_id = appointment_id(&intro);

    // The introduction has not happened yet.
    let (status, _) = app.book(&user, p.id).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.complete(&portal, &intro_id).await;

    let (status, body) = app.book(&user, p.id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("handshake"));

    let (status, body) = app.user_handshake(&user, &intro_id, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["handshakeStatus"], "pending_practitioner");
    assert_eq!(body["appointment"]["handshakeCompleted"], false);

    let (status, body) = app.book(&user, p.id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("practitioner"));

    let (status, body) = app.send(
        "POST",
        &format!("/practitioner/appointments/{}/handshake", intro_id),
        Some(&portal),
        Some(json!({ "agrees": true })),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["handshakeStatus"], "completed");
    assert_eq!(body["appointment"]["handshakeCompleted"], true);
    assert!(body["message"].as_str().unwrap().contains("unlocked"));

    let (status, regular) = app.book(&user, p.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(regular["appointment"]["isIntroductorySession"], false);
    assert_eq!(regular["appointment"]["sessionPrice"], 180.0);
    assert_eq!(regular["appointment"]["duration"], "50 minutes");
    assert_ne!(regular["appointment"]["bookingId"], intro["appointment"]["bookingId"]);

    let (status, listing) = app.send("GET", "/appointments", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 2);
}

#[tokio::test]
async fn test_mirror_mode_completes_on_user_vote() {
    let p = practitioner("Sam Okafor", 150.0);
    let app = TestApp::new(HandshakeMode::Mirror, vec![p.clone()]);
    let user = TestUser::user("client@example.com");
    let portal = practitioner_user(&p);

    let (_, intro) = app.book(&user, p.id).await;
    let intro_id = appointment_id(&intro);
    app.complete(&portal, &intro_id).await;

    let (status, body) = app.user_handshake(&user, &intro_id, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["userHandshake"], true);
    assert_eq!(body["appointment"]["practitionerHandshake"], true);
    assert_eq!(body["appointment"]["handshakeCompleted"], true);

    let (status, view) = app.send("GET", &format!("/appointments/{}/handshake", intro_id), Some(&portal), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["handshakeStatus"], "completed");
    assert_eq!(view["isIntroductorySession"], true);

    // Independent practitioner votes do not exist in this mode.
    let (status, _) = app.send(
        "POST",
        &format!("/practitioner/appointments/{}/handshake", intro_id),
        Some(&portal),
        Some(json!({ "agrees": true })),
    ).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, regular) = app.book(&user, p.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(regular["appointment"]["sessionPrice"], 150.0);
}

#[tokio::test]
async fn test_decline_path_steers_to_other_practitioners() {
    let first = practitioner("Riley Chen", 160.0);
    let second = practitioner("Devon Hart", 140.0);
    let app = TestApp::new(HandshakeMode::Mirror, vec![first.clone(), second.clone()]);
    let user = TestUser::user("client@example.com");

    let (_, intro) = app.book(&user, first.id).await;
    let intro_id = appointment_id(&intro);
    app.complete(&practitioner_user(&first), &intro_id).await;

    let (status, body) = app.user_handshake(&user, &intro_id, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["handshakeStatus"], "declined");
    assert_eq!(body["appointment"]["handshakeCompleted"], false);
    assert!(body["message"].as_str().unwrap().contains("other practitioners"));

    let (status, body) = app.book(&user, first.id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("different practitioner"));

    // The practitioner cannot route around the decline either.
    let (status, body) = app.send("POST", "/practitioner/schedule-session", Some(&practitioner_user(&first)), Some(json!({
        "userId": user.uuid(),
        "date": "2030-02-01",
        "time": "10:30",
        "sessionType": "audio"
    }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("different practitioner"));

    let (status, other) = app.book(&user, second.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(other["appointment"]["isIntroductorySession"], true);
    assert_eq!(other["appointment"]["sessionPrice"], 99.0);
}

#[tokio::test]
async fn test_repeated_handshake_is_idempotent_and_final() {
    let p = practitioner("Alex Moreau", 120.0);
    let app = TestApp::new(HandshakeMode::TwoParty, vec![p.clone()]);
    let user = TestUser::user("client@example.com");

    let (_, intro) = app.book(&user, p.id).await;
    let intro_id = appointment_id(&intro);
    app.complete(&practitioner_user(&p), &intro_id).await;

    let (_, first) = app.user_handshake(&user, &intro_id, true).await;
    let (status, second) = app.user_handshake(&user, &intro_id, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["appointment"], second["appointment"]);

    let (status, _) = app.user_handshake(&user, &intro_id, false).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_one_active_introduction_per_user() {
    let first = practitioner("Kai Novak", 130.0);
    let second = practitioner("Noor Malik", 170.0);
    let app = TestApp::new(HandshakeMode::TwoParty, vec![first.clone(), second.clone()]);
    let user = TestUser::user("client@example.com");

    let (status, _) = app.book(&user, first.id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.book(&user, second.id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("another practitioner"));
}

#[tokio::test]
async fn test_booking_errors() {
    let p = practitioner("Mika Sato", 110.0);
    let app = TestApp::new(HandshakeMode::TwoParty, vec![p.clone()]);
    let user = TestUser::user("client@example.com");

    let (status, body) = app.book(&user, Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Practitioner not found");

    let (status, _) = app.send("POST", "/appointments", Some(&user), Some(json!({
        "userId": Uuid::new_v4(),
        "practitionerId": p.id,
        "date": "2030-01-04",
        "time": "3 PM",
        "sessionType": "video"
    }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("POST", "/appointments", Some(&user), Some(json!({
        "practitionerId": p.id,
        "date": "2020-01-03",
        "time": "3 PM",
        "sessionType": "video"
    }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send("GET", &format!("/appointments/{}", Uuid::new_v4()), Some(&user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_changes_follow_lifecycle() {
    let p = practitioner("Ari Bloom", 150.0);
    let app = TestApp::new(HandshakeMode::TwoParty, vec![p.clone()]);
    let user = TestUser::user("client@example.com");
    let stranger = TestUser::user("stranger@example.com");

    let (_, booked) = app.book(&user, p.id).await;
    let id = appointment_id(&booked);
    let uri = format!("/appointments/{}/status", id);

    let (status, _) = app.send("PATCH", &uri, Some(&user), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", &format!("/appointments/{}", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("PATCH", &uri, Some(&user), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");

    let (status, _) = app.send("PATCH", &uri, Some(&user), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("PATCH", &uri, Some(&practitioner_user(&p)), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A cancelled introduction does not count as history.
    let (status, again) = app.book(&user, p.id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["appointment"]["isIntroductorySession"], true);
}

#[tokio::test]
async fn test_practitioner_portal() {
    let p = practitioner("Lee Park", 200.0);
    let app = TestApp::new(HandshakeMode::TwoParty, vec![p.clone()]);
    let user = TestUser::user("client@example.com");
    let portal = practitioner_user(&p);

    let (status, _) = app.send("GET", "/practitioner/appointments", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let follow_up = json!({
        "userId": user.uuid(),
        "date": "2030-02-01",
        "time": "10:30",
        "sessionType": "audio"
    });
    let (status, _) = app.send("POST", "/practitioner/schedule-session", Some(&portal), Some(follow_up.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, intro) = app.book(&user, p.id).await;
    let id = appointment_id(&intro);
    app.complete(&portal, &id).await;

    // No follow-up until both sides agreed to continue.
    let (status, body) = app.send("POST", "/practitioner/schedule-session", Some(&portal), Some(follow_up.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("handshake"));

    app.user_handshake(&user, &id, true).await;
    let (status, _) = app.send(
        "POST",
        &format!("/practitioner/appointments/{}/handshake", id),
        Some(&portal),
        Some(json!({ "agrees": true })),
    ).await;
    assert_eq!(status, StatusCode::OK);

    let (status, scheduled) = app.send("POST", "/practitioner/schedule-session", Some(&portal), Some(follow_up)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduled["appointment"]["sessionPrice"], 200.0);
    assert_eq!(scheduled["appointment"]["time"], "10:30 AM");

    let (status, listing) = app.send("GET", "/practitioner/appointments", Some(&portal), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 2);
    assert_eq!(listing["appointments"][0]["date"], "2030-01-04");

    let (_, clients) = app.send("GET", "/practitioner/clients", Some(&portal), None).await;
    assert_eq!(clients["total"], 1);
    assert_eq!(clients["clients"][0]["sessions"], 2);

    let (_, stats) = app.send("GET", "/practitioner/stats", Some(&portal), None).await;
    assert_eq!(stats["totalSessions"], 2);
    assert_eq!(stats["upcomingSessions"], 1);
    assert_eq!(stats["completedSessions"], 1);
    assert_eq!(stats["clients"], 1);

    let (_, user_stats) = app.send("GET", "/appointments/stats", Some(&user), None).await;
    assert_eq!(user_stats["upcomingSessions"], 1);
    assert_eq!(user_stats["completedSessions"], 1);
    assert_eq!(user_stats["cancelledSessions"], 0);
}
