use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

fn create_test_app(config: &TestConfig) -> Router {
    appointment_routes(config.to_arc())
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be json")
}

fn patch_request(uri: String, token: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");

    match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn mount_appointment_fetch(mock_server: &MockServer, appointment: &Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment["id"].as_str().unwrap())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(mock_server)
        .await;
}

async fn mount_patch_result(mock_server: &MockServer, appointment: &Value) {
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn owner_cancels_scheduled_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();

    let scheduled = MockStoreResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &doctor_id,
        "2099-01-10",
        "09:00",
        "scheduled",
    );
    mount_appointment_fetch(&mock_server, &scheduled).await;

    let cancelled = MockStoreResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &doctor_id,
        "2099-01-10",
        "09:00",
        "cancelled",
    );
    mount_patch_result(&mock_server, &cancelled).await;

    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(patch_request(format!("/{}/cancel", appointment_id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["appointment"]["status"], json!("cancelled"));
}

#[tokio::test]
async fn stranger_cannot_cancel() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let stranger = TestUser::patient("stranger@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let scheduled = MockStoreResponses::appointment_response(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "2099-01-10",
        "09:00",
        "scheduled",
    );
    mount_appointment_fetch(&mock_server, &scheduled).await;

    let token = JwtTestUtils::create_test_token(&stranger, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(patch_request(format!("/{}/cancel", appointment_id), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn own_doctor_confirms_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let doctor = TestUser::doctor("doctor@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let scheduled = MockStoreResponses::appointment_response(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        &doctor.id,
        "2099-01-10",
        "09:00",
        "scheduled",
    );
    mount_appointment_fetch(&mock_server, &scheduled).await;

    let confirmed = MockStoreResponses::appointment_response(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        &doctor.id,
        "2099-01-10",
        "09:00",
        "confirmed",
    );
    mount_patch_result(&mock_server, &confirmed).await;

    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(patch_request(
            format!("/{}/status", appointment_id),
            &token,
            Some(&json!({ "status": "confirmed" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["appointment"]["status"], json!("confirmed"));
}

#[tokio::test]
async fn terminal_appointments_reject_every_transition() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);

    for terminal in ["completed", "cancelled", "missed"] {
        for target in ["confirmed", "completed", "cancelled", "missed"] {
            let appointment_id = Uuid::new_v4().to_string();
            let appointment = MockStoreResponses::appointment_response(
                &appointment_id,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "2024-01-10",
                "09:00",
                terminal,
            );
            mount_appointment_fetch(&mock_server, &appointment).await;

            let response = create_test_app(&config)
                .oneshot(patch_request(
                    format!("/{}/status", appointment_id),
                    &token,
                    Some(&json!({ "status": target })),
                ))
                .await
                .unwrap();

            assert_eq!(
                response.status(),
                StatusCode::CONFLICT,
                "transition {} -> {} should be rejected",
                terminal,
                target
            );
            let body = read_json(response).await;
            assert_eq!(body["kind"], json!("invalid_state"));
        }
    }
}

#[tokio::test]
async fn reschedule_onto_occupied_slot_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();

    let scheduled = MockStoreResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &doctor_id,
        "2099-01-10",
        "09:00",
        "scheduled",
    );
    mount_appointment_fetch(&mock_server, &scheduled).await;

    // The target slot is held by a different live appointment.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("time", "eq.10:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &doctor_id,
                "2099-01-10",
                "10:00",
                "scheduled",
            )
        ])))
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "time": "10:00" }).to_string()))
        .unwrap();

    let response = create_test_app(&config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["kind"], json!("conflict"));
}
