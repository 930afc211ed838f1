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

fn post_rating(appointment_id: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/{}/rate", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn mount_appointment_fetch(mock_server: &MockServer, appointment: &Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment["id"].as_str().unwrap())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn rating_completed_appointment_updates_doctor_summary() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();

    let completed = MockStoreResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &doctor_id,
        "2024-01-10",
        "09:00",
        "completed",
    );
    mount_appointment_fetch(&mock_server, &completed).await;

    // Rating write lands on the appointment row.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::rated_appointment_response(&appointment_id, &patient.id, &doctor_id, 5)
        ])))
        .mount(&mock_server)
        .await;

    // Aggregator rescan sees exactly one rated appointment.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "rating"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "rating": { "value": 5, "comment": null, "rated_at": "2024-01-11T00:00:00Z" } }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_response(&doctor_id, "Dr. Test", 80.0)
        ])))
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(post_rating(&appointment_id, &token, &json!({ "value": 5, "comment": "Great" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["doctor_rating"]["average"], json!(5.0));
    assert_eq!(body["doctor_rating"]["count"], json!(1));
}

#[tokio::test]
async fn second_rating_fails_with_already_rated() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();

    let rated = MockStoreResponses::rated_appointment_response(
        &appointment_id,
        &patient.id,
        &doctor_id,
        4,
    );
    mount_appointment_fetch(&mock_server, &rated).await;

    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(post_rating(&appointment_id, &token, &json!({ "value": 5 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["kind"], json!("already_rated"));
}

#[tokio::test]
async fn rating_someone_elses_appointment_is_forbidden() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let owner = TestUser::patient("owner@example.com");
    let stranger = TestUser::patient("stranger@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let completed = MockStoreResponses::appointment_response(
        &appointment_id,
        &owner.id,
        &Uuid::new_v4().to_string(),
        "2024-01-10",
        "09:00",
        "completed",
    );
    mount_appointment_fetch(&mock_server, &completed).await;

    let token = JwtTestUtils::create_test_token(&stranger, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(post_rating(&appointment_id, &token, &json!({ "value": 5 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = read_json(response).await;
    assert_eq!(body["kind"], json!("forbidden"));
}

#[tokio::test]
async fn rating_a_scheduled_appointment_is_invalid_state() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let scheduled = MockStoreResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &Uuid::new_v4().to_string(),
        "2099-01-10",
        "09:00",
        "scheduled",
    );
    mount_appointment_fetch(&mock_server, &scheduled).await;

    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(post_rating(&appointment_id, &token, &json!({ "value": 5 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["kind"], json!("invalid_state"));
}

#[tokio::test]
async fn out_of_range_value_fails_validation() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    for value in [0, 6, -1] {
        let response = create_test_app(&config)
            .oneshot(post_rating(
                &Uuid::new_v4().to_string(),
                &token,
                &json!({ "value": value }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn failed_recompute_keeps_the_rating() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_store_url(&mock_server.uri());

    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();

    let completed = MockStoreResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &doctor_id,
        "2024-01-10",
        "09:00",
        "completed",
    );
    mount_appointment_fetch(&mock_server, &completed).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::rated_appointment_response(&appointment_id, &patient.id, &doctor_id, 5)
        ])))
        .mount(&mock_server)
        .await;

    // The aggregator's rescan blows up after the rating write.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "rating"))
        .respond_with(ResponseTemplate::new(500).set_body_string("storage offline"))
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let response = create_test_app(&config)
        .oneshot(post_rating(&appointment_id, &token, &json!({ "value": 5 })))
        .await
        .unwrap();

    // Rating already persisted: the request still succeeds, with a stale
    // (absent) summary.
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["doctor_rating"], json!(null));
}
