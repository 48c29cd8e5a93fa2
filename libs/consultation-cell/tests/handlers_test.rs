use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use consultation_cell::router::consultation_routes;
use shared_config::AppConfig;

const AUTH_TOKEN: &str = "test-token";

fn create_test_app(mock_server: &MockServer) -> Router {
    let config = AppConfig {
        supabase_url: mock_server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        notification_webhook_url: String::new(),
    };
    consultation_routes(Arc::new(config))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", AUTH_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", AUTH_TOKEN))
        .body(Body::empty())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn next_week_at(hour: u32, minute: u32) -> DateTime<Utc> {
    (Utc::now() + Duration::days(7))
        .date_naive()
        .and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
        .and_utc()
}

fn consultation_row(
    id: Uuid,
    practitioner_id: Uuid,
    owner_id: Uuid,
    start: DateTime<Utc>,
    status: &str,
) -> Value {
    let now = Utc::now();
    json!({
        "id": id,
        "appointment_id": Uuid::new_v4(),
        "pet_id": Uuid::new_v4(),
        "owner_id": owner_id,
        "practitioner_id": practitioner_id,
        "scheduled_start_time": start.to_rfc3339(),
        "scheduled_end_time": (start + Duration::minutes(30)).to_rfc3339(),
        "duration_minutes": 30,
        "status": status,
        "specialty": "general",
        "fee": 75.0,
        "room_reference": "vetroom-test",
        "recording_url": null,
        "notes": null,
        "diagnosis": null,
        "treatment": null,
        "prescription": null,
        "cancellation_reason": null,
        "actual_start_time": null,
        "actual_end_time": null,
        "created_at": now.to_rfc3339(),
        "updated_at": now.to_rfc3339()
    })
}

#[tokio::test]
async fn test_schedule_consultation_endpoint_success() {
    let mock_server = MockServer::start().await;
    let practitioner_id = Uuid::new_v4();
    let start = next_week_at(10, 0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/consultations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([consultation_row(
            Uuid::new_v4(),
            practitioner_id,
            Uuid::new_v4(),
            start,
            "scheduled"
        )])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"status": "confirmed"}])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(post_json(
            "/",
            json!({
                "appointment_id": Uuid::new_v4(),
                "pet_id": Uuid::new_v4(),
                "owner_id": Uuid::new_v4(),
                "practitioner_id": practitioner_id,
                "scheduled_start_time": start.to_rfc3339(),
                "duration_minutes": 30,
                "specialty": "general"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["consultation"]["status"], json!("scheduled"));
}

#[tokio::test]
async fn test_schedule_consultation_endpoint_conflict() {
    let mock_server = MockServer::start().await;
    let practitioner_id = Uuid::new_v4();

    let existing = consultation_row(
        Uuid::new_v4(),
        practitioner_id,
        Uuid::new_v4(),
        next_week_at(10, 0),
        "scheduled",
    );
    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(post_json(
            "/",
            json!({
                "appointment_id": Uuid::new_v4(),
                "pet_id": Uuid::new_v4(),
                "owner_id": Uuid::new_v4(),
                "practitioner_id": practitioner_id,
                "scheduled_start_time": next_week_at(10, 20).to_rfc3339(),
                "duration_minutes": 30,
                "specialty": "general"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_schedule_consultation_endpoint_validation_error() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let response = app
        .oneshot(post_json(
            "/",
            json!({
                "appointment_id": Uuid::new_v4(),
                "pet_id": Uuid::new_v4(),
                "owner_id": Uuid::new_v4(),
                "practitioner_id": Uuid::new_v4(),
                "scheduled_start_time": next_week_at(10, 0).to_rfc3339(),
                "duration_minutes": 90,
                "specialty": "general"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_schedule_consultation_endpoint_requires_bearer() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(&mock_server);

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_consultation_endpoint_not_found() {
    let mock_server = MockServer::start().await;
    let consultation_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("id", format!("eq.{}", consultation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(get_request(&format!("/{}", consultation_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_consultation_endpoint_outside_window() {
    let mock_server = MockServer::start().await;
    let consultation_id = Uuid::new_v4();
    let practitioner_id = Uuid::new_v4();

    let scheduled = consultation_row(
        consultation_id,
        practitioner_id,
        Uuid::new_v4(),
        Utc::now() + Duration::hours(2),
        "scheduled",
    );
    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("id", format!("eq.{}", consultation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(post_json(
            &format!("/{}/start", consultation_id),
            json!({ "practitioner_id": practitioner_id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_consultation_endpoint_forbidden_role() {
    let mock_server = MockServer::start().await;
    let consultation_id = Uuid::new_v4();
    let owner_id = Uuid::new_v4();

    let scheduled = consultation_row(
        consultation_id,
        Uuid::new_v4(),
        owner_id,
        Utc::now() + Duration::hours(6),
        "scheduled",
    );
    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("id", format!("eq.{}", consultation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(post_json(
            &format!("/{}/cancel", consultation_id),
            json!({
                "requester_id": owner_id,
                "requester_role": "receptionist",
                "reason": "double booked"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_availability_endpoint() {
    let mock_server = MockServer::start().await;
    let practitioner_id = Uuid::new_v4();
    let date = (Utc::now() + Duration::days(7)).date_naive();

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(get_request(&format!(
            "/availability?practitioner_id={}&date={}",
            practitioner_id, date
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 16);
    assert!(slots.iter().all(|s| s["available"] == json!(true)));
}

#[tokio::test]
async fn test_get_practitioner_day_endpoint() {
    let mock_server = MockServer::start().await;
    let practitioner_id = Uuid::new_v4();
    let date = (Utc::now() + Duration::days(7)).date_naive();
    let start = date
        .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
        .and_utc();

    let row = consultation_row(Uuid::new_v4(), practitioner_id, Uuid::new_v4(), start, "scheduled");
    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("practitioner_id", format!("eq.{}", practitioner_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(get_request(&format!(
            "/practitioners/{}?date={}",
            practitioner_id, date
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["consultations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway() {
    let mock_server = MockServer::start().await;
    let practitioner_id = Uuid::new_v4();
    let date = (Utc::now() + Duration::days(7)).date_naive();

    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server);
    let response = app
        .oneshot(get_request(&format!(
            "/availability?practitioner_id={}&date={}",
            practitioner_id, date
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
