use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Days, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tripwise_api::{app, AppState};
use tripwise_store::app_config::BusinessRules;
use tripwise_store::{MemoryStore, PersistenceGateway};

fn test_app() -> (Arc<MemoryStore>, Router) {
    let store = Arc::new(MemoryStore::new());
    let gateway = PersistenceGateway::new(store.clone());
    (store, app(AppState::new(gateway, &BusinessRules::default())))
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn trip_body(max: u32, budget: i64) -> Value {
    let today = Utc::now().date_naive();
    json!({
        "title": "Dolomites hut to hut",
        "destination": "Cortina",
        "start_date": (today + Days::new(10)).to_string(),
        "end_date": (today + Days::new(16)).to_string(),
        "max_participants": max,
        "budget": budget,
        "tags": ["hiking"],
    })
}

fn join_body(passengers: u32) -> Value {
    json!({
        "passengers": passengers,
        "payment": { "method": "card", "transaction_id": "txn-1" },
    })
}

async fn create_trip(app: &Router, max: u32, budget: i64) -> String {
    let (status, trip) = send(app, "POST", "/v1/trips", Some("owner"), Some(trip_body(max, budget))).await;
    assert_eq!(status, StatusCode::CREATED);
    trip["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (_store, app) = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_trip_sets_owner_and_seats() {
    let (_store, app) = test_app();
    let (status, trip) = send(&app, "POST", "/v1/trips", Some("owner"), Some(trip_body(10, 20000))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(trip["owner_id"], "owner");
    assert_eq!(trip["available_seats"], 10);
    assert_eq!(trip["current_participants"], 0);
    assert_eq!(trip["status"], "planned");
    assert_eq!(trip["advance_payment_percentage"], 20);

    let (status, listed) = send(&app, "GET", "/v1/trips?status=planned", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_trip_requires_actor() {
    let (_store, app) = test_app();
    let (status, body) = send(&app, "POST", "/v1/trips", None, Some(trip_body(10, 20000))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn test_invalid_trip_is_bad_request() {
    let (_store, app) = test_app();
    let (status, body) = send(&app, "POST", "/v1/trips", Some("owner"), Some(trip_body(0, 20000))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
}

#[tokio::test]
async fn test_quote_then_join_then_cancel() {
    let (_store, app) = test_app();
    let trip_id = create_trip(&app, 10, 20000).await;

    let (status, quote) = send(&app, "GET", &format!("/v1/trips/{}/quote?passengers=2", trip_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["total_amount"], 4000);
    assert_eq!(quote["advance_amount"], 800);
    assert_eq!(quote["final_amount"], 3200);

    let uri = format!("/v1/trips/{}/participants", trip_id);
    let (status, receipt) = send(&app, "POST", &uri, Some("ana"), Some(join_body(2))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["trip"]["available_seats"], 8);
    assert_eq!(receipt["participant"]["payment_status"], "paid");
    assert_eq!(receipt["payment"]["amount"], 800);

    let (status, body) = send(&app, "POST", &uri, Some("ana"), Some(join_body(1))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_joined");

    let (_, seats) = send(&app, "GET", &format!("/v1/trips/{}/seats", trip_id), None, None).await;
    assert_eq!(seats["reserved_passengers"], 2);
    assert_eq!(seats["available_seats"], 8);

    let (status, _) = send(&app, "DELETE", &format!("{}/ana", uri), Some("bo"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) = send(&app, "DELETE", &format!("{}/ana", uri), Some("ana"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["participant"]["status"], "cancelled");
    assert_eq!(cancelled["trip"]["available_seats"], 10);

    let (status, history) = send(&app, "GET", "/v1/users/ana/bookings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_owner_join_is_conflict() {
    let (_store, app) = test_app();
    let trip_id = create_trip(&app, 10, 20000).await;

    let uri = format!("/v1/trips/{}/participants", trip_id);
    let (status, body) = send(&app, "POST", &uri, Some("owner"), Some(join_body(1))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "is_creator");

    let (_, participants) = send(&app, "GET", &uri, None, None).await;
    assert!(participants.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_too_many_passengers_reports_seats() {
    let (_store, app) = test_app();
    let trip_id = create_trip(&app, 2, 2000).await;

    let uri = format!("/v1/trips/{}/participants", trip_id);
    let (status, body) = send(&app, "POST", &uri, Some("ana"), Some(join_body(3))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_seats");
}

#[tokio::test]
async fn test_cancel_unknown_reservation_is_not_found() {
    let (_store, app) = test_app();
    let trip_id = create_trip(&app, 2, 2000).await;

    let uri = format!("/v1/trips/{}/participants/ana", trip_id);
    let (status, body) = send(&app, "DELETE", &uri, Some("ana"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_owner_only_edits() {
    let (_store, app) = test_app();
    let trip_id = create_trip(&app, 4, 4000).await;
    let uri = format!("/v1/trips/{}", trip_id);

    let (status, body) = send(&app, "PATCH", &uri, Some("mallory"), Some(json!({ "max_participants": 8 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, trip) = send(&app, "PATCH", &uri, Some("owner"), Some(json!({ "max_participants": 8 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["available_seats"], 8);

    let (status, trip) = send(&app, "POST", &format!("{}/cancel", uri), Some("owner"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trip["status"], "cancelled");

    let (status, body) = send(&app, "POST", &format!("{}/participants", uri), Some("ana"), Some(join_body(1))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_joinable");

    let (status, _) = send(&app, "DELETE", &uri, Some("owner"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_storage_outage_is_service_unavailable() {
    let (store, app) = test_app();
    let trip_id = create_trip(&app, 4, 4000).await;
    store.set_unavailable(true);

    let (status, body) = send(&app, "GET", &format!("/v1/trips/{}", trip_id), None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "storage_unavailable");
}

#[tokio::test]
async fn test_register_and_get_user() {
    let (_store, app) = test_app();
    let (status, user) = send(
        &app,
        "POST",
        "/v1/users",
        None,
        Some(json!({ "id": "ana", "name": "Ana", "email": "ana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["id"], "ana");

    let (status, fetched) = send(&app, "GET", "/v1/users/ana", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Ana");
}
