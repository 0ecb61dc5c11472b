mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use booking_service::service::{AppState, build_router};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{Answer, Harness, SERVICE_ID};

fn app(harness: &Harness) -> Router {
    build_router(AppState {
        wizard: harness.wizard.clone(),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn command(app: &Router, session_id: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", &format!("/wizard/{session_id}/commands"), Some(body)).await
}

#[tokio::test]
async fn wizard_can_be_driven_over_http() {
    let harness = Harness::new(Some(json!(500)), Answer::Book);
    let app = app(&harness);

    let (status, view) = send(&app, "POST", "/wizard", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = view["sessionId"].as_str().unwrap().to_string();

    let steps = [
        json!({ "type": "update", "serviceId": SERVICE_ID }),
        json!({ "type": "next" }),
        json!({
            "type": "update",
            "customer": {
                "name": "Sam Taylor",
                "age": 42,
                "phone": "0400111222",
                "emergencyContact": "0411222333"
            },
            "address": {
                "houseDetails": "Unit 4",
                "address": "200 George Street",
                "city": "Sydney",
                "state": "NSW",
                "pincode": "2000"
            }
        }),
        json!({ "type": "next" }),
        json!({
            "type": "update",
            "schedule": {
                "bookingType": "oneTime",
                "date": "2025-03-10",
                "time": "10:00",
                "serviceHours": 2
            }
        }),
        json!({ "type": "calculatePrice" }),
        json!({ "type": "next" }),
        json!({ "type": "update", "paymentMethod": "upi" }),
    ];
    for body in steps {
        let (status, _) = command(&app, &session_id, body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, view) = send(&app, "GET", &format!("/wizard/{session_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], 4);
    assert_eq!(view["estimateDisplay"], "$1,000.00");
    assert_eq!(view["stepValidity"], json!([true, true, true, true]));

    let (status, view) = command(&app, &session_id, json!({ "type": "submit" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["completed"], true);
    assert_eq!(view["outcome"]["kind"], "booked");

    // finished sessions are dropped
    let (status, body) = command(&app, &session_id, json!({ "type": "next" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["session_id"], session_id.as_str());
}

#[tokio::test]
async fn wizard_can_be_cancelled() {
    let harness = Harness::new(Some(json!(500)), Answer::Book);
    let app = app(&harness);
    let (_, view) = send(&app, "POST", "/wizard", None).await;
    let session_id = view["sessionId"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "DELETE", &format!("/wizard/{session_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/wizard/{session_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/wizard/{session_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn services_are_listed_from_the_catalogue() {
    let harness = Harness::new(Some(json!(500)), Answer::Book);

    let (status, body) = send(&app(&harness), "GET", "/services", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["serviceId"], SERVICE_ID);
    assert_eq!(body[0]["category"], "Daily Activities");
}

#[tokio::test]
async fn illegal_commands_are_unprocessable() {
    let harness = Harness::new(Some(json!(500)), Answer::Book);
    let app = app(&harness);
    let (_, view) = send(&app, "POST", "/wizard", None).await;
    let session_id = view["sessionId"].as_str().unwrap().to_string();

    let (status, body) = command(
        &app,
        &session_id,
        json!({ "type": "applySavedAddress", "key": "nowhere" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("nowhere"));

    let (status, _) = command(&app, &session_id, json!({ "type": "teleport" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn validation_failures_come_back_with_the_view() {
    let harness = Harness::new(Some(json!(500)), Answer::Book);
    let app = app(&harness);
    let (_, view) = send(&app, "POST", "/wizard", None).await;
    let session_id = view["sessionId"].as_str().unwrap().to_string();

    let (status, view) = command(&app, &session_id, json!({ "type": "next" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], 1);
    assert_eq!(view["fieldErrors"][0]["field"], "serviceId");
    assert_eq!(view["toasts"][0]["kind"], "error");
    assert_eq!(view["toasts"][0]["message"], "Please select a service");
}

#[tokio::test]
async fn commands_for_unknown_sessions_are_not_found() {
    let harness = Harness::new(Some(json!(500)), Answer::Book);

    let (status, body) = command(&app(&harness), "nope", json!({ "type": "next" })).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["session_id"], "nope");
}
