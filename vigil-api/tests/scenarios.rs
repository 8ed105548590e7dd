//! End-to-end scenarios over the HTTP surface, driven by a manual clock.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use vigil_api::create_router;
use vigil_runtime::{EngineConfig, ManualClock, TrustEngine};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn setup() -> (Router, ManualClock) {
    let clock = ManualClock::new(t0());
    let engine = TrustEngine::with_clock(EngineConfig::default(), Arc::new(clock.clone())).unwrap();
    (create_router(engine), clock)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn trust_score(app: &Router) -> Value {
    let (status, body) = send(app, Method::GET, "/trust-score", None).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn nominal_perimeter() {
    let (app, _) = setup();
    let body = trust_score(&app).await;

    assert_eq!(body["score"], 100);
    assert_eq!(body["confidence_band"], "GREEN");
    assert_eq!(body["access_level"], "full");
    assert_eq!(body["risk_factors"], json!([]));
    assert_eq!(body["explanation"], "Trust is high. All security signals are nominal.");
}

#[tokio::test]
async fn high_biometric_failure() {
    let (app, _) = setup();
    let (status, body) = send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "biometric_failure", "severity": "high"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event processed");
    assert_eq!(body["new_state"]["score"], 60);

    let body = trust_score(&app).await;
    assert_eq!(body["score"], 60);
    assert_eq!(body["confidence_band"], "YELLOW");
    assert_eq!(body["access_level"], "standard");
    assert_eq!(body["risk_factors"], json!(["Biometric verification failed"]));
}

#[tokio::test]
async fn compound_failure_lists_factors_in_category_order() {
    let (app, _) = setup();
    // applied in reverse category order on purpose
    send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "device_health_drop", "severity": "high"})),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "biometric_failure", "severity": "high"})),
    )
    .await;

    let body = trust_score(&app).await;
    assert_eq!(body["score"], 35);
    assert_eq!(body["confidence_band"], "ORANGE");
    assert_eq!(
        body["risk_factors"],
        json!(["Biometric verification failed", "Device posture degraded"])
    );
    assert_eq!(
        body["explanation"],
        "Trust reduced primarily by biometric signal: Biometric verification failed."
    );
}

#[tokio::test]
async fn lost_device_overrides_everything() {
    let (app, _) = setup();
    let (status, body) = send(&app, Method::POST, "/devices/DEV-001/lost", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "LOST");

    let body = trust_score(&app).await;
    assert_eq!(body["score"], 0);
    assert_eq!(body["confidence_band"], "RED");
    assert_eq!(body["access_level"], "no_access");
}

#[tokio::test]
async fn unknown_event_is_rejected_without_side_effects() {
    let (app, _) = setup();
    let before = trust_score(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "nonsense"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let after = trust_score(&app).await;
    assert_eq!(before["score"], after["score"]);
    assert_eq!(before["risk_factors"], after["risk_factors"]);

    let (_, history) = send(&app, Method::GET, "/history", None).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn device_event_without_device_id_is_rejected() {
    let (app, _) = setup();
    let (status, body) = send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "heartbeat_lost"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "device_id");
    assert_eq!(trust_score(&app).await["score"], 100);
}

#[tokio::test]
async fn mismatched_category_is_rejected() {
    let (app, _) = setup();
    let (status, _) = send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "biometric_failure", "category": "sideways"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_restores_baseline() {
    let (app, _) = setup();
    send(&app, Method::POST, "/devices/DEV-002/heartbeat", None).await;
    send(&app, Method::POST, "/devices/DEV-002/revoke", None).await;
    send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "door_forced", "severity": "high"})),
    )
    .await;

    let (status, body) = send(&app, Method::POST, "/simulate/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Simulation reset");
    assert_eq!(body["new_state"]["score"], 100);

    let (_, devices) = send(&app, Method::GET, "/devices", None).await;
    assert_eq!(devices["total"], 0);
}

#[tokio::test]
async fn penalties_decay_between_polls() {
    let (app, clock) = setup();
    send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "tailgating_detected", "severity": "high"})),
    )
    .await;
    assert_eq!(trust_score(&app).await["score"], 65);

    // integrity decays at 2 points per second
    clock.advance(Duration::seconds(10));
    assert_eq!(trust_score(&app).await["score"], 85);

    clock.advance(Duration::seconds(60));
    let body = trust_score(&app).await;
    assert_eq!(body["score"], 100);
    assert_eq!(body["risk_factors"], json!([]));
}

#[tokio::test]
async fn device_lifecycle_over_http() {
    let (app, _) = setup();
    send(&app, Method::POST, "/devices/DEV-003/heartbeat", None).await;

    let (status, body) = send(&app, Method::POST, "/devices/DEV-003/revoke", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REVOKED");
    assert_eq!(body["new_state"]["score"], 0);

    let (_, body) = send(&app, Method::POST, "/devices/DEV-003/unrevoke", None).await;
    assert_eq!(body["status"], "ONLINE");
    assert_eq!(body["new_state"]["score"], 100);

    let (status, body) = send(&app, Method::POST, "/devices/DEV-404/reconnect", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn sensor_readings_raise_risk() {
    let (app, _) = setup();

    let (status, body) = send(
        &app,
        Method::POST,
        "/presence/badges",
        Some(json!({"id": "B-77", "distance": 0.3, "authorized": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["event_type"], "unauthorized_badge");
    assert_eq!(body["new_state"]["score"], 70);

    let (status, _) = send(&app, Method::DELETE, "/presence/badges/B-77", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::DELETE, "/presence/badges/B-77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/biometric/verification",
        Some(json!({"passed": false, "confidence": 1.5})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        Method::POST,
        "/behavior/access",
        Some(json!({"hour": 3, "anomalous_location": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assessment"]["decision"], "DENIED");
}

#[tokio::test]
async fn resource_checks_follow_score() {
    let (app, _) = setup();
    send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "biometric_failure", "severity": "medium"})),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/resources/production-db", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 75);
    assert_eq!(body["decision"], "DENIED");

    let (_, body) = send(&app, Method::GET, "/resources/hr-records", None).await;
    assert_eq!(body["decision"], "ALLOWED");

    let (_, body) = send(&app, Method::GET, "/resources", None).await;
    assert_eq!(body["score"], 75);
    assert_eq!(body["resources"].as_array().unwrap().len(), 4);

    let (status, _) = send(&app, Method::GET, "/resources/moon-base", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signals_view_attributes_each_category() {
    let (app, _) = setup();
    send(
        &app,
        Method::POST,
        "/simulate/event",
        Some(json!({"event_type": "tailgating_detected", "severity": "low"})),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/signals", None).await;
    assert_eq!(status, StatusCode::OK);

    let signals = body["signals"].as_array().unwrap();
    let categories: Vec<_> = signals.iter().map(|s| s["category"].clone()).collect();
    assert_eq!(
        categories,
        vec![json!("PRESENCE"), json!("BIOMETRIC"), json!("INTEGRITY"), json!("HEARTBEAT"), json!("BEHAVIOR")]
    );
    assert_eq!(signals[2]["penalty"], 15.0);
    assert_eq!(signals[2]["aux"]["kind"], "integrity");
    assert_eq!(signals[2]["aux"]["tailgating"], true);
    assert_eq!(signals[0]["penalty"], 0.0);
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    let (app, _) = setup();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/simulate/event")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"event_type\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");

    // well-formed JSON missing a required field
    let (status, body) = send(
        &app,
        Method::POST,
        "/biometric/verification",
        Some(json!({"passed": false})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, Method::POST, "/behavior/access", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    assert_eq!(trust_score(&app).await["score"], 100);
}
