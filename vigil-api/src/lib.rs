//! Vigil HTTP Boundary
//!
//! Exposes one trust engine over HTTP:
//! - Polling of the trust snapshot for dashboards
//! - Simulation commands for demos and tests
//! - Device lifecycle, sensor readings and resource checks

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;

pub use error::{ApiError, ApiResult};
pub use extract::ApiJson;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use vigil_runtime::TrustEngine;

use handlers::*;

/// Build the router for one engine. Every response allows any origin.
pub fn create_router(engine: TrustEngine) -> Router {
    Router::new()
        .route("/trust-score", get(trust_score))
        .route("/simulate/event", post(simulate_event))
        .route("/simulate/reset", post(simulate_reset))
        .route("/signals", get(signals))
        .route("/history", get(history))
        .route("/health", get(health))
        // Trusted devices
        .route("/devices", get(list_devices))
        .route("/devices/:id/heartbeat", post(device_heartbeat))
        .route("/devices/:id/reconnect", post(device_reconnect))
        .route("/devices/:id/revoke", post(device_revoke))
        .route("/devices/:id/unrevoke", post(device_unrevoke))
        .route("/devices/:id/lost", post(device_lost))
        // Sensor readings
        .route("/presence/badges", post(track_badge))
        .route("/presence/badges/:id", delete(remove_badge))
        .route("/biometric/verification", post(record_verification))
        .route("/behavior/access", post(evaluate_access))
        // Policy gate
        .route("/resources", get(list_resources))
        .route("/resources/:id", get(check_resource))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(engine)
}
