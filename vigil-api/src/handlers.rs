//! Axum request handlers.
//!
//! Handlers are thin: each one calls a single engine operation and wraps
//! the result. All trust logic lives in the engine.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use vigil_core::{DeviceStatus, ResourceDecision, TrustSnapshot};
use vigil_runtime::TrustEngine;

use crate::dto::*;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;

/// Current trust snapshot, decayed to now.
#[tracing::instrument(skip(engine))]
pub async fn trust_score(State(engine): State<TrustEngine>) -> Json<TrustSnapshot> {
    Json(engine.snapshot())
}

#[tracing::instrument(skip(engine, request), fields(event_type = %request.event_type))]
pub async fn simulate_event(
    State(engine): State<TrustEngine>,
    ApiJson(request): ApiJson<SimulationEventRequest>,
) -> ApiResult<Json<SimulationResponse>> {
    let device_id = request.device_id.as_deref();
    let snapshot = match request.category.as_deref() {
        Some(category) => {
            engine.apply_categorized(category, &request.event_type, &request.severity, device_id)?
        }
        None => engine.apply_event(&request.event_type, &request.severity, device_id)?,
    };

    info!(
        score = snapshot.score,
        band = %snapshot.confidence_band,
        "Simulated event processed"
    );
    Ok(Json(SimulationResponse::new("Event processed", snapshot)))
}

#[tracing::instrument(skip(engine))]
pub async fn simulate_reset(State(engine): State<TrustEngine>) -> Json<SimulationResponse> {
    let snapshot = engine.reset();
    info!("Perimeter reset to baseline");
    Json(SimulationResponse::new("Simulation reset", snapshot))
}

#[tracing::instrument(skip(engine))]
pub async fn signals(State(engine): State<TrustEngine>) -> Json<SignalsResponse> {
    Json(SignalsResponse {
        signals: engine.signals(),
    })
}

#[tracing::instrument(skip(engine))]
pub async fn history(State(engine): State<TrustEngine>) -> Json<HistoryResponse> {
    let events = engine.history();
    Json(HistoryResponse {
        total: events.len(),
        events,
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "active".to_string(),
        system: "vigil".to_string(),
    })
}

// ============================================================================
// Devices
// ============================================================================

#[tracing::instrument(skip(engine))]
pub async fn list_devices(State(engine): State<TrustEngine>) -> Json<DeviceListResponse> {
    let devices = engine.devices();
    Json(DeviceListResponse {
        total: devices.len(),
        devices,
    })
}

fn device_action(
    device_id: String,
    (status, new_state): (DeviceStatus, TrustSnapshot),
) -> Json<DeviceActionResponse> {
    Json(DeviceActionResponse {
        device_id,
        status,
        new_state,
    })
}

#[tracing::instrument(skip(engine))]
pub async fn device_heartbeat(
    State(engine): State<TrustEngine>,
    Path(device_id): Path<String>,
) -> Json<DeviceActionResponse> {
    let outcome = engine.heartbeat(&device_id);
    device_action(device_id, outcome)
}

#[tracing::instrument(skip(engine))]
pub async fn device_reconnect(
    State(engine): State<TrustEngine>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceActionResponse>> {
    let outcome = engine.reconnect(&device_id)?;
    Ok(device_action(device_id, outcome))
}

#[tracing::instrument(skip(engine))]
pub async fn device_revoke(
    State(engine): State<TrustEngine>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceActionResponse>> {
    let outcome = engine.revoke(&device_id)?;
    Ok(device_action(device_id, outcome))
}

#[tracing::instrument(skip(engine))]
pub async fn device_unrevoke(
    State(engine): State<TrustEngine>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceActionResponse>> {
    let outcome = engine.unrevoke(&device_id)?;
    Ok(device_action(device_id, outcome))
}

#[tracing::instrument(skip(engine))]
pub async fn device_lost(
    State(engine): State<TrustEngine>,
    Path(device_id): Path<String>,
) -> Json<DeviceActionResponse> {
    let outcome = engine.mark_lost(&device_id);
    device_action(device_id, outcome)
}

// ============================================================================
// Sensor readings
// ============================================================================

#[tracing::instrument(skip(engine, request), fields(badge_id = %request.id))]
pub async fn track_badge(
    State(engine): State<TrustEngine>,
    ApiJson(request): ApiJson<BadgeReadingRequest>,
) -> ApiResult<Json<ReadingResponse>> {
    let (event, new_state) = engine.track_badge(&request.id, request.distance, request.authorized)?;
    Ok(Json(ReadingResponse { event, new_state }))
}

#[tracing::instrument(skip(engine))]
pub async fn remove_badge(
    State(engine): State<TrustEngine>,
    Path(badge_id): Path<String>,
) -> ApiResult<Json<TrustSnapshot>> {
    let (removed, snapshot) = engine.remove_badge(&badge_id);
    if !removed {
        return Err(ApiError::not_found("Badge", &badge_id));
    }
    Ok(Json(snapshot))
}

#[tracing::instrument(skip(engine, request))]
pub async fn record_verification(
    State(engine): State<TrustEngine>,
    ApiJson(request): ApiJson<VerificationRequest>,
) -> ApiResult<Json<ReadingResponse>> {
    let (event, new_state) = engine.record_verification(request.passed, request.confidence)?;
    Ok(Json(ReadingResponse { event, new_state }))
}

#[tracing::instrument(skip(engine, request), fields(hour = request.hour))]
pub async fn evaluate_access(
    State(engine): State<TrustEngine>,
    ApiJson(request): ApiJson<AccessAttemptRequest>,
) -> ApiResult<Json<AccessAttemptResponse>> {
    let (assessment, new_state) = engine.evaluate_access(request.hour, request.anomalous_location)?;
    Ok(Json(AccessAttemptResponse {
        assessment,
        new_state,
    }))
}

// ============================================================================
// Protected resources
// ============================================================================

#[tracing::instrument(skip(engine))]
pub async fn list_resources(State(engine): State<TrustEngine>) -> Json<ResourceListResponse> {
    let resources = engine.check_all_resources();
    let score = resources
        .first()
        .map(|r| r.score)
        .unwrap_or_else(|| engine.snapshot().score);
    Json(ResourceListResponse { score, resources })
}

#[tracing::instrument(skip(engine))]
pub async fn check_resource(
    State(engine): State<TrustEngine>,
    Path(resource_id): Path<String>,
) -> ApiResult<Json<ResourceDecision>> {
    Ok(Json(engine.check_resource(&resource_id)?))
}
