//! Request and response bodies for the HTTP surface.

use serde::{Deserialize, Serialize};

use vigil_core::{
    AccessAssessment, DeviceStatus, EventRecord, ResourceDecision, SignalState, TrustSnapshot,
};
use vigil_runtime::DeviceView;

fn default_severity() -> String {
    "medium".to_string()
}

// ============================================================================
// Simulation
// ============================================================================

/// Body of `POST /simulate/event`.
///
/// `severity` defaults to medium and an unrecognized value is treated as
/// medium. `category`, when present, must agree with the event type.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationEventRequest {
    pub event_type: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Response to an accepted simulation command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResponse {
    pub message: String,
    pub new_state: TrustSnapshot,
}

impl SimulationResponse {
    pub fn new(message: &str, new_state: TrustSnapshot) -> Self {
        Self {
            message: message.to_string(),
            new_state,
        }
    }
}

// ============================================================================
// Signal inputs
// ============================================================================

/// Body of `POST /presence/badges`
#[derive(Debug, Clone, Deserialize)]
pub struct BadgeReadingRequest {
    #[serde(alias = "badge_id")]
    pub id: String,
    /// Meters from the entry point
    pub distance: f64,
    #[serde(default)]
    pub authorized: bool,
}

/// Body of `POST /biometric/verification`
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationRequest {
    pub passed: bool,
    pub confidence: f64,
}

/// Body of `POST /behavior/access`
#[derive(Debug, Clone, Deserialize)]
pub struct AccessAttemptRequest {
    /// Local hour of the attempt, 0-23
    pub hour: u8,
    #[serde(default)]
    pub anomalous_location: bool,
}

/// Response to a sensor reading. `event` is set when the reading raised risk.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingResponse {
    pub event: Option<EventRecord>,
    pub new_state: TrustSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessAttemptResponse {
    pub assessment: AccessAssessment,
    pub new_state: TrustSnapshot,
}

// ============================================================================
// Devices
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceView>,
    pub total: usize,
}

/// Response to a device lifecycle command
#[derive(Debug, Clone, Serialize)]
pub struct DeviceActionResponse {
    pub device_id: String,
    pub status: DeviceStatus,
    pub new_state: TrustSnapshot,
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<SignalState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub events: Vec<EventRecord>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceListResponse {
    pub score: u8,
    pub resources: Vec<ResourceDecision>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub system: String,
}
