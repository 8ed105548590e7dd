//! Static event policy table
//!
//! Every accepted event type is attributed to exactly one category. The
//! table is closed: an event type not listed here is rejected.

use serde::Serialize;

use crate::{Severity, SignalCategory, TrustError};

/// What applying an event does to its category
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EventEffect {
    /// Raise the category penalty by a severity-scaled increment
    Penalty { low: f64, medium: f64, high: f64 },
    /// Force the named device to LOST
    DeviceLost,
    /// Force the named device to REVOKED
    DeviceRevoked,
}

impl EventEffect {
    pub fn targets_device(&self) -> bool {
        matches!(self, EventEffect::DeviceLost | EventEffect::DeviceRevoked)
    }
}

/// One row of the policy table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventRule {
    pub event_type: &'static str,
    pub category: SignalCategory,
    /// Risk-factor label shown while the category is degraded
    pub label: &'static str,
    #[serde(flatten)]
    pub effect: EventEffect,
}

impl EventRule {
    /// Penalty increment for a severity (zero for device effects)
    pub fn increment(&self, severity: Severity) -> f64 {
        match self.effect {
            EventEffect::Penalty { low, medium, high } => match severity {
                Severity::Low => low,
                Severity::Medium => medium,
                Severity::High => high,
            },
            _ => 0.0,
        }
    }
}

const fn penalty(
    event_type: &'static str,
    category: SignalCategory,
    label: &'static str,
    low: f64,
    medium: f64,
    high: f64,
) -> EventRule {
    EventRule {
        event_type,
        category,
        label,
        effect: EventEffect::Penalty { low, medium, high },
    }
}

pub const EVENT_RULES: &[EventRule] = &[
    penalty(
        "unauthorized_badge",
        SignalCategory::Presence,
        "Unauthorized badge in proximity",
        10.0,
        20.0,
        30.0,
    ),
    penalty(
        "presence_anomaly",
        SignalCategory::Presence,
        "Presence confidence degraded",
        5.0,
        10.0,
        20.0,
    ),
    penalty(
        "biometric_failure",
        SignalCategory::Biometric,
        "Biometric verification failed",
        10.0,
        25.0,
        40.0,
    ),
    penalty(
        "liveness_check_failed",
        SignalCategory::Biometric,
        "Biometric liveness check failed",
        15.0,
        25.0,
        35.0,
    ),
    penalty(
        "tailgating_detected",
        SignalCategory::Integrity,
        "Physical entry anomaly (tailgating)",
        15.0,
        25.0,
        35.0,
    ),
    penalty(
        "door_forced",
        SignalCategory::Integrity,
        "Door forced open",
        20.0,
        30.0,
        45.0,
    ),
    EventRule {
        event_type: "heartbeat_lost",
        category: SignalCategory::Heartbeat,
        label: "Trusted device heartbeat lost",
        effect: EventEffect::DeviceLost,
    },
    EventRule {
        event_type: "device_revoked",
        category: SignalCategory::Heartbeat,
        label: "Trusted device access revoked",
        effect: EventEffect::DeviceRevoked,
    },
    penalty(
        "after_hours_access",
        SignalCategory::Behavior,
        "Access attempt outside normal hours",
        5.0,
        10.0,
        20.0,
    ),
    penalty(
        "device_health_drop",
        SignalCategory::Behavior,
        "Device posture degraded",
        10.0,
        15.0,
        25.0,
    ),
    penalty(
        "location_anomaly",
        SignalCategory::Behavior,
        "Access from unusual location",
        10.0,
        20.0,
        30.0,
    ),
];

/// Find the rule for an event type.
pub fn lookup(event_type: &str) -> Result<&'static EventRule, TrustError> {
    let wanted = event_type.trim();
    EVENT_RULES
        .iter()
        .find(|rule| rule.event_type.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| TrustError::unknown_event(event_type))
}

/// Find the rule for an event type within a specific category. An event
/// type that exists but belongs to another category is unknown here.
pub fn lookup_in(
    category: SignalCategory,
    event_type: &str,
) -> Result<&'static EventRule, TrustError> {
    lookup(event_type)
        .ok()
        .filter(|rule| rule.category == category)
        .ok_or_else(|| TrustError::unknown_event(event_type))
}

/// Rules belonging to one category, in table order
pub fn rules_for(category: SignalCategory) -> impl Iterator<Item = &'static EventRule> {
    EVENT_RULES.iter().filter(move |rule| rule.category == category)
}
