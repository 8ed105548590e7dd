//! Error taxonomy for the trust engine

use thiserror::Error;

/// Errors raised by signal, scoring and policy operations.
///
/// Every variant is raised before any state is touched, so a rejected
/// operation leaves the perimeter exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrustError {
    #[error("Invalid signal category: {0}")]
    InvalidCategory(String),

    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    #[error("Event type {event_type} requires a device_id")]
    MissingDeviceId { event_type: String },

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Unknown protected resource: {0}")]
    UnknownResource(String),

    #[error("Invalid {field}: {value}")]
    InvalidReading { field: &'static str, value: String },

    #[error("Wall clock moved backwards by {behind_ms}ms")]
    ClockSkew { behind_ms: i64 },
}

impl TrustError {
    pub fn unknown_event(event_type: &str) -> Self {
        Self::UnknownEventType {
            event_type: event_type.to_string(),
        }
    }

    pub fn invalid_reading(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidReading {
            field,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TrustError::unknown_event("nonsense");
        assert_eq!(err.to_string(), "Unknown event type: nonsense");

        let err = TrustError::invalid_reading("distance", -1.0);
        assert_eq!(err.to_string(), "Invalid distance: -1");
    }
}
