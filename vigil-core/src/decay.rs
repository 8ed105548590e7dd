//! Linear penalty decay toward baseline
//!
//! Physical-proximity pillars (presence, integrity) relax quickly; identity
//! pillars (biometric, behavior) hold risk longer. Heartbeat is excluded:
//! its penalty is derived from device statuses.

use serde::{Deserialize, Serialize};

use crate::{SignalCategory, TrustError};

/// Decay rates in penalty points per second
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayRates {
    pub presence: f64,
    pub biometric: f64,
    pub integrity: f64,
    pub behavior: f64,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            presence: 2.0,
            biometric: 0.5,
            integrity: 2.0,
            behavior: 0.5,
        }
    }
}

impl DecayRates {
    /// Rate for a category, `None` for heartbeat
    pub fn rate(&self, category: SignalCategory) -> Option<f64> {
        match category {
            SignalCategory::Presence => Some(self.presence),
            SignalCategory::Biometric => Some(self.biometric),
            SignalCategory::Integrity => Some(self.integrity),
            SignalCategory::Heartbeat => None,
            SignalCategory::Behavior => Some(self.behavior),
        }
    }

    /// Reject negative or non-finite rates.
    pub fn validate(&self) -> Result<(), TrustError> {
        for category in SignalCategory::ALL {
            if let Some(rate) = self.rate(category) {
                if !rate.is_finite() || rate < 0.0 {
                    return Err(TrustError::invalid_reading("decay rate", rate));
                }
            }
        }
        Ok(())
    }

    /// `max(0, penalty - rate * elapsed)`. Negative elapsed time counts as
    /// zero so the result never exceeds the input penalty.
    pub fn decay(&self, category: SignalCategory, penalty: f64, elapsed_secs: f64) -> f64 {
        match self.rate(category) {
            Some(rate) => (penalty - rate * elapsed_secs.max(0.0)).max(0.0),
            None => penalty,
        }
    }
}
