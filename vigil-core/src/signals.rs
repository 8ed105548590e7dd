//! Per-category signal state for the five trust pillars
//!
//! Each pillar owns exactly one [`SignalState`]:
//! - A penalty in `[0, 100]` subtracted from the baseline score
//! - The time of the last event that touched it
//! - An optional human-readable risk label
//! - Pillar-specific auxiliary data (badges, devices, verification outcome, ...)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{TrustError, MAX_PENALTY};

/// The five independent risk sources. Order here is the fixed
/// attribution order used for risk factors and tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalCategory {
    /// BLE badge proximity
    Presence,
    /// Face / liveness verification
    Biometric,
    /// Physical entry integrity (tailgating, forced doors)
    Integrity,
    /// Trusted device heartbeat continuity
    Heartbeat,
    /// Behavioral access anomalies
    Behavior,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 5] = [
        SignalCategory::Presence,
        SignalCategory::Biometric,
        SignalCategory::Integrity,
        SignalCategory::Heartbeat,
        SignalCategory::Behavior,
    ];

    /// Position in [`SignalCategory::ALL`]
    pub fn index(self) -> usize {
        match self {
            SignalCategory::Presence => 0,
            SignalCategory::Biometric => 1,
            SignalCategory::Integrity => 2,
            SignalCategory::Heartbeat => 3,
            SignalCategory::Behavior => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalCategory::Presence => "presence",
            SignalCategory::Biometric => "biometric",
            SignalCategory::Integrity => "integrity",
            SignalCategory::Heartbeat => "heartbeat",
            SignalCategory::Behavior => "behavior",
        }
    }

    /// Heartbeat is derived from device statuses and never time-decayed.
    pub fn is_decayed(self) -> bool {
        !matches!(self, SignalCategory::Heartbeat)
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalCategory {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TrustError::InvalidCategory(s.to_string()))
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    /// Parse a severity, falling back to [`Severity::Medium`] for anything
    /// unrecognized. The flag is `false` when the fallback was taken so the
    /// caller can log it; demo traffic with a typo is never rejected.
    pub fn parse_lenient(raw: &str) -> (Severity, bool) {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => (Severity::Low, true),
            "medium" => (Severity::Medium, true),
            "high" => (Severity::High, true),
            _ => (Severity::Medium, false),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A BLE badge seen by the proximity array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    /// Distance from the entry point in meters
    pub distance: f64,
    pub authorized: bool,
    pub seen_at: DateTime<Utc>,
}

/// Outcome of the most recent biometric verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub passed: bool,
    /// Matcher confidence in its verdict (0.0 - 1.0)
    pub confidence: f64,
    pub at: DateTime<Utc>,
}

/// Liveness status of a trusted device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Online,
    Lost,
    Revoked,
}

impl DeviceStatus {
    /// Lost and revoked devices both lock the perimeter.
    pub fn is_compromised(self) -> bool {
        !matches!(self, DeviceStatus::Online)
    }
}

/// A trusted device tracked by the heartbeat pillar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub last_beat: DateTime<Utc>,
    pub status: DeviceStatus,
}

/// Last behavioral anomaly computed for the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Deviation from the expected access pattern, in score points
    pub score: f64,
    pub reason: String,
}

/// Pillar-specific auxiliary state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalAux {
    Presence {
        badges: BTreeMap<String, Badge>,
    },
    Biometric {
        last_verification: Option<Verification>,
    },
    Integrity {
        tailgating: bool,
    },
    Heartbeat {
        devices: BTreeMap<String, DeviceRecord>,
    },
    Behavior {
        last_anomaly: Option<Anomaly>,
    },
}

impl SignalAux {
    fn baseline(category: SignalCategory) -> Self {
        match category {
            SignalCategory::Presence => SignalAux::Presence {
                badges: BTreeMap::new(),
            },
            SignalCategory::Biometric => SignalAux::Biometric {
                last_verification: None,
            },
            SignalCategory::Integrity => SignalAux::Integrity { tailgating: false },
            SignalCategory::Heartbeat => SignalAux::Heartbeat {
                devices: BTreeMap::new(),
            },
            SignalCategory::Behavior => SignalAux::Behavior { last_anomaly: None },
        }
    }
}

/// Mutable risk record for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalState {
    pub(crate) category: SignalCategory,
    pub(crate) penalty: f64,
    pub(crate) last_event_at: Option<DateTime<Utc>>,
    pub(crate) label: Option<String>,
    pub(crate) aux: SignalAux,
}

impl SignalState {
    /// A nominal state: no penalty, no label, empty auxiliary data
    pub fn baseline(category: SignalCategory) -> Self {
        Self {
            category,
            penalty: 0.0,
            last_event_at: None,
            label: None,
            aux: SignalAux::baseline(category),
        }
    }

    pub fn category(&self) -> SignalCategory {
        self.category
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn aux(&self) -> &SignalAux {
        &self.aux
    }

    pub fn is_nominal(&self) -> bool {
        self.penalty <= 0.0 && self.label.is_none()
    }

    /// Raise the penalty by `increment`, clamped into `[0, 100]`.
    /// Events only ever push a penalty up.
    pub(crate) fn raise(&mut self, increment: f64, label: &str, at: DateTime<Utc>) {
        self.penalty = (self.penalty + increment.max(0.0)).clamp(0.0, MAX_PENALTY);
        self.last_event_at = Some(at);
        self.label = Some(label.to_string());
    }

    /// Lower the penalty to `penalty` after decay. Once the category is
    /// back at zero its label and transient flags clear.
    pub(crate) fn relax(&mut self, penalty: f64) {
        self.penalty = penalty.clamp(0.0, self.penalty);
        if self.penalty <= 0.0 {
            self.penalty = 0.0;
            self.label = None;
            if let SignalAux::Integrity { tailgating } = &mut self.aux {
                *tailgating = false;
            }
        }
    }

    pub(crate) fn devices(&self) -> Option<&BTreeMap<String, DeviceRecord>> {
        match &self.aux {
            SignalAux::Heartbeat { devices } => Some(devices),
            _ => None,
        }
    }

    pub(crate) fn devices_mut(&mut self) -> Option<&mut BTreeMap<String, DeviceRecord>> {
        match &mut self.aux {
            SignalAux::Heartbeat { devices } => Some(devices),
            _ => None,
        }
    }

    /// Re-derive the heartbeat penalty from device statuses: any lost or
    /// revoked device forces the maximum, otherwise zero.
    pub(crate) fn sync_heartbeat(&mut self) {
        let Some(devices) = self.devices() else {
            return;
        };

        let offender = devices
            .iter()
            .find(|(_, d)| d.status == DeviceStatus::Lost)
            .or_else(|| devices.iter().find(|(_, d)| d.status == DeviceStatus::Revoked))
            .map(|(id, d)| (id.clone(), d.status));

        match offender {
            Some((id, DeviceStatus::Lost)) => {
                self.penalty = MAX_PENALTY;
                self.label = Some(format!("Trusted device heartbeat lost ({})", id));
            }
            Some((id, _)) => {
                self.penalty = MAX_PENALTY;
                self.label = Some(format!("Trusted device access revoked ({})", id));
            }
            None => {
                self.penalty = 0.0;
                self.label = None;
            }
        }
    }
}
