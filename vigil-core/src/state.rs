//! Perimeter state - the five signal states and everything that mutates them
//!
//! - Events raise the penalty of the one category they belong to
//! - Advancing time decays penalties and times out silent devices
//! - Reset replaces the whole state with a fresh baseline
//! - Applied events are kept in a bounded history

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::{
    compute_snapshot, policy, Anomaly, Badge, DecayRates, DeviceRecord, DeviceStatus, EventEffect,
    EventRule, Severity, SignalAux, SignalCategory, SignalState, TrustError, TrustSnapshot,
    DEFAULT_HEARTBEAT_TIMEOUT_SECS, DEFAULT_HISTORY_LIMIT, ENTRY_RANGE_METERS,
};

/// Tunables for a perimeter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerimeterConfig {
    /// Penalty decay rates per category
    pub decay: DecayRates,
    /// Silence after which an online device is presumed lost
    pub heartbeat_timeout_secs: u64,
    /// Maximum applied events kept in history
    pub history_limit: usize,
}

impl Default for PerimeterConfig {
    fn default() -> Self {
        Self {
            decay: DecayRates::default(),
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl PerimeterConfig {
    /// Heartbeat timeout as a duration, `None` when it does not fit one.
    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        i64::try_from(self.heartbeat_timeout_secs)
            .ok()
            .and_then(Duration::try_seconds)
    }

    pub fn validate(&self) -> Result<(), TrustError> {
        if self.heartbeat_timeout().is_none() {
            return Err(TrustError::invalid_reading(
                "heartbeat timeout",
                self.heartbeat_timeout_secs,
            ));
        }
        self.decay.validate()
    }
}

/// An event that was applied to the perimeter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub at: DateTime<Utc>,
    pub category: SignalCategory,
    pub event_type: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Category penalty right after the event
    pub penalty: f64,
    pub label: String,
}

/// Result of advancing the perimeter clock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvanceReport {
    pub elapsed_secs: f64,
    /// Categories whose penalty changed
    pub relaxed: Vec<SignalCategory>,
    /// Devices that timed out during this advance
    pub lost_devices: Vec<String>,
}

/// Decision for a behavioral access attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessDecision {
    Granted,
    Challenge,
    Denied,
}

/// Outcome of scoring one access attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessAssessment {
    pub score: i32,
    pub decision: AccessDecision,
    pub reasons: Vec<String>,
    pub events: Vec<EventRecord>,
}

/// Expected score of an ordinary access attempt
const ACCESS_BASE_SCORE: i32 = 95;
const OFF_HOURS_DEDUCTION: i32 = 40;
const LOCATION_DEDUCTION: i32 = 30;

/// The five signal states plus the clock they were last decayed to
#[derive(Debug, Clone)]
pub struct PerimeterState {
    signals: [SignalState; 5],
    decayed_through: DateTime<Utc>,
    history: VecDeque<EventRecord>,
    config: PerimeterConfig,
}

impl PerimeterState {
    /// A baseline perimeter: every category nominal, no devices or badges
    pub fn new(config: PerimeterConfig, now: DateTime<Utc>) -> Self {
        Self {
            signals: SignalCategory::ALL.map(SignalState::baseline),
            decayed_through: now,
            history: VecDeque::new(),
            config,
        }
    }

    /// Return every category to baseline and drop history.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(self.config.clone(), now);
        info!("Perimeter reset to baseline");
    }

    pub fn config(&self) -> &PerimeterConfig {
        &self.config
    }

    pub fn signal(&self, category: SignalCategory) -> &SignalState {
        &self.signals[category.index()]
    }

    pub fn signals(&self) -> &[SignalState] {
        &self.signals
    }

    pub fn decayed_through(&self) -> DateTime<Utc> {
        self.decayed_through
    }

    pub fn history(&self) -> impl DoubleEndedIterator<Item = &EventRecord> {
        self.history.iter()
    }

    pub fn devices(&self) -> impl Iterator<Item = (&String, &DeviceRecord)> {
        self.signal(SignalCategory::Heartbeat)
            .devices()
            .into_iter()
            .flat_map(|devices| devices.iter())
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.signal(SignalCategory::Heartbeat)
            .devices()
            .and_then(|devices| devices.get(device_id))
    }

    fn signal_mut(&mut self, category: SignalCategory) -> &mut SignalState {
        &mut self.signals[category.index()]
    }

    /// Decay penalties up to `now` and time out silent devices.
    ///
    /// Decay is a function of elapsed wall time since the last advance, so
    /// an interval is never applied twice and a skipped tick loses nothing.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<AdvanceReport, TrustError> {
        let elapsed = now - self.decayed_through;
        if elapsed < Duration::zero() {
            return Err(TrustError::ClockSkew {
                behind_ms: -elapsed.num_milliseconds(),
            });
        }

        let elapsed_secs = elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0;
        let mut report = AdvanceReport {
            elapsed_secs,
            ..Default::default()
        };

        let rates = self.config.decay;
        for state in self.signals.iter_mut().filter(|s| s.category.is_decayed()) {
            let before = state.penalty;
            if before > 0.0 {
                state.relax(rates.decay(state.category, before, elapsed_secs));
                if state.penalty < before {
                    report.relaxed.push(state.category);
                }
            }
        }

        report.lost_devices = self.check_heartbeats(now);
        self.decayed_through = now;
        Ok(report)
    }

    /// Advance for a request path: clock skew skips decay for this call
    /// instead of failing it.
    pub fn catch_up(&mut self, now: DateTime<Utc>) {
        if let Err(e) = self.advance(now) {
            warn!(error = %e, "Skipping decay");
        }
    }

    fn check_heartbeats(&mut self, now: DateTime<Utc>) -> Vec<String> {
        // an unrepresentable timeout never elapses
        let Some(timeout) = self.config.heartbeat_timeout() else {
            return Vec::new();
        };
        let heartbeat = self.signal_mut(SignalCategory::Heartbeat);
        let mut lost = Vec::new();

        if let Some(devices) = heartbeat.devices_mut() {
            for (id, device) in devices.iter_mut() {
                if device.status == DeviceStatus::Online && now - device.last_beat > timeout {
                    device.status = DeviceStatus::Lost;
                    warn!(device_id = %id, "Device heartbeat timed out");
                    lost.push(id.clone());
                }
            }
        }

        heartbeat.sync_heartbeat();
        lost
    }

    /// Snapshot after bringing decay up to `now`
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> TrustSnapshot {
        self.catch_up(now);
        compute_snapshot(&self.signals, now)
    }

    /// Apply an event by type; its category comes from the policy table.
    pub fn apply_event(
        &mut self,
        event_type: &str,
        severity: Severity,
        device_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, TrustError> {
        let rule = policy::lookup(event_type)?;
        self.apply_rule(rule, severity, device_id, now)
    }

    /// Apply an event within an explicit category.
    pub fn apply_categorized(
        &mut self,
        category: SignalCategory,
        event_type: &str,
        severity: Severity,
        device_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, TrustError> {
        let rule = policy::lookup_in(category, event_type)?;
        self.apply_rule(rule, severity, device_id, now)
    }

    fn apply_rule(
        &mut self,
        rule: &'static EventRule,
        severity: Severity,
        device_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, TrustError> {
        let device_id = match (rule.effect.targets_device(), device_id) {
            (true, None) => {
                return Err(TrustError::MissingDeviceId {
                    event_type: rule.event_type.to_string(),
                })
            }
            (true, Some(id)) => Some(id.to_string()),
            (false, _) => None,
        };

        self.catch_up(now);

        match rule.effect {
            EventEffect::Penalty { .. } => {
                let state = self.signal_mut(rule.category);
                state.raise(rule.increment(severity), rule.label, now);
                let penalty = state.penalty;
                match &mut state.aux {
                    SignalAux::Integrity { tailgating } if rule.event_type == "tailgating_detected" => {
                        *tailgating = true;
                    }
                    SignalAux::Behavior { last_anomaly } => {
                        *last_anomaly = Some(Anomaly {
                            score: rule.increment(severity),
                            reason: rule.label.to_string(),
                        });
                    }
                    _ => {}
                }
                debug!(category = %rule.category, penalty, "Penalty raised");
            }
            EventEffect::DeviceLost => {
                if let Some(id) = &device_id {
                    self.force_device(id, DeviceStatus::Lost, now);
                }
            }
            EventEffect::DeviceRevoked => {
                if let Some(id) = &device_id {
                    self.force_device(id, DeviceStatus::Revoked, now);
                }
            }
        }

        let state = self.signal(rule.category);
        let record = EventRecord {
            at: now,
            category: rule.category,
            event_type: rule.event_type.to_string(),
            severity,
            device_id,
            penalty: state.penalty,
            label: state.label.clone().unwrap_or_else(|| rule.label.to_string()),
        };
        info!(
            event_type = rule.event_type,
            category = %rule.category,
            severity = %severity,
            penalty = record.penalty,
            "Event applied"
        );
        self.push_history(record.clone());
        Ok(record)
    }

    fn push_history(&mut self, record: EventRecord) {
        if self.config.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.config.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    fn force_device(&mut self, device_id: &str, status: DeviceStatus, now: DateTime<Utc>) {
        let heartbeat = self.signal_mut(SignalCategory::Heartbeat);
        if let Some(devices) = heartbeat.devices_mut() {
            devices
                .entry(device_id.to_string())
                .and_modify(|d| d.status = status)
                .or_insert(DeviceRecord {
                    name: None,
                    last_beat: now,
                    status,
                });
        }
        heartbeat.last_event_at = Some(now);
        heartbeat.sync_heartbeat();
        warn!(device_id, status = ?status, "Device marked compromised");
    }

    /// Register a trusted device as online.
    pub fn register_device(&mut self, device_id: &str, name: Option<&str>, now: DateTime<Utc>) {
        let heartbeat = self.signal_mut(SignalCategory::Heartbeat);
        if let Some(devices) = heartbeat.devices_mut() {
            devices.insert(
                device_id.to_string(),
                DeviceRecord {
                    name: name.map(str::to_string),
                    last_beat: now,
                    status: DeviceStatus::Online,
                },
            );
        }
        heartbeat.sync_heartbeat();
        info!(device_id, "Device registered");
    }

    /// Record a heartbeat. Unknown devices are registered online; lost and
    /// revoked devices stay as they are until reconnected or un-revoked.
    pub fn heartbeat(&mut self, device_id: &str, now: DateTime<Utc>) -> DeviceStatus {
        self.catch_up(now);

        let heartbeat = self.signal_mut(SignalCategory::Heartbeat);
        let Some(devices) = heartbeat.devices_mut() else {
            return DeviceStatus::Online;
        };

        let status = match devices.get_mut(device_id) {
            Some(device) if device.status == DeviceStatus::Online => {
                device.last_beat = now;
                DeviceStatus::Online
            }
            Some(device) => {
                debug!(device_id, status = ?device.status, "Ignoring heartbeat");
                device.status
            }
            None => {
                devices.insert(
                    device_id.to_string(),
                    DeviceRecord {
                        name: None,
                        last_beat: now,
                        status: DeviceStatus::Online,
                    },
                );
                info!(device_id, "Device registered by heartbeat");
                DeviceStatus::Online
            }
        };
        heartbeat.sync_heartbeat();
        status
    }

    /// Restore a lost device to online with a fresh heartbeat.
    /// Revoked devices are not restored.
    pub fn reconnect(&mut self, device_id: &str, now: DateTime<Utc>) -> Result<DeviceStatus, TrustError> {
        self.transition(device_id, now, |device| {
            if device.status != DeviceStatus::Revoked {
                device.status = DeviceStatus::Online;
                device.last_beat = now;
            }
        })
    }

    /// Revoke a device. Revocation is terminal until [`Self::unrevoke`].
    pub fn revoke(&mut self, device_id: &str, now: DateTime<Utc>) -> Result<DeviceStatus, TrustError> {
        self.transition(device_id, now, |device| device.status = DeviceStatus::Revoked)
    }

    pub fn unrevoke(&mut self, device_id: &str, now: DateTime<Utc>) -> Result<DeviceStatus, TrustError> {
        self.transition(device_id, now, |device| {
            if device.status == DeviceStatus::Revoked {
                device.status = DeviceStatus::Online;
                device.last_beat = now;
            }
        })
    }

    /// Mark a device lost, registering it if unknown.
    pub fn mark_lost(&mut self, device_id: &str, now: DateTime<Utc>) -> DeviceStatus {
        self.catch_up(now);
        self.force_device(device_id, DeviceStatus::Lost, now);
        DeviceStatus::Lost
    }

    fn transition<F>(&mut self, device_id: &str, now: DateTime<Utc>, change: F) -> Result<DeviceStatus, TrustError>
    where
        F: FnOnce(&mut DeviceRecord),
    {
        if self.device(device_id).is_none() {
            return Err(TrustError::UnknownDevice(device_id.to_string()));
        }
        self.catch_up(now);

        let heartbeat = self.signal_mut(SignalCategory::Heartbeat);
        let mut status = DeviceStatus::Online;
        if let Some(device) = heartbeat.devices_mut().and_then(|d| d.get_mut(device_id)) {
            let before = device.status;
            change(device);
            status = device.status;
            if before != status {
                info!(device_id, from = ?before, to = ?status, "Device status changed");
            }
        }
        heartbeat.last_event_at = Some(now);
        heartbeat.sync_heartbeat();
        Ok(status)
    }

    /// Track a badge seen by the proximity array. An unauthorized badge
    /// raises presence risk, more the closer it is to the entry point.
    pub fn track_badge(
        &mut self,
        badge_id: &str,
        distance: f64,
        authorized: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<EventRecord>, TrustError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(TrustError::invalid_reading("distance", distance));
        }

        if let SignalAux::Presence { badges } = &mut self.signal_mut(SignalCategory::Presence).aux {
            badges.insert(
                badge_id.to_string(),
                Badge {
                    id: badge_id.to_string(),
                    distance,
                    authorized,
                    seen_at: now,
                },
            );
        }

        if authorized {
            return Ok(None);
        }

        let severity = if distance <= ENTRY_RANGE_METERS {
            Severity::High
        } else if distance <= 5.0 * ENTRY_RANGE_METERS {
            Severity::Medium
        } else {
            Severity::Low
        };
        self.apply_event("unauthorized_badge", severity, None, now).map(Some)
    }

    pub fn remove_badge(&mut self, badge_id: &str) -> bool {
        match &mut self.signal_mut(SignalCategory::Presence).aux {
            SignalAux::Presence { badges } => badges.remove(badge_id).is_some(),
            _ => false,
        }
    }

    /// Record a biometric verification outcome. A rejection raises
    /// biometric risk in proportion to the matcher's confidence.
    pub fn record_verification(
        &mut self,
        passed: bool,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<Option<EventRecord>, TrustError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TrustError::invalid_reading("confidence", confidence));
        }

        if let SignalAux::Biometric { last_verification } =
            &mut self.signal_mut(SignalCategory::Biometric).aux
        {
            *last_verification = Some(crate::Verification {
                passed,
                confidence,
                at: now,
            });
        }

        if passed {
            return Ok(None);
        }

        let severity = if confidence >= 0.75 {
            Severity::High
        } else if confidence >= 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        };
        self.apply_event("biometric_failure", severity, None, now).map(Some)
    }

    /// Score an access attempt against the expected pattern.
    ///
    /// Off-hours access (before 06:00 or after 22:59) and anomalous
    /// locations each deduct from the base score and raise behavior risk.
    pub fn evaluate_access(
        &mut self,
        hour: u8,
        anomalous_location: bool,
        now: DateTime<Utc>,
    ) -> Result<AccessAssessment, TrustError> {
        if hour > 23 {
            return Err(TrustError::invalid_reading("hour", hour));
        }

        let mut score = ACCESS_BASE_SCORE;
        let mut triggered = Vec::new();
        if !(6..=22).contains(&hour) {
            score -= OFF_HOURS_DEDUCTION;
            triggered.push("after_hours_access");
        }
        if anomalous_location {
            score -= LOCATION_DEDUCTION;
            triggered.push("location_anomaly");
        }

        let decision = if score > 90 {
            AccessDecision::Granted
        } else if score > 50 {
            AccessDecision::Challenge
        } else {
            AccessDecision::Denied
        };

        let mut events = Vec::with_capacity(triggered.len());
        for event_type in &triggered {
            events.push(self.apply_event(event_type, Severity::High, None, now)?);
        }
        let reasons: Vec<String> = events.iter().map(|e| e.label.clone()).collect();

        if let SignalAux::Behavior { last_anomaly } = &mut self.signal_mut(SignalCategory::Behavior).aux {
            *last_anomaly = Some(Anomaly {
                score: f64::from(ACCESS_BASE_SCORE - score),
                reason: if reasons.is_empty() {
                    "Access pattern nominal".to_string()
                } else {
                    reasons.join(", ")
                },
            });
        }

        Ok(AccessAssessment {
            score,
            decision,
            reasons,
            events,
        })
    }
}
