//! Trust engine - the single synchronization domain around the perimeter
//!
//! Every operation takes one lock, reads the clock inside it, mutates or
//! folds the five signal states, and releases. Readers therefore never see
//! a partially decayed or partially reset perimeter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use vigil_core::{
    check_all, check_resource, AccessAssessment, AdvanceReport, DeviceStatus, EventRecord,
    PerimeterConfig, PerimeterState, ResourceDecision, Severity, SignalCategory, SignalState,
    TrustError, TrustSnapshot, DEFAULT_TICK_INTERVAL_MS,
};

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to (tests and replays)
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Supervisor tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Decay, timeout and history settings
    pub perimeter: PerimeterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            perimeter: PerimeterConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    pub fn with_heartbeat_timeout_secs(mut self, secs: u64) -> Self {
        self.perimeter.heartbeat_timeout_secs = secs;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), TrustError> {
        if self.tick_interval_ms == 0 {
            return Err(TrustError::invalid_reading("tick interval", 0));
        }
        self.perimeter.validate()
    }
}

/// A tracked device as exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub last_beat: DateTime<Utc>,
    pub status: DeviceStatus,
}

/// Cloneable handle to one perimeter's trust state
#[derive(Clone)]
pub struct TrustEngine {
    state: Arc<Mutex<PerimeterState>>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl TrustEngine {
    /// Create an engine on the system clock.
    pub fn new(config: EngineConfig) -> Result<Self, TrustError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, TrustError> {
        config.validate()?;
        let state = PerimeterState::new(config.perimeter.clone(), clock.now());
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            clock,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` under the lock with the current time.
    fn with_state<T>(&self, f: impl FnOnce(&mut PerimeterState, DateTime<Utc>) -> T) -> T {
        let mut state = self.state.lock();
        let now = self.clock.now();
        f(&mut *state, now)
    }

    /// Run `f` and snapshot the result without releasing the lock.
    fn with_snapshot<T>(
        &self,
        f: impl FnOnce(&mut PerimeterState, DateTime<Utc>) -> T,
    ) -> (T, TrustSnapshot) {
        self.with_state(|state, now| {
            let value = f(state, now);
            (value, state.snapshot(now))
        })
    }

    fn try_with_snapshot<T>(
        &self,
        f: impl FnOnce(&mut PerimeterState, DateTime<Utc>) -> Result<T, TrustError>,
    ) -> Result<(T, TrustSnapshot), TrustError> {
        self.with_state(|state, now| {
            let value = f(state, now)?;
            Ok((value, state.snapshot(now)))
        })
    }

    /// Current trust snapshot, recomputed from the signal states.
    pub fn snapshot(&self) -> TrustSnapshot {
        self.with_state(|state, now| state.snapshot(now))
    }

    /// Apply an event by type and return the resulting snapshot.
    /// An unrecognized severity is treated as medium.
    pub fn apply_event(
        &self,
        event_type: &str,
        severity: &str,
        device_id: Option<&str>,
    ) -> Result<TrustSnapshot, TrustError> {
        let severity = lenient_severity(severity);
        self.with_state(|state, now| {
            state.apply_event(event_type, severity, device_id, now)?;
            Ok(state.snapshot(now))
        })
    }

    /// Apply an event addressed to an explicit category.
    pub fn apply_categorized(
        &self,
        category: &str,
        event_type: &str,
        severity: &str,
        device_id: Option<&str>,
    ) -> Result<TrustSnapshot, TrustError> {
        let category: SignalCategory = category.parse()?;
        let severity = lenient_severity(severity);
        self.with_state(|state, now| {
            state.apply_categorized(category, event_type, severity, device_id, now)?;
            Ok(state.snapshot(now))
        })
    }

    /// Atomically restore the baseline perimeter.
    pub fn reset(&self) -> TrustSnapshot {
        self.with_state(|state, now| {
            state.reset(now);
            state.snapshot(now)
        })
    }

    /// Advance decay and heartbeat timeouts to now.
    pub fn tick(&self) -> Result<AdvanceReport, TrustError> {
        self.with_state(|state, now| state.advance(now))
    }

    pub fn signals(&self) -> Vec<SignalState> {
        self.with_state(|state, now| {
            state.catch_up(now);
            state.signals().to_vec()
        })
    }

    /// Applied events, oldest first
    pub fn history(&self) -> Vec<EventRecord> {
        self.with_state(|state, _| state.history().cloned().collect())
    }

    pub fn devices(&self) -> Vec<DeviceView> {
        self.with_state(|state, now| {
            state.catch_up(now);
            state
                .devices()
                .map(|(id, d)| DeviceView {
                    id: id.clone(),
                    name: d.name.clone(),
                    last_beat: d.last_beat,
                    status: d.status,
                })
                .collect()
        })
    }

    pub fn device_status(&self, device_id: &str) -> Option<DeviceStatus> {
        self.with_state(|state, _| state.device(device_id).map(|d| d.status))
    }

    pub fn register_device(&self, device_id: &str, name: Option<&str>) {
        self.with_state(|state, now| state.register_device(device_id, name, now))
    }

    pub fn heartbeat(&self, device_id: &str) -> (DeviceStatus, TrustSnapshot) {
        self.with_snapshot(|state, now| state.heartbeat(device_id, now))
    }

    pub fn reconnect(&self, device_id: &str) -> Result<(DeviceStatus, TrustSnapshot), TrustError> {
        self.try_with_snapshot(|state, now| state.reconnect(device_id, now))
    }

    pub fn revoke(&self, device_id: &str) -> Result<(DeviceStatus, TrustSnapshot), TrustError> {
        self.try_with_snapshot(|state, now| state.revoke(device_id, now))
    }

    pub fn unrevoke(&self, device_id: &str) -> Result<(DeviceStatus, TrustSnapshot), TrustError> {
        self.try_with_snapshot(|state, now| state.unrevoke(device_id, now))
    }

    pub fn mark_lost(&self, device_id: &str) -> (DeviceStatus, TrustSnapshot) {
        self.with_snapshot(|state, now| state.mark_lost(device_id, now))
    }

    pub fn track_badge(
        &self,
        badge_id: &str,
        distance: f64,
        authorized: bool,
    ) -> Result<(Option<EventRecord>, TrustSnapshot), TrustError> {
        self.try_with_snapshot(|state, now| state.track_badge(badge_id, distance, authorized, now))
    }

    /// Forget a badge. The flag is false if it was not being tracked.
    pub fn remove_badge(&self, badge_id: &str) -> (bool, TrustSnapshot) {
        self.with_snapshot(|state, _| state.remove_badge(badge_id))
    }

    pub fn record_verification(
        &self,
        passed: bool,
        confidence: f64,
    ) -> Result<(Option<EventRecord>, TrustSnapshot), TrustError> {
        self.try_with_snapshot(|state, now| state.record_verification(passed, confidence, now))
    }

    pub fn evaluate_access(
        &self,
        hour: u8,
        anomalous_location: bool,
    ) -> Result<(AccessAssessment, TrustSnapshot), TrustError> {
        self.try_with_snapshot(|state, now| state.evaluate_access(hour, anomalous_location, now))
    }

    /// Check one protected resource against the current score.
    pub fn check_resource(&self, resource_id: &str) -> Result<ResourceDecision, TrustError> {
        let score = self.snapshot().score;
        check_resource(resource_id, score)
    }

    pub fn check_all_resources(&self) -> Vec<ResourceDecision> {
        check_all(self.snapshot().score)
    }
}

fn lenient_severity(raw: &str) -> Severity {
    let (severity, recognized) = Severity::parse_lenient(raw);
    if !recognized {
        warn!(severity = raw, "Unrecognized severity, defaulting to medium");
    }
    severity
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vigil_core::{ConfidenceBand, Decision};

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn engine() -> (TrustEngine, ManualClock) {
        let clock = ManualClock::new(t0());
        let engine = TrustEngine::with_clock(EngineConfig::default(), Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    #[test]
    fn test_fresh_engine_is_nominal() {
        let (engine, _) = engine();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.score, 100);
        assert_eq!(snapshot.confidence_band, ConfidenceBand::Green);
        assert!(snapshot.risk_factors.is_empty());
    }

    #[test]
    fn test_unrecognized_severity_defaults_to_medium() {
        let (engine, _) = engine();
        let snapshot = engine.apply_event("biometric_failure", "critical", None).unwrap();
        // medium biometric failure is 25
        assert_eq!(snapshot.score, 75);
    }

    #[test]
    fn test_apply_categorized_rejects_bad_category() {
        let (engine, _) = engine();
        assert_eq!(
            engine.apply_categorized("thermal", "tailgating_detected", "high", None),
            Err(TrustError::InvalidCategory("thermal".to_string()))
        );
        let snapshot = engine
            .apply_categorized("integrity", "tailgating_detected", "high", None)
            .unwrap();
        assert_eq!(snapshot.score, 65);
    }

    #[test]
    fn test_tick_decays_with_clock() {
        let (engine, clock) = engine();
        engine.apply_event("presence_anomaly", "high", None).unwrap();

        clock.advance(Duration::seconds(5));
        let report = engine.tick().unwrap();
        assert_eq!(report.relaxed, vec![SignalCategory::Presence]);
        assert_eq!(engine.snapshot().score, 90);
    }

    #[test]
    fn test_tick_reports_clock_skew() {
        let (engine, clock) = engine();
        clock.set(t0() - Duration::seconds(1));
        assert!(matches!(engine.tick(), Err(TrustError::ClockSkew { .. })));
        assert_eq!(engine.snapshot().score, 100);
    }

    #[test]
    fn test_device_lifecycle() {
        let (engine, clock) = engine();
        engine.register_device("DEV-001", Some("Admin Tablet A"));
        assert_eq!(engine.device_status("DEV-001"), Some(DeviceStatus::Online));

        clock.advance(Duration::seconds(6));
        engine.tick().unwrap();
        assert_eq!(engine.device_status("DEV-001"), Some(DeviceStatus::Lost));
        assert_eq!(engine.snapshot().score, 0);

        let (status, snapshot) = engine.reconnect("DEV-001").unwrap();
        assert_eq!(status, DeviceStatus::Online);
        assert_eq!(snapshot.score, 100);

        let devices = engine.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name.as_deref(), Some("Admin Tablet A"));
    }

    #[test]
    fn test_resources_follow_score() {
        let (engine, _) = engine();
        assert_eq!(engine.check_resource("production-db").unwrap().decision, Decision::Allowed);

        engine.apply_event("biometric_failure", "high", None).unwrap();
        assert_eq!(engine.check_resource("production-db").unwrap().decision, Decision::Denied);
        assert_eq!(engine.check_resource("source-repo").unwrap().decision, Decision::Allowed);
        assert!(engine.check_resource("mainframe").is_err());
        assert_eq!(engine.check_all_resources().len(), 4);
    }

    #[test]
    fn test_reset_twice_yields_baseline() {
        let (engine, _) = engine();
        engine.apply_event("door_forced", "high", None).unwrap();
        engine.mark_lost("DEV-002");

        let first = engine.reset();
        let second = engine.reset();
        assert_eq!(first, second);
        assert_eq!(first.score, 100);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_consistent_scores() {
        let (engine, _) = engine();
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        engine.apply_event("presence_anomaly", "low", None).unwrap();
                        engine.reset();
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let snapshot = engine.snapshot();
            // only whole multiples of the 5-point increment are observable
            assert_eq!(snapshot.score % 5, 0);
            assert_eq!(snapshot.risk_factors.is_empty(), snapshot.score == 100);
        }

        for writer in writers {
            writer.join().unwrap();
        }
    }

    #[test]
    fn test_device_actions_snapshot_under_same_lock() {
        let (engine, _) = engine();
        let resetter = {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    engine.reset();
                }
            })
        };

        // a reset can never land between marking the device and scoring
        for _ in 0..500 {
            let (status, snapshot) = engine.mark_lost("DEV-001");
            assert_eq!(status, DeviceStatus::Lost);
            assert_eq!(snapshot.score, 0);
        }
        resetter.join().unwrap();

        let (removed, snapshot) = engine.remove_badge("B-1");
        assert!(!removed);
        assert_eq!(snapshot.score, engine.snapshot().score);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::default().with_tick_interval_ms(0);
        assert!(TrustEngine::new(config).is_err());

        let config = EngineConfig::default().with_heartbeat_timeout_secs(u64::MAX / 2);
        assert_eq!(
            config.validate(),
            Err(TrustError::invalid_reading("heartbeat timeout", u64::MAX / 2))
        );
        assert!(TrustEngine::new(config).is_err());

        // largest timeout that still fits a chrono duration
        let config = EngineConfig::default().with_heartbeat_timeout_secs(i64::MAX as u64 / 1000);
        assert!(config.validate().is_ok());
    }
}
