//! Device heartbeat simulator for demos
//!
//! Stands in for real trusted devices: each tick every online device
//! beats, except for a random miss now and then. Lost and revoked devices
//! stay silent until an operator reconnects them.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use vigil_core::DeviceStatus;

use crate::{TaskHandle, TrustEngine, MIN_TICK};

/// Default probability that a device skips a beat
pub const DEFAULT_MISS_RATE: f64 = 0.05;

/// Simulated device roster entry
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedDevice {
    pub id: String,
    pub name: Option<String>,
}

impl SimulatedDevice {
    pub fn new(id: &str, name: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.map(str::to_string),
        }
    }
}

/// The demo roster of three trusted devices
pub fn demo_roster() -> Vec<SimulatedDevice> {
    vec![
        SimulatedDevice::new("DEV-001", Some("Admin Tablet A")),
        SimulatedDevice::new("DEV-002", Some("Security Console")),
        SimulatedDevice::new("DEV-003", Some("Roaming Guard 1")),
    ]
}

pub struct DeviceSimulator {
    engine: TrustEngine,
    devices: Vec<SimulatedDevice>,
    miss_rate: f64,
    tick: Duration,
    rng: StdRng,
}

impl DeviceSimulator {
    pub fn new(engine: TrustEngine, devices: Vec<SimulatedDevice>) -> Self {
        let tick = Duration::from_millis(engine.config().tick_interval_ms);
        Self {
            engine,
            devices,
            miss_rate: DEFAULT_MISS_RATE,
            tick,
            rng: StdRng::from_entropy(),
        }
    }

    /// Set the miss probability, clamped to `0..=1`. NaN keeps the current rate.
    pub fn with_miss_rate(mut self, miss_rate: f64) -> Self {
        if miss_rate.is_nan() {
            warn!("Ignoring NaN miss rate, keeping {}", self.miss_rate);
        } else {
            self.miss_rate = miss_rate.clamp(0.0, 1.0);
        }
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(MIN_TICK);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Register every roster device with the engine.
    pub fn register(&self) {
        for device in &self.devices {
            self.engine.register_device(&device.id, device.name.as_deref());
        }
    }

    /// Send one round of heartbeats. Returns how many devices beat.
    pub fn pulse(&mut self) -> usize {
        let mut beats = 0;
        for device in &self.devices {
            let silenced = self
                .engine
                .device_status(&device.id)
                .is_some_and(DeviceStatus::is_compromised);
            if silenced {
                continue;
            }
            if self.rng.gen::<f64>() < self.miss_rate {
                debug!(device_id = %device.id, "Simulated missed heartbeat");
                continue;
            }
            self.engine.heartbeat(&device.id);
            beats += 1;
        }
        beats
    }

    /// Register the roster and spawn the heartbeat loop.
    pub fn spawn(mut self) -> TaskHandle {
        self.register();
        info!("Simulating {} trusted devices", self.devices.len());

        let (tx, mut rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval(self.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = 0u64;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.pulse();
                        ticks += 1;
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }

            ticks
        });

        TaskHandle::new("Device simulator", tx, task)
    }
}
