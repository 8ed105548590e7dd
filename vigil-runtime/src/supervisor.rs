//! Heartbeat Supervisor
//!
//! The one background loop of the engine:
//! - Ticks on a fixed interval for the engine's lifetime
//! - Each tick advances decay and times out silent devices
//! - A failed tick is logged and the loop keeps going
//! - Stops on a single shutdown request

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::TrustEngine;

/// Shortest interval a background loop will tick at
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Handle to a running background loop
pub struct TaskHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl TaskHandle {
    pub(crate) fn new(name: &'static str, shutdown: watch::Sender<bool>, task: JoinHandle<u64>) -> Self {
        Self {
            name,
            shutdown,
            task,
        }
    }

    /// Stop the loop and wait for it. Returns the number of ticks it ran.
    pub async fn shutdown(self) -> u64 {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(ticks) => {
                info!("{} stopped after {} ticks", self.name, ticks);
                ticks
            }
            Err(e) => {
                error!("{} task failed: {}", self.name, e);
                0
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Drives decay and heartbeat timeouts for one engine
pub struct HeartbeatSupervisor {
    engine: TrustEngine,
    tick: Duration,
}

impl HeartbeatSupervisor {
    /// Supervisor ticking at the engine's configured interval
    pub fn new(engine: TrustEngine) -> Self {
        let tick = Duration::from_millis(engine.config().tick_interval_ms);
        Self { engine, tick }
    }

    /// Override the tick interval. Intervals below [`MIN_TICK`] are raised to it.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(MIN_TICK);
        self
    }

    /// Spawn the loop onto the current tokio runtime.
    pub fn spawn(self) -> TaskHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        TaskHandle::new("Heartbeat supervisor", tx, task)
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        info!("Heartbeat supervisor starting ({}ms tick)", self.tick.as_millis());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            ticks += 1;
            match self.engine.tick() {
                Ok(report) => {
                    if !report.lost_devices.is_empty() {
                        warn!(
                            "Heartbeat lost for {} device(s): {}",
                            report.lost_devices.len(),
                            report.lost_devices.join(", ")
                        );
                    }
                    debug!(
                        elapsed_secs = report.elapsed_secs,
                        relaxed = report.relaxed.len(),
                        "Supervisor tick"
                    );
                }
                Err(e) => {
                    // decay follows wall time, so the next tick catches up
                    error!("Supervisor tick failed: {}", e);
                }
            }
        }

        ticks
    }
}
