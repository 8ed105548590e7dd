//! Vigil Runtime
//!
//! Runs a perimeter as a live service:
//! - **TrustEngine**: one lock around the five signal states, shared by handle
//! - **HeartbeatSupervisor**: background tick applying decay and device timeouts
//! - **DeviceSimulator**: synthetic trusted-device heartbeats for demos

pub mod engine;
pub mod supervisor;
pub mod simulator;

pub use engine::*;
pub use supervisor::*;
pub use simulator::*;
