//! Vigil Core - signal state, decay, scoring and policy for a zero trust perimeter
//!
//! This crate provides the synchronous engine primitives:
//! - Five signal categories with per-category penalty and auxiliary state
//! - Linear decay of penalties toward baseline
//! - A closed event policy table keyed by event type and severity
//! - Score aggregation into a trust snapshot with confidence band
//! - A policy gate mapping score to access level and resource decisions

pub mod error;
pub mod signals;
pub mod decay;
pub mod policy;
pub mod state;
pub mod score;
pub mod gate;

pub use error::*;
pub use signals::*;
pub use decay::*;
pub use policy::*;
pub use state::*;
pub use score::*;
pub use gate::*;

/// Upper bound of any category penalty
pub const MAX_PENALTY: f64 = 100.0;

/// Score of a perimeter with no active risk
pub const BASELINE_SCORE: u8 = 100;

/// Default supervisor tick interval in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Default silence before an online device is presumed lost
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 5;

/// Default number of applied events kept in history
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Distance in meters at which a badge is inside the entry range
pub const ENTRY_RANGE_METERS: f64 = 0.5;
