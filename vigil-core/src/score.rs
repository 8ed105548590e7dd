//! Score aggregation
//!
//! Folds the five signal states into one snapshot. Nothing here is cached:
//! every read recomputes from the current states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{gate, AccessLevel, SignalState, BASELINE_SCORE};

/// Explanation used when no category carries a risk factor
pub const NOMINAL_EXPLANATION: &str = "Trust is high. All security signals are nominal.";

/// Discretized score bucket. Declaration order is the band rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    Red,
    Orange,
    Yellow,
    Green,
}

impl ConfidenceBand {
    /// Inclusive lower bounds: 80 green, 60 yellow, 35 orange.
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => ConfidenceBand::Green,
            60..=79 => ConfidenceBand::Yellow,
            35..=59 => ConfidenceBand::Orange,
            _ => ConfidenceBand::Red,
        }
    }

    /// RED < ORANGE < YELLOW < GREEN
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceBand::Red => "RED",
            ConfidenceBand::Orange => "ORANGE",
            ConfidenceBand::Yellow => "YELLOW",
            ConfidenceBand::Green => "GREEN",
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible trust state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustSnapshot {
    pub score: u8,
    pub access_level: AccessLevel,
    pub risk_factors: Vec<String>,
    pub explanation: String,
    pub confidence_band: ConfidenceBand,
    pub last_updated: DateTime<Utc>,
}

/// `100 - sum(penalties)`, clamped to `[0, 100]` and rounded. Any single
/// category at full penalty drives the score to zero.
pub fn compute_score(signals: &[SignalState]) -> u8 {
    let total: f64 = signals.iter().map(|s| s.penalty()).sum();
    (f64::from(BASELINE_SCORE) - total).clamp(0.0, f64::from(BASELINE_SCORE)).round() as u8
}

/// Labels of every degraded category, in category order
pub fn risk_factors(signals: &[SignalState]) -> Vec<String> {
    signals
        .iter()
        .filter_map(|s| s.label().map(str::to_string))
        .collect()
}

/// One-line "why" naming the category with the highest penalty. Ties go
/// to the earliest category.
pub fn explain(signals: &[SignalState]) -> String {
    let mut worst: Option<&SignalState> = None;
    for signal in signals.iter().filter(|s| s.label().is_some()) {
        match worst {
            Some(w) if w.penalty() >= signal.penalty() => {}
            _ => worst = Some(signal),
        }
    }

    match worst.and_then(|w| w.label().map(|label| (w.category(), label))) {
        Some((category, label)) => {
            format!("Trust reduced primarily by {} signal: {}.", category, label)
        }
        None => NOMINAL_EXPLANATION.to_string(),
    }
}

pub fn compute_snapshot(signals: &[SignalState], now: DateTime<Utc>) -> TrustSnapshot {
    let score = compute_score(signals);
    let confidence_band = ConfidenceBand::from_score(score);

    TrustSnapshot {
        score,
        access_level: gate::evaluate(score, confidence_band),
        risk_factors: risk_factors(signals),
        explanation: explain(signals),
        confidence_band,
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SignalCategory;

    fn states(penalties: [f64; 5]) -> Vec<SignalState> {
        let now = Utc::now();
        SignalCategory::ALL
            .iter()
            .zip(penalties)
            .map(|(category, penalty)| {
                let mut state = SignalState::baseline(*category);
                if penalty > 0.0 {
                    state.raise(penalty, &format!("{} risk", category), now);
                }
                state
            })
            .collect()
    }

    #[test]
    fn test_nominal_snapshot() {
        let snapshot = compute_snapshot(&states([0.0; 5]), Utc::now());
        assert_eq!(snapshot.score, 100);
        assert_eq!(snapshot.confidence_band, ConfidenceBand::Green);
        assert_eq!(snapshot.access_level, AccessLevel::Full);
        assert!(snapshot.risk_factors.is_empty());
        assert_eq!(snapshot.explanation, NOMINAL_EXPLANATION);
    }

    #[test]
    fn test_weakest_link() {
        for full in 0..5 {
            for other in [0.0, 12.5, 40.0, 100.0] {
                let mut penalties = [other; 5];
                penalties[full] = 100.0;
                assert_eq!(compute_score(&states(penalties)), 0);
            }
        }
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(ConfidenceBand::from_score(100), ConfidenceBand::Green);
        assert_eq!(ConfidenceBand::from_score(80), ConfidenceBand::Green);
        assert_eq!(ConfidenceBand::from_score(79), ConfidenceBand::Yellow);
        assert_eq!(ConfidenceBand::from_score(60), ConfidenceBand::Yellow);
        assert_eq!(ConfidenceBand::from_score(59), ConfidenceBand::Orange);
        assert_eq!(ConfidenceBand::from_score(35), ConfidenceBand::Orange);
        assert_eq!(ConfidenceBand::from_score(34), ConfidenceBand::Red);
        assert_eq!(ConfidenceBand::from_score(0), ConfidenceBand::Red);
    }

    #[test]
    fn test_band_monotonicity() {
        for low in 0..=100u8 {
            for high in low..=100u8 {
                assert!(
                    ConfidenceBand::from_score(low).rank() <= ConfidenceBand::from_score(high).rank()
                );
            }
        }
    }

    #[test]
    fn test_risk_factors_in_category_order() {
        let signals = states([0.0, 0.0, 10.0, 0.0, 5.0]);
        let snapshot = compute_snapshot(&signals, Utc::now());
        assert_eq!(snapshot.risk_factors, vec!["integrity risk", "behavior risk"]);
        assert_eq!(snapshot.score, 85);
    }

    #[test]
    fn test_explanation_names_worst_category() {
        let signals = states([10.0, 40.0, 0.0, 0.0, 25.0]);
        assert_eq!(
            explain(&signals),
            "Trust reduced primarily by biometric signal: biometric risk."
        );
    }

    #[test]
    fn test_explanation_tie_breaks_on_category_order() {
        let signals = states([20.0, 0.0, 20.0, 0.0, 20.0]);
        assert_eq!(
            explain(&signals),
            "Trust reduced primarily by presence signal: presence risk."
        );
    }

    #[test]
    fn test_snapshot_wire_format() {
        let snapshot = compute_snapshot(&states([0.0, 40.0, 0.0, 0.0, 0.0]), Utc::now());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["score"], 60);
        assert_eq!(json["confidence_band"], "YELLOW");
        assert_eq!(json["access_level"], "standard");
        assert_eq!(json["risk_factors"][0], "biometric risk");
        assert!(json["last_updated"].is_string());
    }

    #[test]
    fn test_score_rounds_partial_decay() {
        let signals = states([0.0, 39.996, 0.0, 0.0, 0.0]);
        assert_eq!(compute_score(&signals), 60);
    }
}
