//! Policy gate: score and band to access decisions
//!
//! The coarse [`AccessLevel`] follows the confidence band. Protected
//! resources are checked against their own minimum score independently,
//! so a resource can be stricter or laxer than the coarse level.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ConfidenceBand, TrustError};

/// Coarse access label for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    NoAccess,
    Limited,
    Standard,
    Full,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::NoAccess => "no_access",
            AccessLevel::Limited => "limited",
            AccessLevel::Standard => "standard",
            AccessLevel::Full => "full",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the access level for a score and its band.
pub fn evaluate(score: u8, band: ConfidenceBand) -> AccessLevel {
    debug_assert_eq!(
        ConfidenceBand::from_score(score),
        band,
        "band does not match score {}",
        score
    );
    match band {
        ConfidenceBand::Red => AccessLevel::NoAccess,
        ConfidenceBand::Orange => AccessLevel::Limited,
        ConfidenceBand::Yellow => AccessLevel::Standard,
        ConfidenceBand::Green => AccessLevel::Full,
    }
}

/// A resource behind the perimeter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtectedResource {
    pub id: &'static str,
    pub name: &'static str,
    pub min_score: u8,
}

pub const PROTECTED_RESOURCES: &[ProtectedResource] = &[
    ProtectedResource {
        id: "production-db",
        name: "Production DB",
        min_score: 80,
    },
    ProtectedResource {
        id: "hr-records",
        name: "HR Records",
        min_score: 70,
    },
    ProtectedResource {
        id: "source-repo",
        name: "Source Repository",
        min_score: 60,
    },
    ProtectedResource {
        id: "internal-wiki",
        name: "Internal Wiki",
        min_score: 0,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allowed,
    Denied,
}

/// Outcome of checking one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDecision {
    pub resource_id: &'static str,
    pub name: &'static str,
    pub min_score: u8,
    pub score: u8,
    pub decision: Decision,
}

impl ProtectedResource {
    pub fn check(&self, score: u8) -> ResourceDecision {
        let decision = if score >= self.min_score {
            Decision::Allowed
        } else {
            Decision::Denied
        };
        ResourceDecision {
            resource_id: self.id,
            name: self.name,
            min_score: self.min_score,
            score,
            decision,
        }
    }
}

pub fn check_resource(resource_id: &str, score: u8) -> Result<ResourceDecision, TrustError> {
    PROTECTED_RESOURCES
        .iter()
        .find(|r| r.id == resource_id)
        .map(|r| r.check(score))
        .ok_or_else(|| TrustError::UnknownResource(resource_id.to_string()))
}

pub fn check_all(score: u8) -> Vec<ResourceDecision> {
    PROTECTED_RESOURCES.iter().map(|r| r.check(score)).collect()
}
