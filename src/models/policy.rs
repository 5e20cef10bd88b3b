//! Policy Engine data model (spec.md §3, §4.1).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk bucket assigned to a rendered shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Blocked,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Verdict returned by [`crate::policy::classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub allowed: bool,
    pub risk: RiskLevel,
    pub reason: String,
}

impl PolicyResult {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            risk: RiskLevel::Blocked,
            reason: reason.into(),
        }
    }

    pub fn high(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            risk: RiskLevel::High,
            reason: reason.into(),
        }
    }

    pub fn medium(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            risk: RiskLevel::Medium,
            reason: reason.into(),
        }
    }

    pub fn low(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            risk: RiskLevel::Low,
            reason: reason.into(),
        }
    }
}
