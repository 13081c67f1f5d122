//! Risk tiers for fairness-gap metrics.

use serde::{Deserialize, Serialize};

/// Upper bound (exclusive) of |metric| for `Low`.
pub const LOW_THRESHOLD: f64 = 0.2;
/// Upper bound (exclusive) of |metric| for `Medium`.
pub const MEDIUM_THRESHOLD: f64 = 0.5;

/// Coarse classification of a fairness gap. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier for one metric value, by magnitude. NaN falls through to `High`.
pub fn classify(metric_value: f64) -> RiskTier {
    let magnitude = metric_value.abs();
    if magnitude < LOW_THRESHOLD {
        RiskTier::Low
    } else if magnitude < MEDIUM_THRESHOLD {
        RiskTier::Medium
    } else {
        RiskTier::High
    }
}

/// The highest tier present, `Low` when there are none.
pub fn overall(risks: &[RiskTier]) -> RiskTier {
    risks.iter().copied().max().unwrap_or_default()
}
