//! Fairness assessment over externally computed metrics.
//!
//! The metrics themselves come from a statistics collaborator; this module
//! only turns their values into risk tiers.

use serde::{Deserialize, Serialize};

use crate::ethics::risk::{classify, overall, RiskTier};

/// Metric values reported for one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetrics {
    pub demographic_parity_difference: f64,
    pub equalized_odds_difference: f64,
}

impl FairnessMetrics {
    pub fn is_finite(&self) -> bool {
        self.demographic_parity_difference.is_finite() && self.equalized_odds_difference.is_finite()
    }
}

/// Per-metric and overall risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub demographic_parity_risk: RiskTier,
    pub equalized_odds_risk: RiskTier,
    pub overall_risk: RiskTier,
}

/// Metrics together with their risk analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessAssessment {
    pub metrics: FairnessMetrics,
    pub risk_analysis: RiskAnalysis,
}

pub fn assess(metrics: FairnessMetrics) -> FairnessAssessment {
    let demographic_parity_risk = classify(metrics.demographic_parity_difference);
    let equalized_odds_risk = classify(metrics.equalized_odds_difference);
    FairnessAssessment {
        metrics,
        risk_analysis: RiskAnalysis {
            demographic_parity_risk,
            equalized_odds_risk,
            overall_risk: overall(&[demographic_parity_risk, equalized_odds_risk]),
        },
    }
}

/// One-line summary used as the audit message.
pub fn summarize(dataset: &str, assessment: &FairnessAssessment) -> String {
    format!(
        "FAIRNESS {dataset}: dp={:.4} ({}) eo={:.4} ({}) overall={}",
        assessment.metrics.demographic_parity_difference,
        assessment.risk_analysis.demographic_parity_risk,
        assessment.metrics.equalized_odds_difference,
        assessment.risk_analysis.equalized_odds_risk,
        assessment.risk_analysis.overall_risk,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assess_combines_tiers() {
        let a = assess(FairnessMetrics {
            demographic_parity_difference: -0.35,
            equalized_odds_difference: 0.05,
        });
        assert_eq!(a.risk_analysis.demographic_parity_risk, RiskTier::Medium);
        assert_eq!(a.risk_analysis.equalized_odds_risk, RiskTier::Low);
        assert_eq!(a.risk_analysis.overall_risk, RiskTier::Medium);
    }

    #[test]
    fn test_summary_mentions_overall() {
        let a = assess(FairnessMetrics {
            demographic_parity_difference: 0.7,
            equalized_odds_difference: 0.1,
        });
        let line = summarize("biased", &a);
        assert!(line.starts_with("FAIRNESS biased:"));
        assert!(line.ends_with("overall=HIGH"));
    }

    #[test]
    fn test_non_finite_is_flagged() {
        let m = FairnessMetrics {
            demographic_parity_difference: f64::NAN,
            equalized_odds_difference: 0.0,
        };
        assert!(!m.is_finite());
    }
}
