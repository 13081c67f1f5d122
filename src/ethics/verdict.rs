//! Rule-based ethics verdict for a single decision.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EthicsStatus {
    Biased,
    Risky,
    Fair,
}

impl EthicsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EthicsStatus::Biased => "BIASED",
            EthicsStatus::Risky => "RISKY",
            EthicsStatus::Fair => "FAIR",
        }
    }
}

/// Below this score a decision that used a sensitive attribute is biased.
pub const BIASED_SCORE_CEILING: f64 = 0.5;
/// Below this score any decision is risky.
pub const RISKY_SCORE_CEILING: f64 = 0.6;

/// Classify a decision from its score and whether a sensitive attribute was
/// involved.
pub fn evaluate(score: f64, has_sensitive_attribute: bool) -> (EthicsStatus, &'static str) {
    if has_sensitive_attribute && score < BIASED_SCORE_CEILING {
        return (
            EthicsStatus::Biased,
            "Sensitive attribute detected with low confidence score",
        );
    }
    if score < RISKY_SCORE_CEILING {
        return (EthicsStatus::Risky, "Low confidence decision");
    }
    (EthicsStatus::Fair, "Decision passed basic ethical checks")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_in_order() {
        assert_eq!(evaluate(0.4, true).0, EthicsStatus::Biased);
        assert_eq!(evaluate(0.4, false).0, EthicsStatus::Risky);
        assert_eq!(evaluate(0.55, true).0, EthicsStatus::Risky);
        assert_eq!(evaluate(0.6, true).0, EthicsStatus::Fair);
        assert_eq!(evaluate(0.9, false).0, EthicsStatus::Fair);
    }
}
