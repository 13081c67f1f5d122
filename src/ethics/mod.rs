//! Decision risk classification.
//!
//! Pure functions only: no state, no failure modes.

pub mod fairness;
pub mod risk;
pub mod verdict;

pub use fairness::{assess, FairnessAssessment, FairnessMetrics, RiskAnalysis};
pub use risk::{classify, overall, RiskTier};
pub use verdict::EthicsStatus;
