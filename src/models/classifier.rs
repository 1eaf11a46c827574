//! Threshold classification of the consensus score

use crate::types::prediction::{Decision, DecisionThresholds, RiskLevel, RiskLevelThresholds};

/// Maps a consensus score to a risk level and a decision.
///
/// The two tables are evaluated independently; neither is derived from
/// the other.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    risk_levels: RiskLevelThresholds,
    decisions: DecisionThresholds,
}

impl Classifier {
    pub fn new(risk_levels: RiskLevelThresholds, decisions: DecisionThresholds) -> Self {
        Self {
            risk_levels,
            decisions,
        }
    }

    /// Classify a score in [0, 1]
    pub fn classify(&self, score: f64) -> (RiskLevel, Decision) {
        debug_assert!(
            (0.0..=1.0).contains(&score),
            "consensus score {} outside [0, 1]",
            score
        );
        (
            RiskLevel::from_score(score, &self.risk_levels),
            Decision::from_score(score, &self.decisions),
        )
    }
}
