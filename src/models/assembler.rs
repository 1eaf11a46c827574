//! Composition of the final prediction

use crate::models::classifier::Classifier;
use crate::types::prediction::{
    round_to, Decision, ModelScoreSet, PredictionResult, RiskLevel, VelocityFlags,
};
use chrono::Utc;
use std::time::Instant;

/// Stamps id, timestamp and latency onto the pipeline's outputs.
///
/// Out-of-range scores or a level/decision pair that disagrees with the
/// classifier are defects in the ensemble or classifier and panic here.
#[derive(Debug, Clone)]
pub struct PredictionAssembler {
    classifier: Classifier,
}

impl PredictionAssembler {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &self,
        consensus: f64,
        model_scores: &ModelScoreSet,
        risk_level: RiskLevel,
        decision: Decision,
        fraud_reasons: Vec<String>,
        velocity_flags: VelocityFlags,
        started_at: Instant,
    ) -> PredictionResult {
        let model_scores = model_scores.rounded();
        let risk_score = round_to(consensus, 4);

        assert!(
            (0.0..=1.0).contains(&risk_score),
            "risk score {} outside [0, 1]",
            risk_score
        );
        for (name, score) in model_scores.components() {
            assert!(
                (0.0..=1.0).contains(&score),
                "{} score {} outside [0, 1]",
                name,
                score
            );
        }
        assert_eq!(
            self.classifier.classify(risk_score),
            (risk_level, decision),
            "classification disagrees with thresholds for score {}",
            risk_score
        );

        // Instant is monotonic, so elapsed() cannot go negative
        let latency_ms = round_to(started_at.elapsed().as_secs_f64() * 1000.0, 2);

        PredictionResult {
            transaction_id: new_prediction_id(),
            risk_score,
            risk_level,
            decision,
            fraud_reasons,
            model_scores,
            velocity_flags,
            latency_ms,
            timestamp: Utc::now(),
        }
    }
}

/// `TXN-` followed by 8 upper-case hex characters
fn new_prediction_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("TXN-{}", hex[..8].to_uppercase())
}
