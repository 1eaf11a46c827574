//! Human-readable fraud reasons

use crate::feature_extractor::{is_high_risk_country, is_high_risk_mcc};
use crate::models::DynRng;
use crate::signals::SignalProvider;
use crate::types::prediction::ModelScoreSet;
use crate::types::transaction::Transaction;
use crate::velocity::UNUSUAL_AMOUNT_THRESHOLD;

pub const BEHAVIORAL_ANOMALY_REASON: &str =
    "Behavioral anomaly detected (Autoencoder reconstruction error > threshold)";
pub const GEO_VELOCITY_REASON: &str =
    "Geographic velocity: transaction location inconsistent with recent history";

/// Evaluates the reason rules in fixed order
#[derive(Debug, Clone)]
pub struct ReasonExplainer {
    /// Score a behavioral anomaly must exceed to be reported
    anomaly_gate: f64,
    /// Score a location mismatch must exceed to be reported
    location_gate: f64,
}

impl ReasonExplainer {
    pub fn new() -> Self {
        Self {
            anomaly_gate: 0.70,
            location_gate: 0.60,
        }
    }

    /// Explain a consensus score.
    ///
    /// Rule order defines output order. Signal providers are only consulted
    /// once the score gate is open.
    pub fn explain(
        &self,
        tx: &Transaction,
        score: f64,
        scores: &ModelScoreSet,
        signals: &dyn SignalProvider,
        rng: &mut DynRng,
    ) -> Vec<String> {
        let mut reasons = Vec::new();

        if tx.amount > UNUSUAL_AMOUNT_THRESHOLD {
            push_unique(
                &mut reasons,
                format!("Unusually large transaction amount (${:.2})", tx.amount),
            );
        }

        if is_high_risk_mcc(&tx.merchant.mcc) {
            push_unique(
                &mut reasons,
                format!("High-risk merchant category (MCC: {})", tx.merchant.mcc),
            );
        }

        if is_high_risk_country(&tx.device.country) {
            push_unique(
                &mut reasons,
                format!("High-risk origin country ({})", tx.device.country),
            );
        }

        if score > self.anomaly_gate && signals.behavioral_anomaly(tx, scores, rng) {
            push_unique(&mut reasons, BEHAVIORAL_ANOMALY_REASON.to_string());
        }

        if score > self.location_gate && signals.location_mismatch(tx, rng) {
            push_unique(&mut reasons, GEO_VELOCITY_REASON.to_string());
        }

        reasons
    }
}

impl Default for ReasonExplainer {
    fn default() -> Self {
        Self::new()
    }
}

fn push_unique(reasons: &mut Vec<String>, reason: String) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}
