//! NATS publisher for predictions and alerts

use crate::types::prediction::{Decision, PredictionResult};
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publishes every prediction, and REVIEW/BLOCKED ones again as alerts
#[derive(Clone)]
pub struct PredictionProducer {
    client: Client,
    prediction_subject: String,
    alert_subject: String,
}

impl PredictionProducer {
    pub fn new(client: Client, prediction_subject: &str, alert_subject: &str) -> Self {
        Self {
            client,
            prediction_subject: prediction_subject.to_string(),
            alert_subject: alert_subject.to_string(),
        }
    }

    /// Publish a prediction; returns whether it was also raised as an alert
    pub async fn publish(&self, prediction: &PredictionResult) -> Result<bool> {
        let payload = serde_json::to_vec(prediction)?;

        self.client
            .publish(self.prediction_subject.clone(), payload.clone().into())
            .await?;

        let alerted = Self::is_alert(prediction);
        if alerted {
            self.client
                .publish(self.alert_subject.clone(), payload.into())
                .await?;
        }

        debug!(
            transaction_id = %prediction.transaction_id,
            risk_score = prediction.risk_score,
            decision = %prediction.decision,
            alerted = alerted,
            "Published prediction"
        );

        Ok(alerted)
    }

    /// Whether a prediction goes to the alert subject
    pub fn is_alert(prediction: &PredictionResult) -> bool {
        prediction.decision != Decision::Approved
    }

    pub fn prediction_subject(&self) -> &str {
        &self.prediction_subject
    }

    pub fn alert_subject(&self) -> &str {
        &self.alert_subject
    }
}
