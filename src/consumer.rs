//! NATS subscription for incoming transactions

use crate::error::ScoringError;
use crate::types::transaction::Transaction;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Receives scoring requests from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Parse and validate a message payload.
    ///
    /// Malformed JSON and invalid transactions both come back as
    /// [`ScoringError::Validation`]; neither reaches the scorer.
    pub fn decode(payload: &[u8]) -> std::result::Result<Transaction, ScoringError> {
        let tx: Transaction = serde_json::from_slice(payload)
            .map_err(|e| ScoringError::validation(format!("malformed transaction: {}", e)))?;
        tx.validate()?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let payload = br#"{
            "card_id": "card_9",
            "amount": 310.0,
            "merchant": {"name": "Steam Gaming", "mcc": "7994"},
            "device": {"fingerprint": "fp_x", "ip_address": "1.2.3.4", "country": "GB"}
        }"#;

        let tx = TransactionConsumer::decode(payload).unwrap();
        assert_eq!(tx.card_id, "card_9");
        assert_eq!(tx.merchant.mcc, "7994");
        assert_eq!(tx.device.country, "GB");
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(matches!(
            TransactionConsumer::decode(b"not json"),
            Err(ScoringError::Validation(_))
        ));

        let zero_amount = br#"{
            "amount": 0,
            "merchant": {"name": "Shop"},
            "device": {"fingerprint": "fp", "ip_address": "1.2.3.4"}
        }"#;
        assert!(matches!(
            TransactionConsumer::decode(zero_amount),
            Err(ScoringError::Validation(_))
        ));
    }
}
