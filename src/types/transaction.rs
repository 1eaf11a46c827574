//! Payment transaction data structures

use crate::error::{Result, ScoringError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Merchant the card is being charged by
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantInfo {
    pub name: String,

    #[serde(default)]
    pub category: String,

    /// ISO 3166-1 alpha-2 country code
    #[serde(default = "default_country")]
    pub country: String,

    /// Four-digit merchant category code
    #[serde(default = "default_mcc")]
    pub mcc: String,
}

/// Device the transaction originated from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub fingerprint: String,

    pub ip_address: String,

    #[serde(default)]
    pub location: String,

    #[serde(default = "default_country")]
    pub country: String,
}

/// A payment transaction submitted for risk scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Card (or transaction) identifier; generated when absent
    #[serde(default = "generate_card_id")]
    pub card_id: String,

    #[serde(default = "default_masked_pan")]
    pub masked_pan: String,

    /// Amount in currency units, must be positive
    pub amount: f64,

    #[serde(default = "default_currency")]
    pub currency: String,

    pub merchant: MerchantInfo,

    pub device: DeviceInfo,

    /// Authorization time (defaults to receipt time)
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_country() -> String {
    "US".to_string()
}

fn default_mcc() -> String {
    "5999".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_masked_pan() -> String {
    "**** **** **** 0000".to_string()
}

fn generate_card_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Transaction {
    /// Create a transaction with default merchant and device details
    pub fn new(card_id: String, amount: f64) -> Self {
        Self {
            card_id,
            masked_pan: default_masked_pan(),
            amount,
            currency: default_currency(),
            merchant: MerchantInfo {
                name: "Generic Merchant".to_string(),
                category: String::new(),
                country: default_country(),
                mcc: default_mcc(),
            },
            device: DeviceInfo {
                fingerprint: "fp_default".to_string(),
                ip_address: "127.0.0.1".to_string(),
                location: String::new(),
                country: default_country(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn with_mcc(mut self, mcc: &str) -> Self {
        self.merchant.mcc = mcc.to_string();
        self
    }

    pub fn with_device_country(mut self, country: &str) -> Self {
        self.device.country = country.to_string();
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.device.fingerprint = fingerprint.to_string();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Reject payloads that must never reach the scorer
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ScoringError::validation(format!(
                "amount must be a positive number, got {}",
                self.amount
            )));
        }

        if self.device.fingerprint.trim().is_empty() {
            return Err(ScoringError::validation("device fingerprint is empty"));
        }

        let mcc = &self.merchant.mcc;
        if mcc.len() != 4 || !mcc.chars().all(|c| c.is_ascii_digit()) {
            return Err(ScoringError::validation(format!(
                "merchant category code must be four digits, got {:?}",
                mcc
            )));
        }

        for (field, code) in [
            ("merchant.country", &self.merchant.country),
            ("device.country", &self.device.country),
        ] {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ScoringError::validation(format!(
                    "{} must be an ISO alpha-2 code, got {:?}",
                    field, code
                )));
            }
        }

        Ok(())
    }
}
