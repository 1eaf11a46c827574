//! Risk signal extraction.
//!
//! Turns a transaction into the categorical signals the ensemble scores
//! and accumulates them into a single base-risk estimate.

use crate::types::transaction::Transaction;
use serde::Serialize;

/// Merchant category codes treated as elevated fraud risk
pub const HIGH_RISK_MCC: [&str; 7] = ["6051", "5944", "7994", "7801", "7802", "5912", "4829"];

/// Device countries treated as elevated fraud risk
pub const HIGH_RISK_COUNTRIES: [&str; 8] = ["NG", "RU", "KP", "IR", "MM", "VE", "CU", "SY"];

/// Residual risk every transaction carries
pub const BASE_RISK_FLOOR: f64 = 0.10;

/// Amount breakpoints; each one strictly exceeded adds its increment
const AMOUNT_BREAKPOINTS: [(f64, f64); 4] = [(1000.0, 0.10), (2000.0, 0.10), (5000.0, 0.10), (10000.0, 0.10)];

const MCC_RISK_INCREMENT: f64 = 0.25;
const COUNTRY_RISK_INCREMENT: f64 = 0.25;

pub fn is_high_risk_mcc(mcc: &str) -> bool {
    HIGH_RISK_MCC.contains(&mcc)
}

pub fn is_high_risk_country(country: &str) -> bool {
    HIGH_RISK_COUNTRIES.contains(&country)
}

/// Amount bucket of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountTier {
    None,
    Elevated,
    High,
    Severe,
}

impl AmountTier {
    pub fn from_amount(amount: f64) -> Self {
        if amount > 5000.0 {
            AmountTier::Severe
        } else if amount > 2000.0 {
            AmountTier::High
        } else if amount > 1000.0 {
            AmountTier::Elevated
        } else {
            AmountTier::None
        }
    }
}

/// Signals derived from one transaction, alive for one scoring call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskSignals {
    pub amount_tier: AmountTier,
    pub merchant_risk: bool,
    pub country_risk: bool,
    /// Accumulated base risk in [0, 1]
    pub base_risk: f64,
}

/// Extracts [`RiskSignals`] from transactions.
///
/// Pure and stateless; amount positivity is checked by
/// [`Transaction::validate`] before extraction.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract risk signals from a transaction.
    pub fn extract(&self, tx: &Transaction) -> RiskSignals {
        let mut base_risk = BASE_RISK_FLOOR;

        // Amount signal
        for (breakpoint, increment) in AMOUNT_BREAKPOINTS {
            if tx.amount > breakpoint {
                base_risk += increment;
            }
        }

        // MCC signal
        let merchant_risk = is_high_risk_mcc(&tx.merchant.mcc);
        if merchant_risk {
            base_risk += MCC_RISK_INCREMENT;
        }

        // Country signal
        let country_risk = is_high_risk_country(&tx.device.country);
        if country_risk {
            base_risk += COUNTRY_RISK_INCREMENT;
        }

        RiskSignals {
            amount_tier: AmountTier::from_amount(tx.amount),
            merchant_risk,
            country_risk,
            base_risk: base_risk.clamp(0.0, 1.0),
        }
    }

    /// Get signal names (serialization order).
    pub fn signal_names(&self) -> [&'static str; 4] {
        ["amount_tier", "merchant_risk", "country_risk", "base_risk"]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_floor_for_ordinary_transaction() {
        let extractor = FeatureExtractor::new();
        let tx = Transaction::new("card_1".to_string(), 50.0);

        let signals = extractor.extract(&tx);

        assert_eq!(signals.amount_tier, AmountTier::None);
        assert!(!signals.merchant_risk);
        assert!(!signals.country_risk);
        assert!(approx(signals.base_risk, BASE_RISK_FLOOR));
    }

    #[test]
    fn test_amount_breakpoints_are_cumulative() {
        let extractor = FeatureExtractor::new();
        let cases = [
            (1000.0, AmountTier::None, 0.10),
            (1000.01, AmountTier::Elevated, 0.20),
            (3000.0, AmountTier::High, 0.30),
            (6000.0, AmountTier::Severe, 0.40),
            (15000.0, AmountTier::Severe, 0.50),
        ];

        for (amount, tier, expected) in cases {
            let signals = extractor.extract(&Transaction::new("c".to_string(), amount));
            assert_eq!(signals.amount_tier, tier, "amount {}", amount);
            assert!(approx(signals.base_risk, expected), "amount {}", amount);
        }
    }

    #[test]
    fn test_merchant_and_country_signals() {
        let extractor = FeatureExtractor::new();
        let tx = Transaction::new("c".to_string(), 50.0)
            .with_mcc("6051")
            .with_device_country("NG");

        let signals = extractor.extract(&tx);

        assert!(signals.merchant_risk);
        assert!(signals.country_risk);
        assert!(approx(signals.base_risk, 0.60));
    }

    #[test]
    fn test_base_risk_is_clamped() {
        let extractor = FeatureExtractor::new();
        let tx = Transaction::new("c".to_string(), 15000.0)
            .with_mcc("7994")
            .with_device_country("KP");

        let signals = extractor.extract(&tx);
        assert_eq!(signals.base_risk, 1.0);
    }

    #[test]
    fn test_merchant_country_is_not_a_signal() {
        let extractor = FeatureExtractor::new();
        let mut tx = Transaction::new("c".to_string(), 50.0);
        tx.merchant.country = "NG".to_string();

        assert!(!extractor.extract(&tx).country_risk);
    }
}
