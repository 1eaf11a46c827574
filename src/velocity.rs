//! Velocity lookup and flag derivation

use crate::error::Result;
use crate::feature_extractor::is_high_risk_country;
use crate::models::DynRng;
use crate::types::prediction::{round_to, VelocityFlags};
use crate::types::transaction::Transaction;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::trace;

/// Amount above which a transaction is flagged as unusual
pub const UNUSUAL_AMOUNT_THRESHOLD: f64 = 2000.0;

/// Card activity strictly preceding the transaction being scored
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityWindow {
    /// Transactions in the hour before
    pub last_1h_count: u32,
    /// Total amount in the 24 hours before
    pub last_24h_amount: f64,
}

/// Windowed activity lookup for a card.
///
/// This is the pipeline's only suspension point; callers bound it with a
/// timeout and never substitute a default window on failure.
#[async_trait]
pub trait VelocityProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    async fn window(&self, tx: &Transaction, rng: &mut DynRng) -> Result<VelocityWindow>;
}

/// Bounded-random stand-in for a time-series store
#[derive(Debug, Clone)]
pub struct SimulatedVelocity {
    lookup_delay: Duration,
}

impl SimulatedVelocity {
    pub fn new(lookup_delay: Duration) -> Self {
        Self { lookup_delay }
    }
}

impl Default for SimulatedVelocity {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

#[async_trait]
impl VelocityProvider for SimulatedVelocity {
    fn name(&self) -> &str {
        "simulated_velocity"
    }

    async fn window(&self, tx: &Transaction, rng: &mut DynRng) -> Result<VelocityWindow> {
        let window = VelocityWindow {
            last_1h_count: rng.gen_range(0..=7),
            last_24h_amount: round_to(rng.gen_range(100.0..=4000.0), 2),
        };

        // Stands in for the store round-trip
        tokio::time::sleep(self.lookup_delay).await;

        trace!(card_id = %tx.card_id, ?window, "Simulated velocity lookup");
        Ok(window)
    }
}

/// Combines a looked-up window with per-transaction flags
#[derive(Debug, Clone)]
pub struct VelocityEstimator {
    unusual_amount_threshold: f64,
}

impl VelocityEstimator {
    pub fn new() -> Self {
        Self {
            unusual_amount_threshold: UNUSUAL_AMOUNT_THRESHOLD,
        }
    }

    /// Build the flags. Independent of the model scores.
    pub fn estimate(&self, tx: &Transaction, window: VelocityWindow, new_device: bool) -> VelocityFlags {
        VelocityFlags {
            last_1h_count: window.last_1h_count,
            last_24h_amount: window.last_24h_amount.max(0.0),
            unusual_amount: tx.amount > self.unusual_amount_threshold,
            geo_velocity: is_high_risk_country(&tx.device.country),
            new_device,
        }
    }
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        Self::new()
    }
}
