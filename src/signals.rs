//! Auxiliary risk signals: new device, behavioral anomaly, location mismatch

use crate::config::SignalsConfig;
use crate::models::DynRng;
use crate::types::prediction::ModelScoreSet;
use crate::types::transaction::Transaction;
use rand::Rng;

/// Source of the secondary signals used for velocity flags and reasons.
///
/// The pipeline only sees this trait; see [`SimulatedSignals`] and
/// [`crate::history::HistoryStore`].
pub trait SignalProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Device fingerprint has no prior record for the card
    fn new_device(&self, tx: &Transaction, rng: &mut DynRng) -> bool;

    /// Behavior deviates from the card's profile
    fn behavioral_anomaly(&self, tx: &Transaction, scores: &ModelScoreSet, rng: &mut DynRng) -> bool;

    /// Location is inconsistent with recent history
    fn location_mismatch(&self, tx: &Transaction, rng: &mut DynRng) -> bool;
}

/// Bernoulli draws with configured probabilities
#[derive(Debug, Clone)]
pub struct SimulatedSignals {
    new_device_probability: f64,
    behavioral_anomaly_probability: f64,
    location_mismatch_probability: f64,
}

impl SimulatedSignals {
    pub fn new(config: &SignalsConfig) -> Self {
        Self {
            new_device_probability: config.new_device_probability,
            behavioral_anomaly_probability: config.behavioral_anomaly_probability,
            location_mismatch_probability: config.location_mismatch_probability,
        }
    }
}

impl Default for SimulatedSignals {
    fn default() -> Self {
        Self::new(&SignalsConfig::default())
    }
}

impl SignalProvider for SimulatedSignals {
    fn name(&self) -> &str {
        "simulated_signals"
    }

    fn new_device(&self, _tx: &Transaction, rng: &mut DynRng) -> bool {
        rng.gen_bool(self.new_device_probability)
    }

    fn behavioral_anomaly(&self, _tx: &Transaction, _scores: &ModelScoreSet, rng: &mut DynRng) -> bool {
        rng.gen_bool(self.behavioral_anomaly_probability)
    }

    fn location_mismatch(&self, _tx: &Transaction, rng: &mut DynRng) -> bool {
        rng.gen_bool(self.location_mismatch_probability)
    }
}
