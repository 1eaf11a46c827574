//! Simulated multi-model ensemble

use crate::error::ScoringError;
use crate::feature_extractor::RiskSignals;
use crate::models::DynRng;
use crate::types::prediction::ModelScoreSet;
use rand::Rng;
use serde::Deserialize;

/// Produces a [`ModelScoreSet`] from base risk signals.
///
/// The simulated ensemble is the only implementation shipped; a registry
/// backed implementation plugs in here.
pub trait ModelProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Score one transaction's signals using the caller's random source
    fn score(&self, signals: &RiskSignals, rng: &mut DynRng) -> ModelScoreSet;
}

/// Maximum absolute perturbation per score.
///
/// The unsupervised detectors get a wider spread than the boosted trees.
#[derive(Debug, Clone, Deserialize)]
pub struct NoiseProfile {
    pub consensus: f64,
    pub xgboost: f64,
    pub lightgbm: f64,
    pub isolation_forest: f64,
    pub autoencoder: f64,
}

impl NoiseProfile {
    /// No perturbation at all; every score equals the base risk
    pub fn silent() -> Self {
        Self {
            consensus: 0.0,
            xgboost: 0.0,
            lightgbm: 0.0,
            isolation_forest: 0.0,
            autoencoder: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        for (name, magnitude) in [
            ("consensus", self.consensus),
            ("xgboost", self.xgboost),
            ("lightgbm", self.lightgbm),
            ("isolation_forest", self.isolation_forest),
            ("autoencoder", self.autoencoder),
        ] {
            if !(0.0..=0.5).contains(&magnitude) {
                return Err(ScoringError::config(format!(
                    "scoring.noise.{} must lie in [0, 0.5], got {}",
                    name, magnitude
                )));
            }
        }
        Ok(())
    }
}

impl Default for NoiseProfile {
    fn default() -> Self {
        Self {
            consensus: 0.04,
            xgboost: 0.04,
            lightgbm: 0.04,
            isolation_forest: 0.06,
            autoencoder: 0.05,
        }
    }
}

/// Add zero-mean noise bounded by `magnitude`, then clamp to [0, 1]
fn perturb(value: f64, magnitude: f64, rng: &mut DynRng) -> f64 {
    if magnitude <= 0.0 {
        return value.clamp(0.0, 1.0);
    }
    (value + rng.gen_range(-magnitude..=magnitude)).clamp(0.0, 1.0)
}

/// Four synthetic detectors scattered around one consensus score
#[derive(Debug, Clone, Default)]
pub struct SimulatedEnsemble {
    noise: NoiseProfile,
}

impl SimulatedEnsemble {
    pub fn new(noise: NoiseProfile) -> Self {
        Self { noise }
    }
}

impl ModelProvider for SimulatedEnsemble {
    fn name(&self) -> &str {
        "simulated_ensemble"
    }

    fn score(&self, signals: &RiskSignals, rng: &mut DynRng) -> ModelScoreSet {
        let ensemble = perturb(signals.base_risk, self.noise.consensus, rng);

        ModelScoreSet {
            xgboost: perturb(ensemble, self.noise.xgboost, rng),
            lightgbm: perturb(ensemble, self.noise.lightgbm, rng),
            isolation_forest: perturb(ensemble, self.noise.isolation_forest, rng),
            autoencoder: perturb(ensemble, self.noise.autoencoder, rng),
            ensemble,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::AmountTier;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn signals(base_risk: f64) -> RiskSignals {
        RiskSignals {
            amount_tier: AmountTier::None,
            merchant_risk: false,
            country_risk: false,
            base_risk,
        }
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let ensemble = SimulatedEnsemble::default();
        let mut rng = StdRng::seed_from_u64(7);

        for base in [0.0, 0.02, 0.5, 0.98, 1.0] {
            for _ in 0..200 {
                let scores = ensemble.score(&signals(base), &mut rng);
                assert!((0.0..=1.0).contains(&scores.ensemble));
                for (name, score) in scores.components() {
                    assert!((0.0..=1.0).contains(&score), "{} = {}", name, score);
                }
            }
        }
    }

    #[test]
    fn test_perturbation_is_bounded() {
        let noise = NoiseProfile::default();
        let ensemble = SimulatedEnsemble::new(noise.clone());
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..500 {
            let scores = ensemble.score(&signals(0.5), &mut rng);
            let eps = 1e-12;
            assert!((scores.ensemble - 0.5).abs() <= noise.consensus + eps);
            assert!((scores.xgboost - scores.ensemble).abs() <= noise.xgboost + eps);
            assert!((scores.lightgbm - scores.ensemble).abs() <= noise.lightgbm + eps);
            assert!(
                (scores.isolation_forest - scores.ensemble).abs() <= noise.isolation_forest + eps
            );
            assert!((scores.autoencoder - scores.ensemble).abs() <= noise.autoencoder + eps);
        }
    }

    #[test]
    fn test_clamp_at_upper_boundary() {
        let ensemble = SimulatedEnsemble::default();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let scores = ensemble.score(&signals(1.0), &mut rng);
            assert!(scores.ensemble <= 1.0);
            assert!(scores.ensemble >= 1.0 - NoiseProfile::default().consensus - 1e-12);
        }
    }

    #[test]
    fn test_silent_profile_returns_base() {
        let ensemble = SimulatedEnsemble::new(NoiseProfile::silent());
        let mut rng = StdRng::seed_from_u64(0);

        let scores = ensemble.score(&signals(0.35), &mut rng);
        assert_eq!(scores.ensemble, 0.35);
        assert_eq!(scores.xgboost, 0.35);
        assert_eq!(scores.autoencoder, 0.35);
    }

    #[test]
    fn test_same_seed_same_scores() {
        let ensemble = SimulatedEnsemble::default();

        let a = ensemble.score(&signals(0.6), &mut StdRng::seed_from_u64(42));
        let b = ensemble.score(&signals(0.6), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_noise_validation() {
        assert!(NoiseProfile::default().validate().is_ok());

        let mut noise = NoiseProfile::default();
        noise.isolation_forest = 0.8;
        assert!(noise.validate().is_err());
    }
}
