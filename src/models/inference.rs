//! Risk scoring pipeline

use crate::config::AppConfig;
use crate::error::{Result, ScoringError};
use crate::explain::ReasonExplainer;
use crate::feature_extractor::FeatureExtractor;
use crate::history::HistoryStore;
use crate::models::assembler::PredictionAssembler;
use crate::models::classifier::Classifier;
use crate::models::ensemble::{ModelProvider, SimulatedEnsemble};
use crate::models::DynRng;
use crate::signals::{SignalProvider, SimulatedSignals};
use crate::types::prediction::{round_to, PredictionResult};
use crate::types::transaction::Transaction;
use crate::velocity::{SimulatedVelocity, VelocityEstimator, VelocityProvider, VelocityWindow};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Scores transactions end to end.
///
/// Holds no per-request state; every call builds its entities from the
/// transaction and its own random source, so one engine is shared across
/// tasks.
pub struct InferenceEngine {
    extractor: FeatureExtractor,
    models: Arc<dyn ModelProvider>,
    classifier: Classifier,
    velocity: Arc<dyn VelocityProvider>,
    signals: Arc<dyn SignalProvider>,
    estimator: VelocityEstimator,
    explainer: ReasonExplainer,
    assembler: PredictionAssembler,
    lookup_timeout: Duration,
    lookup_attempts: u32,
}

impl InferenceEngine {
    /// Create an engine with the simulated providers
    pub fn new(config: &AppConfig) -> Self {
        Self::with_providers(
            config,
            Arc::new(SimulatedEnsemble::new(config.scoring.noise.clone())),
            Arc::new(SimulatedVelocity::new(Duration::from_millis(
                config.pipeline.simulated_lookup_ms,
            ))),
            Arc::new(SimulatedSignals::new(&config.signals)),
        )
    }

    /// Create an engine whose velocity and signals come from card history
    pub fn with_history(config: &AppConfig, history: Arc<HistoryStore>) -> Self {
        Self::with_providers(
            config,
            Arc::new(SimulatedEnsemble::new(config.scoring.noise.clone())),
            history.clone(),
            history,
        )
    }

    /// Create an engine from explicit collaborators
    pub fn with_providers(
        config: &AppConfig,
        models: Arc<dyn ModelProvider>,
        velocity: Arc<dyn VelocityProvider>,
        signals: Arc<dyn SignalProvider>,
    ) -> Self {
        let classifier = Classifier::new(
            config.scoring.risk_levels.clone(),
            config.scoring.decisions.clone(),
        );

        info!(
            models = models.name(),
            velocity = velocity.name(),
            signals = signals.name(),
            lookup_timeout_ms = config.pipeline.lookup_timeout_ms,
            lookup_attempts = config.pipeline.lookup_attempts,
            "Inference engine initialized"
        );

        Self {
            extractor: FeatureExtractor::new(),
            models,
            assembler: PredictionAssembler::new(classifier.clone()),
            classifier,
            velocity,
            signals,
            estimator: VelocityEstimator::new(),
            explainer: ReasonExplainer::new(),
            lookup_timeout: Duration::from_millis(config.pipeline.lookup_timeout_ms),
            lookup_attempts: config.pipeline.lookup_attempts.max(1),
        }
    }

    /// Score a transaction with a freshly seeded random source
    pub async fn predict(&self, tx: &Transaction) -> Result<PredictionResult> {
        let mut rng = StdRng::from_entropy();
        self.predict_with_rng(tx, &mut rng).await
    }

    /// Score a transaction with the caller's random source
    pub async fn predict_with_rng(
        &self,
        tx: &Transaction,
        rng: &mut DynRng,
    ) -> Result<PredictionResult> {
        tx.validate()?;
        let started_at = Instant::now();

        let signals = self.extractor.extract(tx);
        let model_scores = self.models.score(&signals, rng);

        // Classify the published (rounded) value so label and score agree
        let consensus = round_to(model_scores.ensemble, 4);
        let (risk_level, decision) = self.classifier.classify(consensus);

        let window = self.lookup_window(tx, rng).await?;
        let new_device = self.signals.new_device(tx, rng);
        let velocity_flags = self.estimator.estimate(tx, window, new_device);

        let fraud_reasons =
            self.explainer
                .explain(tx, consensus, &model_scores, self.signals.as_ref(), rng);

        let result = self.assembler.assemble(
            consensus,
            &model_scores,
            risk_level,
            decision,
            fraud_reasons,
            velocity_flags,
            started_at,
        );

        debug!(
            card_id = %tx.card_id,
            transaction_id = %result.transaction_id,
            base_risk = signals.base_risk,
            risk_score = result.risk_score,
            risk_level = %result.risk_level,
            decision = %result.decision,
            latency_ms = result.latency_ms,
            "Inference complete"
        );

        Ok(result)
    }

    /// Velocity lookup bounded by timeout and attempt count.
    ///
    /// Fails the request once attempts are exhausted; a default window is
    /// never substituted.
    async fn lookup_window(&self, tx: &Transaction, rng: &mut DynRng) -> Result<VelocityWindow> {
        let mut last_error = String::new();

        for attempt in 1..=self.lookup_attempts {
            match tokio::time::timeout(self.lookup_timeout, self.velocity.window(tx, rng)).await {
                Ok(Ok(window)) => return Ok(window),
                Ok(Err(e)) => {
                    warn!(
                        card_id = %tx.card_id,
                        provider = self.velocity.name(),
                        attempt = attempt,
                        error = %e,
                        "Velocity lookup failed"
                    );
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        card_id = %tx.card_id,
                        provider = self.velocity.name(),
                        attempt = attempt,
                        timeout_ms = self.lookup_timeout.as_millis() as u64,
                        "Velocity lookup timed out"
                    );
                    last_error = format!("timed out after {:?}", self.lookup_timeout);
                }
            }
        }

        Err(ScoringError::UpstreamUnavailable {
            attempts: self.lookup_attempts,
            reason: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalsConfig;
    use crate::types::prediction::{Decision, RiskLevel};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.pipeline.simulated_lookup_ms = 0;
        config
    }

    fn engine() -> InferenceEngine {
        InferenceEngine::new(&test_config())
    }

    /// Never answers within any timeout
    struct StalledVelocity;

    #[async_trait]
    impl VelocityProvider for StalledVelocity {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn window(&self, _tx: &Transaction, _rng: &mut DynRng) -> Result<VelocityWindow> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(VelocityWindow::default())
        }
    }

    /// Fails a fixed number of times before answering
    struct FlakyVelocity {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl VelocityProvider for FlakyVelocity {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn window(&self, _tx: &Transaction, _rng: &mut DynRng) -> Result<VelocityWindow> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ScoringError::lookup("connection reset"));
            }
            Ok(VelocityWindow {
                last_1h_count: 2,
                last_24h_amount: 75.0,
            })
        }
    }

    fn scenario_a() -> Transaction {
        Transaction::new("card_a".to_string(), 15000.0)
            .with_mcc("6051")
            .with_device_country("NG")
    }

    fn scenario_b() -> Transaction {
        Transaction::new("card_b".to_string(), 50.0)
    }

    fn scenario_c() -> Transaction {
        Transaction::new("card_c".to_string(), 3000.0).with_device_country("RU")
    }

    #[tokio::test]
    async fn test_scenario_high_risk_is_blocked() {
        let engine = engine();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = engine.predict_with_rng(&scenario_a(), &mut rng).await.unwrap();

            assert!(result.risk_score >= 0.90, "score {}", result.risk_score);
            assert_eq!(result.risk_level, RiskLevel::Critical);
            assert_eq!(result.decision, Decision::Blocked);
            assert_eq!(result.fraud_reasons[0], "Unusually large transaction amount ($15000.00)");
            assert_eq!(result.fraud_reasons[1], "High-risk merchant category (MCC: 6051)");
            assert_eq!(result.fraud_reasons[2], "High-risk origin country (NG)");
            assert!(result.velocity_flags.unusual_amount);
            assert!(result.velocity_flags.geo_velocity);
        }
    }

    #[tokio::test]
    async fn test_scenario_small_purchase_is_approved() {
        let engine = engine();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = engine.predict_with_rng(&scenario_b(), &mut rng).await.unwrap();

            assert!(result.risk_score <= 0.15, "score {}", result.risk_score);
            assert!(matches!(result.risk_level, RiskLevel::Safe | RiskLevel::Low));
            assert_eq!(result.decision, Decision::Approved);
            assert!(result.fraud_reasons.is_empty());
        }
    }

    #[tokio::test]
    async fn test_scenario_risky_country_is_never_approved() {
        let engine = engine();

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = engine.predict_with_rng(&scenario_c(), &mut rng).await.unwrap();

            assert!(result.decision >= Decision::Review, "seed {}", seed);
            assert!(result
                .fraud_reasons
                .contains(&"High-risk origin country (RU)".to_string()));
        }
    }

    #[tokio::test]
    async fn test_scores_within_unit_interval() {
        let engine = engine();
        let amounts = [0.5, 999.0, 1500.0, 4999.0, 9999.0, 250000.0];

        for (i, amount) in amounts.into_iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(i as u64);
            let tx = Transaction::new("card".to_string(), amount)
                .with_mcc("7994")
                .with_device_country("KP");
            let result = engine.predict_with_rng(&tx, &mut rng).await.unwrap();

            assert!((0.0..=1.0).contains(&result.risk_score));
            assert!((0.0..=1.0).contains(&result.model_scores.ensemble));
            for (_, score) in result.model_scores.components() {
                assert!((0.0..=1.0).contains(&score));
            }
            assert_eq!(result.risk_score, result.model_scores.ensemble);
            assert!(result.latency_ms >= 0.0);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_outcome() {
        let engine = engine();
        let tx = scenario_c();

        let a = engine
            .predict_with_rng(&tx, &mut StdRng::seed_from_u64(17))
            .await
            .unwrap();
        let b = engine
            .predict_with_rng(&tx, &mut StdRng::seed_from_u64(17))
            .await
            .unwrap();

        assert_eq!(a.risk_score, b.risk_score);
        assert_eq!(a.model_scores, b.model_scores);
        assert_eq!(a.velocity_flags, b.velocity_flags);
        assert_eq!(a.fraud_reasons, b.fraud_reasons);
        assert_ne!(a.transaction_id, b.transaction_id);
    }

    #[tokio::test]
    async fn test_invalid_transaction_is_rejected() {
        let engine = engine();
        let tx = Transaction::new("card".to_string(), -5.0);

        let err = engine.predict(&tx).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_stalled_lookup_fails_request() {
        let mut config = test_config();
        config.pipeline.lookup_timeout_ms = 10;
        config.pipeline.lookup_attempts = 2;
        let engine = InferenceEngine::with_providers(
            &config,
            Arc::new(SimulatedEnsemble::default()),
            Arc::new(StalledVelocity),
            Arc::new(SimulatedSignals::default()),
        );

        let err = engine.predict(&scenario_b()).await.unwrap_err();
        assert!(matches!(
            err,
            ScoringError::UpstreamUnavailable { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_lookup_is_retried() {
        let mut config = test_config();
        config.pipeline.lookup_attempts = 3;
        let velocity = Arc::new(FlakyVelocity {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let engine = InferenceEngine::with_providers(
            &config,
            Arc::new(SimulatedEnsemble::default()),
            velocity.clone(),
            Arc::new(SimulatedSignals::default()),
        );

        let result = engine.predict(&scenario_b()).await.unwrap();
        assert_eq!(velocity.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.velocity_flags.last_1h_count, 2);
        assert_eq!(result.velocity_flags.last_24h_amount, 75.0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let mut config = test_config();
        config.pipeline.lookup_attempts = 2;
        let engine = InferenceEngine::with_providers(
            &config,
            Arc::new(SimulatedEnsemble::default()),
            Arc::new(FlakyVelocity {
                failures: 5,
                calls: AtomicU32::new(0),
            }),
            Arc::new(SimulatedSignals::default()),
        );

        match engine.predict(&scenario_b()).await {
            Err(ScoringError::UpstreamUnavailable { attempts, reason }) => {
                assert_eq!(attempts, 2);
                assert!(reason.contains("connection reset"));
            }
            other => panic!("expected upstream failure, got {:?}", other),
        }
    }

    // Velocity flags come from their own providers, not from the score.
    // A low-risk transaction can still carry new_device = true.
    #[tokio::test]
    async fn test_velocity_flags_independent_of_score() {
        let mut config = test_config();
        config.signals = SignalsConfig {
            new_device_probability: 1.0,
            ..SignalsConfig::default()
        };
        let engine = InferenceEngine::new(&config);
        let mut rng = StdRng::seed_from_u64(8);

        let result = engine.predict_with_rng(&scenario_b(), &mut rng).await.unwrap();
        assert_eq!(result.decision, Decision::Approved);
        assert!(result.velocity_flags.new_device);
    }

    #[tokio::test]
    async fn test_history_backed_engine() {
        let config = test_config();
        let history = Arc::new(HistoryStore::new(config.signals.autoencoder_threshold));
        let engine = InferenceEngine::with_history(&config, history.clone());
        let now = Utc::now();

        let earlier = Transaction::new("card_h".to_string(), 120.0)
            .with_fingerprint("fp_phone")
            .with_timestamp(now - chrono::Duration::minutes(10));
        history.record(&earlier);

        let tx = Transaction::new("card_h".to_string(), 80.0)
            .with_fingerprint("fp_phone")
            .with_timestamp(now);
        let result = engine.predict(&tx).await.unwrap();

        assert_eq!(result.velocity_flags.last_1h_count, 1);
        assert_eq!(result.velocity_flags.last_24h_amount, 120.0);
        assert!(!result.velocity_flags.new_device);

        let tx = tx.with_fingerprint("fp_laptop");
        let result = engine.predict(&tx).await.unwrap();
        assert!(result.velocity_flags.new_device);
    }

    #[tokio::test]
    async fn test_concurrent_predictions() {
        let engine = Arc::new(engine());
        let mut handles = Vec::new();

        for i in 0..16u64 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let mut rng = StdRng::seed_from_u64(i);
                engine.predict_with_rng(&scenario_a(), &mut rng).await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.decision, Decision::Blocked);
        }
    }
}
