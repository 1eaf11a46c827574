//! Risk Scoring Service - Main Entry Point
//!
//! Consumes transactions from NATS, scores them, and publishes predictions
//! (plus alerts for REVIEW/BLOCKED) back to NATS.

use anyhow::Result;
use chrono::Utc;
use futures::StreamExt;
use risk_scoring_service::{
    config::{AppConfig, LoggingConfig, ProviderKind},
    consumer::TransactionConsumer,
    feature_extractor::FeatureExtractor,
    history::HistoryStore,
    metrics::{MetricsReporter, PipelineMetrics},
    models::inference::InferenceEngine,
    producer::PredictionProducer,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("risk_scoring_service={}", logging.level)))?;

    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)?;

    init_tracing(&config.logging)?;
    info!(config = %config_path, "Starting Risk Scoring Service");
    info!(
        "Risk levels: low>={:.2}, medium>={:.2}, high>={:.2}, critical>={:.2}; review>={:.2}, block>={:.2}",
        config.scoring.risk_levels.low,
        config.scoring.risk_levels.medium,
        config.scoring.risk_levels.high,
        config.scoring.risk_levels.critical,
        config.scoring.decisions.review,
        config.scoring.decisions.block
    );
    info!(
        signals = ?FeatureExtractor::new().signal_names(),
        "Feature extractor ready"
    );

    let metrics = Arc::new(PipelineMetrics::new());

    let history = match config.pipeline.provider {
        ProviderKind::History => Some(Arc::new(HistoryStore::new(
            config.signals.autoencoder_threshold,
        ))),
        ProviderKind::Simulated => None,
    };
    let engine = Arc::new(match &history {
        Some(history) => InferenceEngine::with_history(&config, history.clone()),
        None => InferenceEngine::new(&config),
    });

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject);
    let producer = Arc::new(PredictionProducer::new(
        client.clone(),
        &config.nats.prediction_subject,
        &config.nats.alert_subject,
    ));

    let num_workers = config.pipeline.workers;
    info!(
        workers = num_workers,
        transactions = %consumer.subject(),
        predictions = %producer.prediction_subject(),
        alerts = %producer.alert_subject(),
        "Starting scoring loop"
    );

    // Bounds concurrent scoring tasks
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        MetricsReporter::new(metrics_clone, 30).start().await;
    });

    if let Some(history) = history.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                history.sweep(Utc::now());
            }
        });
    }

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let engine = engine.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let history = history.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let transaction = match TransactionConsumer::decode(&message.payload) {
                Ok(tx) => tx,
                Err(e) => {
                    metrics.record_failure(&e);
                    warn!(error = %e, "Dropping transaction");
                    return;
                }
            };

            match engine.predict(&transaction).await {
                Ok(prediction) => {
                    metrics.record_prediction(start_time.elapsed(), &prediction);

                    if let Some(history) = &history {
                        history.record(&transaction);
                    }

                    match producer.publish(&prediction).await {
                        Ok(true) => info!(
                            card_id = %transaction.card_id,
                            transaction_id = %prediction.transaction_id,
                            risk_score = prediction.risk_score,
                            risk_level = %prediction.risk_level,
                            decision = %prediction.decision,
                            reasons = prediction.fraud_reasons.len(),
                            latency_ms = prediction.latency_ms,
                            "Risk alert published"
                        ),
                        Ok(false) => debug!(
                            card_id = %transaction.card_id,
                            transaction_id = %prediction.transaction_id,
                            risk_score = prediction.risk_score,
                            latency_ms = prediction.latency_ms,
                            "Transaction approved"
                        ),
                        Err(e) => error!(
                            transaction_id = %prediction.transaction_id,
                            error = %e,
                            "Failed to publish prediction"
                        ),
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 0 {
                        let latency = metrics.get_latency_stats();
                        info!(
                            processed = count,
                            throughput = format!("{:.1} tx/s", metrics.get_throughput()),
                            avg_latency_us = latency.mean_us,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    metrics.record_failure(&e);
                    error!(
                        card_id = %transaction.card_id,
                        error = %e,
                        "Inference failed"
                    );
                }
            }

            drop(permit);
        });
    }

    info!("Scoring service shutting down...");
    metrics.print_summary();

    Ok(())
}
