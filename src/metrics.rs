//! Scoring service statistics.

use crate::error::ScoringError;
use crate::types::prediction::{Decision, ModelScoreSet, PredictionResult, RiskLevel};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_LATENCY_SAMPLES: usize = 10_000;
const MAX_AGREEMENT_SAMPLES: usize = 1_000;

/// Counters and samples shared by all scoring tasks
pub struct PipelineMetrics {
    pub predictions: AtomicU64,
    /// Requests dropped before scoring
    pub rejected: AtomicU64,
    /// Requests failed by an unavailable lookup
    pub upstream_failures: AtomicU64,
    by_decision: RwLock<HashMap<Decision, u64>>,
    by_level: RwLock<HashMap<RiskLevel, u64>>,
    /// End-to-end handling times in microseconds
    latencies: RwLock<Vec<u64>>,
    score_buckets: RwLock<[u64; 10]>,
    model_agreements: RwLock<Vec<f64>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            by_decision: RwLock::new(HashMap::new()),
            by_level: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            model_agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a completed prediction
    pub fn record_prediction(&self, handling_time: Duration, prediction: &PredictionResult) {
        self.predictions.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_decision) = self.by_decision.write() {
            *by_decision.entry(prediction.decision).or_insert(0) += 1;
        }
        if let Ok(mut by_level) = self.by_level.write() {
            *by_level.entry(prediction.risk_level).or_insert(0) += 1;
        }

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(handling_time.as_micros() as u64);
            if latencies.len() > MAX_LATENCY_SAMPLES {
                latencies.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        let bucket = ((prediction.risk_score * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        self.record_model_agreement(&prediction.model_scores);
    }

    /// Record a request that failed before a prediction was produced
    pub fn record_failure(&self, error: &ScoringError) {
        match error {
            ScoringError::Validation(_) => self.rejected.fetch_add(1, Ordering::Relaxed),
            _ => self.upstream_failures.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Agreement = 1 - std dev of the sub-model scores
    pub fn record_model_agreement(&self, scores: &ModelScoreSet) {
        let values: Vec<f64> = scores.components().iter().map(|(_, s)| *s).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let agreement = 1.0 - variance.sqrt().min(1.0);

        if let Ok(mut agreements) = self.model_agreements.write() {
            agreements.push(agreement);
            if agreements.len() > MAX_AGREEMENT_SAMPLES {
                agreements.drain(0..MAX_AGREEMENT_SAMPLES / 2);
            }
        }
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        let Ok(latencies) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    pub fn get_avg_agreement(&self) -> f64 {
        match self.model_agreements.read() {
            Ok(agreements) if !agreements.is_empty() => {
                agreements.iter().sum::<f64>() / agreements.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Predictions per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn decision_count(&self, decision: Decision) -> u64 {
        self.by_decision
            .read()
            .ok()
            .and_then(|m| m.get(&decision).copied())
            .unwrap_or(0)
    }

    pub fn level_count(&self, level: RiskLevel) -> u64 {
        self.by_level
            .read()
            .ok()
            .and_then(|m| m.get(&level).copied())
            .unwrap_or(0)
    }

    pub fn print_summary(&self) {
        let total = self.predictions.load(Ordering::Relaxed);
        let latency = self.get_latency_stats();

        info!(
            predictions = total,
            rejected = self.rejected.load(Ordering::Relaxed),
            upstream_failures = self.upstream_failures.load(Ordering::Relaxed),
            throughput = format!("{:.1} tx/s", self.get_throughput()),
            model_agreement = format!("{:.1}%", self.get_avg_agreement() * 100.0),
            "Scoring summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Latency"
        );
        info!(
            approved = self.decision_count(Decision::Approved),
            review = self.decision_count(Decision::Review),
            blocked = self.decision_count(Decision::Blocked),
            "Decisions"
        );
        info!(
            safe = self.level_count(RiskLevel::Safe),
            low = self.level_count(RiskLevel::Low),
            medium = self.level_count(RiskLevel::Medium),
            high = self.level_count(RiskLevel::High),
            critical = self.level_count(RiskLevel::Critical),
            "Risk levels"
        );

        let distribution = self.get_score_distribution();
        let scored: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if scored > 0 {
                count as f64 / scored as f64 * 100.0
            } else {
                0.0
            };
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                "█".repeat(((pct / 2.0) as usize).min(20))
            );
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Handling time statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
