//! Configuration management for the risk scoring service

use crate::error::ScoringError;
use crate::models::ensemble::NoiseProfile;
use crate::types::prediction::{DecisionThresholds, RiskLevelThresholds};
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Source of velocity windows and auxiliary signals
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Bounded-random stand-ins
    #[default]
    Simulated,
    /// In-memory card history built from scored transactions
    History,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject every prediction is published to
    pub prediction_subject: String,
    /// Subject for REVIEW and BLOCKED predictions
    pub alert_subject: String,
}

/// Classification thresholds and ensemble noise
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub risk_levels: RiskLevelThresholds,
    #[serde(default)]
    pub decisions: DecisionThresholds,
    #[serde(default)]
    pub noise: NoiseProfile,
}

/// Auxiliary signal settings
#[derive(Debug, Clone, Deserialize)]
pub struct SignalsConfig {
    /// Chance the simulated provider reports an unseen device
    #[serde(default = "default_new_device_probability")]
    pub new_device_probability: f64,
    /// Chance the simulated provider confirms a behavioral anomaly
    #[serde(default = "default_behavioral_anomaly_probability")]
    pub behavioral_anomaly_probability: f64,
    /// Chance the simulated provider confirms a location mismatch
    #[serde(default = "default_location_mismatch_probability")]
    pub location_mismatch_probability: f64,
    /// Autoencoder score above which the history provider reports an anomaly
    #[serde(default = "default_autoencoder_threshold")]
    pub autoencoder_threshold: f64,
}

fn default_new_device_probability() -> f64 {
    0.2
}

fn default_behavioral_anomaly_probability() -> f64 {
    0.6
}

fn default_location_mismatch_probability() -> f64 {
    0.5
}

fn default_autoencoder_threshold() -> f64 {
    0.7
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            new_device_probability: default_new_device_probability(),
            behavioral_anomaly_probability: default_behavioral_anomaly_probability(),
            location_mismatch_probability: default_location_mismatch_probability(),
            autoencoder_threshold: default_autoencoder_threshold(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum transactions scored concurrently
    pub workers: usize,
    /// Timeout for one velocity/feature lookup attempt
    pub lookup_timeout_ms: u64,
    /// Lookup attempts before the request fails
    pub lookup_attempts: u32,
    /// Artificial latency of the simulated lookup
    #[serde(default = "default_simulated_lookup_ms")]
    pub simulated_lookup_ms: u64,
    #[serde(default)]
    pub provider: ProviderKind,
}

fn default_simulated_lookup_ms() -> u64 {
    5
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app.validate().context("Invalid configuration")?;
        Ok(app)
    }

    /// Check threshold tables, noise magnitudes and pipeline limits
    pub fn validate(&self) -> std::result::Result<(), ScoringError> {
        let levels = &self.scoring.risk_levels;
        check_ascending(
            "scoring.risk_levels",
            &[levels.low, levels.medium, levels.high, levels.critical],
        )?;

        let decisions = &self.scoring.decisions;
        check_ascending("scoring.decisions", &[decisions.review, decisions.block])?;

        self.scoring.noise.validate()?;

        let signals = &self.signals;
        for (name, value) in [
            ("signals.new_device_probability", signals.new_device_probability),
            (
                "signals.behavioral_anomaly_probability",
                signals.behavioral_anomaly_probability,
            ),
            (
                "signals.location_mismatch_probability",
                signals.location_mismatch_probability,
            ),
            ("signals.autoencoder_threshold", signals.autoencoder_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScoringError::config(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.pipeline.workers == 0 {
            return Err(ScoringError::config("pipeline.workers must be at least 1"));
        }
        if self.pipeline.lookup_attempts == 0 {
            return Err(ScoringError::config(
                "pipeline.lookup_attempts must be at least 1",
            ));
        }
        if self.pipeline.lookup_timeout_ms == 0 {
            return Err(ScoringError::config(
                "pipeline.lookup_timeout_ms must be positive",
            ));
        }

        Ok(())
    }
}

fn check_ascending(name: &str, bounds: &[f64]) -> std::result::Result<(), ScoringError> {
    if bounds.iter().any(|b| !(0.0..=1.0).contains(b)) {
        return Err(ScoringError::config(format!(
            "{} thresholds must lie in [0, 1]: {:?}",
            name, bounds
        )));
    }
    if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(ScoringError::config(format!(
            "{} thresholds must be strictly increasing: {:?}",
            name, bounds
        )));
    }
    Ok(())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                prediction_subject: "risk.predictions".to_string(),
                alert_subject: "risk.alerts".to_string(),
            },
            scoring: ScoringConfig::default(),
            signals: SignalsConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                lookup_timeout_ms: 50,
                lookup_attempts: 2,
                simulated_lookup_ms: default_simulated_lookup_ms(),
                provider: ProviderKind::Simulated,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}
