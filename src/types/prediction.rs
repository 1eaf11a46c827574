//! Prediction result data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal risk level, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from score and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else if score >= thresholds.low {
            RiskLevel::Low
        } else {
            RiskLevel::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enforcement action, ordered from least to most restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approved,
    Review,
    Blocked,
}

impl Decision {
    /// Determine decision from score and thresholds
    pub fn from_score(score: f64, thresholds: &DecisionThresholds) -> Self {
        if score >= thresholds.block {
            Decision::Blocked
        } else if score >= thresholds.review {
            Decision::Review
        } else {
            Decision::Approved
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Review => "REVIEW",
            Decision::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bounds (inclusive) for each risk level above `safe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            low: 0.25,
            medium: 0.50,
            high: 0.75,
            critical: 0.90,
        }
    }
}

/// Lower bounds (inclusive) for REVIEW and BLOCKED.
///
/// Not aligned with [`RiskLevelThresholds`]: a `high` transaction is
/// reviewed below 0.85 and blocked from 0.85 up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub review: f64,
    pub block: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            review: 0.50,
            block: 0.85,
        }
    }
}

/// Per-model probabilities plus the consensus score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScoreSet {
    pub xgboost: f64,
    pub lightgbm: f64,
    pub isolation_forest: f64,
    pub autoencoder: f64,
    pub ensemble: f64,
}

impl ModelScoreSet {
    /// Sub-model scores, in output order
    pub fn components(&self) -> [(&'static str, f64); 4] {
        [
            ("xgboost", self.xgboost),
            ("lightgbm", self.lightgbm),
            ("isolation_forest", self.isolation_forest),
            ("autoencoder", self.autoencoder),
        ]
    }

    /// Copy with every score rounded to 4 decimals
    pub fn rounded(&self) -> Self {
        Self {
            xgboost: round_to(self.xgboost, 4),
            lightgbm: round_to(self.lightgbm, 4),
            isolation_forest: round_to(self.isolation_forest, 4),
            autoencoder: round_to(self.autoencoder, 4),
            ensemble: round_to(self.ensemble, 4),
        }
    }
}

/// Recent-activity indicators for the card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityFlags {
    pub last_1h_count: u32,
    pub last_24h_amount: f64,
    pub unusual_amount: bool,
    pub geo_velocity: bool,
    pub new_device: bool,
}

/// Scoring outcome for one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Prediction identifier (`TXN-` + 8 hex chars)
    pub transaction_id: String,

    /// Consensus fraud probability, 4 decimals
    pub risk_score: f64,

    pub risk_level: RiskLevel,

    pub decision: Decision,

    /// Human-readable justifications, in rule order
    pub fraud_reasons: Vec<String>,

    pub model_scores: ModelScoreSet,

    pub velocity_flags: VelocityFlags,

    /// Pipeline wall-clock time, 2 decimals
    pub latency_ms: f64,

    pub timestamp: DateTime<Utc>,
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
