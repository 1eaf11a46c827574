//! Transaction Risk Scoring Library
//!
//! Scores one payment transaction at a time: risk signals, a simulated
//! four-model ensemble, threshold classification, velocity flags and
//! fraud reasons, within a point-of-sale latency budget.

pub mod config;
pub mod consumer;
pub mod error;
pub mod explain;
pub mod feature_extractor;
pub mod history;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod signals;
pub mod types;
pub mod velocity;

pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use error::ScoringError;
pub use feature_extractor::FeatureExtractor;
pub use history::HistoryStore;
pub use models::inference::InferenceEngine;
pub use producer::PredictionProducer;
pub use types::{prediction::PredictionResult, transaction::Transaction};
