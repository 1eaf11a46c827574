//! Type definitions for the risk scoring service

pub mod prediction;
pub mod transaction;

pub use prediction::{
    Decision, DecisionThresholds, ModelScoreSet, PredictionResult, RiskLevel,
    RiskLevelThresholds, VelocityFlags,
};
pub use transaction::{DeviceInfo, MerchantInfo, Transaction};
