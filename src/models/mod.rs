//! Scoring pipeline components

pub mod assembler;
pub mod classifier;
pub mod ensemble;
pub mod inference;

pub use assembler::PredictionAssembler;
pub use classifier::Classifier;
pub use ensemble::{ModelProvider, NoiseProfile, SimulatedEnsemble};
pub use inference::InferenceEngine;

/// Per-call random source threaded through every component
pub type DynRng = dyn rand::RngCore + Send;
