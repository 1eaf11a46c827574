//! Error types for the scoring pipeline

use thiserror::Error;

/// Errors surfaced by the scoring pipeline to the transport shell.
#[derive(Error, Debug)]
pub enum ScoringError {
    /// Transaction rejected before scoring
    #[error("Validation error: {0}")]
    Validation(String),

    /// Velocity/feature lookup failed on every attempt
    #[error("Upstream unavailable after {attempts} attempt(s): {reason}")]
    UpstreamUnavailable { attempts: u32, reason: String },

    /// A single lookup attempt failed
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Configuration out of range
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScoringError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the caller sent bad input (as opposed to a server-side failure)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;
