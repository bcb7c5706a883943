//! Error types for the vitals_core library.

use chrono::{DateTime, Utc};
use std::io;

use crate::RuleFamily;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vitals_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed numeric or temporal input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Sleep timer started while a session is already open
    #[error("Sleep tracking already active since {since}")]
    AlreadyActive { since: DateTime<Utc> },

    /// Sleep timer stopped while no session is open
    #[error("Sleep tracking is not active")]
    NotActive,

    /// A single advisory rule family failed to evaluate
    #[error("Rule family {family:?} failed: {reason}")]
    RuleFailure { family: RuleFamily, reason: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}
