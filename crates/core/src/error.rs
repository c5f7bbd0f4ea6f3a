//! Error types for qakb.
//!
//! One error enum covers every failure category of the pipeline: configuration,
//! I/O, extraction, embedding, and index storage. "Nothing relevant found" is
//! never an error; an empty result list is returned instead.

use thiserror::Error;

/// Unified error type for qakb.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors, including embedding identity mismatches
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text extraction failed for a single document
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Index backend errors (unreachable, corrupt, write failure)
    #[error("Index error: {0}")]
    Index(String),

    /// The index was left unusable and must be rebuilt
    #[error("Index unavailable, rebuild required: {0}")]
    IndexUnavailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
