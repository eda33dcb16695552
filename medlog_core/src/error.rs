//! Error types for the medlog_core library.

use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medlog_core operations
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

    /// User input rejected; no state was changed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable storage unavailable or full; in-memory state is still valid
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Malformed backup payload; nothing was merged
    #[error("Format error: {0}")]
    Format(String),

    /// Notifications unavailable or denied
    #[error("Permission error: {0}")]
    Permission(String),

    /// No reminder with the given id
    #[error("Unknown reminder: {0}")]
    UnknownReminder(Uuid),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
