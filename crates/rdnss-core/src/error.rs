//! Error types for the RDNSS daemon
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for RDNSS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the RDNSS daemon
#[derive(Error, Debug)]
pub enum Error {
    /// A Neighbor Discovery option (or the option stream) is malformed
    #[error("Malformed option: {0}")]
    MalformedOption(String),

    /// No packet source could be acquired
    #[error("Packet source unavailable: {0}")]
    SourceUnavailable(String),

    /// The resolver configuration file could not be published
    #[error("Cannot write resolver configuration: {0}")]
    ConfigWrite(String),

    /// The worker/manager notification channel failed
    #[error("Notification channel failure: {0}")]
    Channel(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Privilege drop failed
    #[error("Privilege drop failed: {0}")]
    Privileges(String),

    /// Merge hook could not be run
    #[error("Merge hook error: {0}")]
    Hook(String),

    /// Socket and file I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a malformed option error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedOption(msg.into())
    }

    /// Create a source unavailable error
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Create a resolver write error
    pub fn config_write(msg: impl Into<String>) -> Self {
        Self::ConfigWrite(msg.into())
    }

    /// Create a channel failure error
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a privilege drop error
    pub fn privileges(msg: impl Into<String>) -> Self {
        Self::Privileges(msg.into())
    }

    /// Create a hook error
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// Whether this error only invalidates the packet it came from
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedOption(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Other(format!("task failed: {}", err))
    }
}
