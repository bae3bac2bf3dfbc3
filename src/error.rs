//! Error types for TimeSync
//!
//! ## Table of Contents
//! - **TimeSyncError**: Main error enum covering all failure modes
//! - **Result**: Type alias for `Result<T, TimeSyncError>`

use thiserror::Error;

/// Result type alias for TimeSync operations
pub type Result<T> = std::result::Result<T, TimeSyncError>;

/// Main error type for TimeSync operations
#[derive(Error, Debug)]
pub enum TimeSyncError {
    /// Configuration error during builder or config file setup
    #[error("configuration error: {0}")]
    Config(String),

    /// Clock state could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// Delivery to a downstream server failed
    #[error("network error: {0}")]
    Network(String),

    /// Malformed broadcast payload or channel identifier
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Metrics collection or export failure
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TimeSyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a metrics error
    pub fn metrics(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }
}

impl From<toml::de::Error> for TimeSyncError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for TimeSyncError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<prometheus::Error> for TimeSyncError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}
