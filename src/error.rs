//! # Error Types
//!
//! Custom error types for the RIoT brick using `thiserror`.
//!
//! Variants follow how the gateway reacts to them: transient uplink
//! failures leave a record pending, routing failures skip a record,
//! storage failures abort the current drain cycle, and configuration
//! failures stop the daemon before its loop starts.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the RIoT brick
#[derive(Debug, Error)]
pub enum BrickError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// A credential setting required at startup is absent
    #[error("Missing credential setting: {0}")]
    MissingCredential(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Local outbox database errors
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Payload (de)serialization errors
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// No credential is registered for the record's origin device
    #[error("No credential registered for device {0}")]
    UnknownDevice(String),

    /// HTTP/TLS transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote endpoint answered with something other than 200
    #[error("Upload rejected with HTTP status {0}")]
    Rejected(u16),

    /// A bounded network call did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Client certificate or key could not be read
    #[error("Client identity error for {}: {source}", path.display())]
    Identity {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading rejected before it reaches the outbox
    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    /// Tracker liveness state not recognised
    #[error("Unknown tracker status: {0}")]
    UnknownStatus(String),

    /// Device twin store errors
    #[error("Device twin error: {0}")]
    Twin(String),

    /// Notification dispatch errors
    #[error("Notification error: {0}")]
    Notify(String),

    /// Blocking outbox work panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BrickError {
    /// Whether a per-record upload failure should simply be retried next cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrickError::Transport(_)
                | BrickError::Rejected(_)
                | BrickError::Timeout(_)
                | BrickError::Identity { .. }
        )
    }
}

/// Result type alias for the RIoT brick
pub type Result<T> = std::result::Result<T, BrickError>;
