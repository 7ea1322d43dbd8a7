//! Error types for the disqueue client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// Wire data was not a well-formed envelope
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Envelope parsed but the server reported `success: false`
    #[error("Queue error: {0}")]
    Application(String),

    /// Notification referenced an identifier with no outstanding subscription
    #[error("Correlation error: unknown identifier {0}")]
    Correlation(String),

    /// A fresh identifier collided with one still in flight
    #[error("Correlation error: identifier {0} already in flight")]
    DuplicateCorrelation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;
