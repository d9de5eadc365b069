//! Error types for the link crate.

use std::time::Duration;

use stofzuiger_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while talking to a robot over TCP.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Socket or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session rejected an operation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The robot did not answer in time.
    #[error("no answer from robot within {0:?}")]
    Timeout(Duration),

    /// The robot closed the connection.
    #[error("robot disconnected")]
    Disconnected,
}

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;
