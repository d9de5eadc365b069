//! Error types for the register protocol.

use thiserror::Error;

/// Errors that can occur when working with the register protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An incoming line could not be decoded as a config report.
    #[error("malformed line {line:?}: {reason}")]
    Malformed {
        /// The offending line, as received.
        line: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A schedule address referenced an entry that does not exist.
    #[error("schedule index {index} out of range (table has {len} entries)")]
    IndexOutOfRange {
        /// Entry index derived from the address.
        index: usize,
        /// Current number of entries.
        len: usize,
    },

    /// A reported TIME_COUNT asked for more entries than the address space
    /// holds.
    #[error("schedule of {count} entries exceeds the maximum of {max}")]
    TooManyEntries {
        /// The reported count.
        count: i32,
        /// Largest addressable schedule.
        max: usize,
    },

    /// A schedule time was outside 00:00..23:59.
    #[error("invalid time {hour}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    /// A received line exceeded the framer's buffer.
    #[error("line too long: max {max} bytes, got {actual}")]
    LineTooLong { max: usize, actual: usize },

    /// The link is down; commands are not accepted until it reconnects.
    #[error("not connected")]
    NotConnected,

    /// A register name that does not map to any address.
    #[error("unknown register: {0}")]
    UnknownRegister(String),
}

impl ProtocolError {
    /// Shorthand for building a [`ProtocolError::Malformed`].
    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        ProtocolError::Malformed {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
