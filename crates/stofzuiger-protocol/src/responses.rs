//! Response parsing for the register protocol.
//!
//! The firmware reports register values as `[CFG] <addr> <value>` lines.
//! Anything else it prints (boot banners, debug output) is plain text that
//! only the terminal shows.

use crate::error::{ProtocolError, ProtocolResult};
use crate::registers::Address;

/// Leading token of a config report.
pub const CFG_TAG: &str = "[CFG]";

/// A decoded `[CFG]` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigEvent {
    /// Register address.
    pub address: Address,
    /// Raw register value.
    pub value: i32,
}

impl ConfigEvent {
    /// Create an event.
    pub fn new(address: impl Into<Address>, value: i32) -> Self {
        ConfigEvent {
            address: address.into(),
            value,
        }
    }

    /// Format the event the way the firmware prints it.
    pub fn to_line(&self) -> String {
        format!("{} {} {}", CFG_TAG, self.address, self.value)
    }
}

/// Parsed line from the robot.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A register report.
    Config(ConfigEvent),
    /// Any other text.
    Text(String),
}

impl Response {
    /// Classify a received line.
    ///
    /// Lines that do not start with the `[CFG]` tag are returned as
    /// [`Response::Text`]. A tagged line with missing or non-numeric fields
    /// is an error.
    pub fn parse(line: &str) -> ProtocolResult<Response> {
        if is_config_line(line) {
            decode(line).map(Response::Config)
        } else {
            Ok(Response::Text(line.to_string()))
        }
    }

    /// Get the event if this is a config report.
    pub fn as_config(&self) -> Option<&ConfigEvent> {
        match self {
            Response::Config(event) => Some(event),
            _ => None,
        }
    }
}

fn is_config_line(line: &str) -> bool {
    line.split(' ').next() == Some(CFG_TAG)
}

/// Decode a `[CFG] <addr> <value>` line.
///
/// The line is split on single spaces and the address and value tokens are
/// trimmed before parsing. Tokens after the value are ignored.
pub fn decode(line: &str) -> ProtocolResult<ConfigEvent> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts[0] != CFG_TAG {
        return Err(ProtocolError::malformed(line, "missing [CFG] tag"));
    }
    if parts.len() < 3 {
        return Err(ProtocolError::malformed(
            line,
            format!("expected 3 fields, got {}", parts.len()),
        ));
    }

    let address: u16 = parts[1]
        .trim()
        .parse()
        .map_err(|_| ProtocolError::malformed(line, format!("invalid address: {}", parts[1])))?;
    let value: i32 = parts[2]
        .trim()
        .parse()
        .map_err(|_| ProtocolError::malformed(line, format!("invalid value: {}", parts[2])))?;

    log::trace!("decoded config report addr={} value={}", address, value);
    Ok(ConfigEvent::new(address, value))
}
