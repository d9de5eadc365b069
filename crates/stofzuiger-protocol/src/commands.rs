//! Commands that can be sent to the robot firmware.
//!
//! The firmware understands three kinds of input:
//! - Register writes: `c<addr>;<value>;`
//! - Register reads: `g<addr>;`
//! - Single-character actions: `r` (run) and `p` (pause)

use std::fmt::Display;

use crate::codec::{LineCodec, LineTerminator};
use crate::registers::Address;

/// Commands that can be sent to the robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write a register. The value is forwarded verbatim, without range
    /// checks, so numeric text typed by an operator goes through unchanged.
    SetConfig {
        /// Register address.
        address: Address,
        /// Value text.
        value: String,
    },

    /// Read a register. The firmware answers with a `[CFG]` report.
    GetConfig {
        /// Register address.
        address: Address,
    },

    /// Start cleaning.
    Run,

    /// Pause cleaning.
    Pause,

    /// Send a raw command string.
    Raw {
        /// The raw command text.
        command: String,
    },
}

impl Command {
    /// Build a register write.
    pub fn set(address: impl Into<Address>, value: impl Display) -> Command {
        Command::SetConfig {
            address: address.into(),
            value: value.to_string(),
        }
    }

    /// Build a register read.
    pub fn get(address: impl Into<Address>) -> Command {
        Command::GetConfig {
            address: address.into(),
        }
    }

    /// Encode the command as bytes to send, followed by `terminator`.
    pub fn encode(&self, terminator: LineTerminator) -> Vec<u8> {
        LineCodec::encode_command(&self.to_command_string(), terminator)
    }

    /// Get the command string without any terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            Command::SetConfig { address, value } => encode_set(*address, value),
            Command::GetConfig { address } => encode_get(*address),
            Command::Run => "r".to_string(),
            Command::Pause => "p".to_string(),
            Command::Raw { command } => command.clone(),
        }
    }
}

/// Encode a register write line: `c<addr>;<value>;`.
pub fn encode_set(address: impl Into<Address>, value: impl Display) -> String {
    format!("c{};{};", address.into(), value)
}

/// Encode a register read line: `g<addr>;`.
pub fn encode_get(address: impl Into<Address>) -> String {
    format!("g{};", address.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Register;

    #[test]
    fn test_encode_set() {
        assert_eq!(encode_set(Register::LeftSpeed, 200), "c7;200;");
        assert_eq!(encode_set(Address(4), "15"), "c4;15;");
    }

    #[test]
    fn test_encode_set_forwards_value_verbatim() {
        let cmd = Command::set(Register::StuckRange, "-3");
        assert_eq!(cmd.to_command_string(), "c4;-3;");
    }

    #[test]
    fn test_encode_get() {
        assert_eq!(encode_get(Register::TimeCount), "g10;");
        assert_eq!(Command::get(Address(15)).to_command_string(), "g15;");
    }

    #[test]
    fn test_encode_actions() {
        assert_eq!(Command::Run.encode(LineTerminator::None), b"r");
        assert_eq!(Command::Pause.encode(LineTerminator::CrLf), b"p\r\n");
    }
}
