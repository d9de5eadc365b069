//! # stofzuiger-link
//!
//! Connects a [`Session`](stofzuiger_session::Session) to the robot's serial
//! bridge over TCP, and serves the register-file emulator for demos and
//! tests.
//!
//! - [`Link`] owns the socket and the session and drives them on one task.
//! - [`EmulatorServer`] answers as the robot.
//! - [`LinkConfig`] is the YAML configuration shared with the `stofzuiger`
//!   binary.

pub mod config;
pub mod display;
pub mod emulator_server;
pub mod error;
pub mod transport;

pub use config::{LinkConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
pub use display::render_status;
pub use emulator_server::EmulatorServer;
pub use error::{LinkError, Result};
pub use transport::{ChannelTransport, Link, LinkSession, TerminalCommand};
