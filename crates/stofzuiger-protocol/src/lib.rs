//! Stofzuiger register line protocol
//!
//! This crate provides types and utilities for talking to the vacuum robot's
//! configuration interface over a serial link. The robot exposes a flat file
//! of integer registers that the phone reads and writes with short text
//! commands.
//!
//! # Protocol Overview
//!
//! - **Set** (phone → robot): `c<addr>;<value>;`
//! - **Get** (phone → robot): `g<addr>;`
//! - **Actions** (phone → robot): `r` to run, `p` to pause
//! - **Reports** (robot → phone): `[CFG] <addr> <value>`, one per line
//!
//! There is no acknowledgement, checksum or retry. The robot answers both
//! sets and gets with a report of the register's current value.
//!
//! # Example
//!
//! ```rust
//! use stofzuiger_protocol::{decode, encode_get, Address, ConfigEvent, Register};
//!
//! assert_eq!(encode_get(Register::TimeCount), "g10;");
//!
//! let event = decode("[CFG] 10 2")?;
//! assert_eq!(event, ConfigEvent::new(Address(10), 2));
//! # Ok::<(), stofzuiger_protocol::ProtocolError>(())
//! ```

mod codec;
mod commands;
mod error;
mod registers;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use registers::*;
pub use responses::*;
