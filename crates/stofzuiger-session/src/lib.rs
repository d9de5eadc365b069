//! # stofzuiger-session
//!
//! Phone-side state for the stofzuiger vacuum robot's configuration link.
//!
//! - [`ConfigStore`] mirrors the robot's scalar registers and its schedule
//!   table, updated from `[CFG]` reports.
//! - [`ScheduleTable`] tracks the fetch chain of each schedule entry: the
//!   answer for one field triggers the read of the next, so announcing a
//!   count of `n` fetches the whole table without further bookkeeping.
//! - [`Session`] ties the store to a [`LineTransport`] and implements the
//!   connect / disconnect / receive lifecycle.
//! - [`RegisterFile`] emulates the robot end for tests and demos.
//!
//! ## Example
//!
//! ```rust
//! use stofzuiger_session::{Session, SessionConfig};
//!
//! let mut session = Session::new(Vec::<Vec<u8>>::new(), SessionConfig::default());
//! session.on_connected();
//! session.on_line("[CFG] 10 2")?;
//!
//! assert_eq!(session.store().entries().len(), 2);
//! assert_eq!(session.transport().last().map(Vec::as_slice), Some(&b"g15;"[..]));
//! # Ok::<(), stofzuiger_protocol::ProtocolError>(())
//! ```

mod config;
mod emulator;
mod schedule;
mod session;
mod store;
mod telemetry;

pub use config::SessionConfig;
pub use emulator::{RegisterFile, MAX_TIMINGS};
pub use schedule::{
    add_timing_command, edit_timing_commands, remove_timing_command, ChainState, Resize,
    ScheduleEntry, ScheduleTable, TimeOfDay,
};
pub use session::{LineTransport, Observer, Session, SessionEvent, SessionStats};
pub use store::{Applied, ConfigStore, RegisterSnapshot, StoreChange, StoreSnapshot};
pub use telemetry::{describe_metrics, metric_defs, Metric, MetricKind};
