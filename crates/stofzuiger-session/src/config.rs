//! Session configuration.

use serde::{Deserialize, Serialize};
use stofzuiger_protocol::{FirmwareVariant, LineTerminator};

/// Protocol options for a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Register layout of the firmware on the other end.
    pub variant: FirmwareVariant,
    /// Terminator appended to every outgoing command.
    pub terminator: LineTerminator,
    /// Also re-read the on minute when an already fetched on hour is
    /// reported again. Matches the phone app the firmware was written
    /// against.
    pub legacy_refetch: bool,
}
