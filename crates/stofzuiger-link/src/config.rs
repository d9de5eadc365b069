//! YAML configuration for the link and the CLI.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stofzuiger_protocol::{FirmwareVariant, LineTerminator};
use stofzuiger_session::SessionConfig;

use crate::error::Result;

/// Endpoint used when neither the file nor the command line names one.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5000";

/// Seconds a one-shot command waits for the robot.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Link settings.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// `host:port` of the robot's serial bridge.
    pub endpoint: String,
    /// Register layout of the firmware.
    pub variant: FirmwareVariant,
    /// Terminator appended to outgoing commands.
    pub terminator: LineTerminator,
    /// See [`SessionConfig::legacy_refetch`].
    pub legacy_refetch: bool,
    /// Wait bound for one-shot commands, in seconds.
    pub timeout_secs: u64,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            variant: FirmwareVariant::default(),
            terminator: LineTerminator::default(),
            legacy_refetch: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_filter: "info".to_string(),
        }
    }
}

impl LinkConfig {
    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<LinkConfig> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<LinkConfig> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            variant: self.variant,
            terminator: self.terminator,
            legacy_refetch: self.legacy_refetch,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
