//! Connection-scoped protocol driver.
//!
//! A [`Session`] owns the [`ConfigStore`] and a [`LineTransport`]. The link
//! layer feeds it lifecycle callbacks and received bytes; the session
//! decodes lines, updates the store, and sends the follow-up reads the
//! store asks for. Everything runs on the caller's thread, one line at a
//! time, in arrival order.

use std::fmt::{self, Display};
use std::io;

use stofzuiger_protocol::{
    Address, Command, LineCodec, ProtocolError, ProtocolResult, Register, Response,
};
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::schedule::{add_timing_command, edit_timing_commands, remove_timing_command, TimeOfDay};
use crate::store::{ConfigStore, StoreChange};
use crate::telemetry::metric_defs;

/// Outgoing half of the serial link.
///
/// Sends are fire-and-forget: the session logs a failed send and carries
/// on. Reconnecting is the transport owner's business.
pub trait LineTransport {
    /// Write one encoded command.
    fn send_line(&mut self, data: &[u8]) -> io::Result<()>;
}

impl<T: LineTransport + ?Sized> LineTransport for &mut T {
    fn send_line(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).send_line(data)
    }
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn send_line(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).send_line(data)
    }
}

/// Records every sent command. Useful for tests and dry runs.
impl LineTransport for Vec<Vec<u8>> {
    fn send_line(&mut self, data: &[u8]) -> io::Result<()> {
        self.push(data.to_vec());
        Ok(())
    }
}

/// Something a presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    /// The store changed.
    Store(StoreChange),
    /// The robot printed a line that is not a config report.
    Text(String),
}

/// Callback receiving [`SessionEvent`]s.
pub type Observer = Box<dyn FnMut(&SessionEvent) + Send>;

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub lines_sent: u64,
    pub lines_received: u64,
    pub config_events: u64,
    pub malformed: u64,
    pub out_of_range: u64,
    pub send_errors: u64,
}

/// Protocol driver for one robot link.
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    store: ConfigStore,
    codec: LineCodec,
    connected: bool,
    observer: Option<Observer>,
    stats: SessionStats,
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("connected", &self.connected)
            .field("time_count", &self.store.time_count())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<T: LineTransport> Session<T> {
    /// Create a disconnected session.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Session {
            transport,
            config,
            store: ConfigStore::new(config.variant, config.legacy_refetch),
            codec: LineCodec::new(),
            connected: false,
            observer: None,
            stats: SessionStats::default(),
        }
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: impl FnMut(&SessionEvent) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_observer(&mut self, observer: Option<Observer>) {
        self.observer = observer;
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// The link came up: start from scratch and fetch everything.
    pub fn on_connected(&mut self) {
        debug!("link connected, fetching configuration");
        self.reset();
        self.connected = true;
        self.notify(SessionEvent::Connected);
        self.request_all();
    }

    /// The link went down. The store is cleared before this returns.
    pub fn on_disconnected(&mut self) {
        debug!("link disconnected");
        self.reset();
        self.connected = false;
        self.notify(SessionEvent::Disconnected);
    }

    /// Forget the local copy and fetch everything again.
    pub fn refresh(&mut self) -> ProtocolResult<()> {
        self.ensure_connected()?;
        self.reset();
        self.request_all();
        Ok(())
    }

    fn reset(&mut self) {
        self.codec.clear();
        let change = self.store.reset();
        metrics::gauge!(metric_defs::SCHEDULE_ENTRIES.name).set(0.0);
        self.notify(SessionEvent::Store(change));
    }

    fn request_all(&mut self) {
        let variant = self.config.variant;
        for register in Register::scalars(variant) {
            self.send(&Command::get(register));
        }
        self.send(&Command::get(Register::TimeCount));
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    /// Feed raw bytes from the link. Complete lines are handled at once;
    /// per-line errors are logged and dropped. Returns the lines handled.
    pub fn on_bytes(&mut self, data: &[u8]) -> Vec<String> {
        if !self.connected {
            trace!("dropping {} bytes received while disconnected", data.len());
            return Vec::new();
        }
        if let Err(e) = self.codec.push(data) {
            self.stats.malformed += 1;
            metrics::counter!(metric_defs::LINES_MALFORMED.name).increment(1);
            warn!("discarding input: {}", e);
        }
        let mut lines = Vec::new();
        while let Some(line) = self.codec.decode_line() {
            // Already logged and counted.
            let _ = self.on_line(&line);
            lines.push(line);
        }
        lines
    }

    /// Handle one received line.
    ///
    /// Malformed lines and reports for missing schedule entries leave the
    /// store unchanged and are returned as errors.
    pub fn on_line(&mut self, line: &str) -> ProtocolResult<()> {
        if !self.connected {
            trace!("dropping line received while disconnected: {}", line);
            return Err(ProtocolError::NotConnected);
        }

        self.stats.lines_received += 1;
        metrics::counter!(metric_defs::LINES_RECEIVED.name).increment(1);
        trace!("<- {}", line);

        let response = match Response::parse(line) {
            Ok(response) => response,
            Err(e) => {
                self.stats.malformed += 1;
                metrics::counter!(metric_defs::LINES_MALFORMED.name).increment(1);
                warn!("discarding line: {}", e);
                return Err(e);
            }
        };

        match response {
            Response::Text(text) => {
                debug!("robot: {}", text);
                self.notify(SessionEvent::Text(text));
                Ok(())
            }
            Response::Config(event) => {
                self.stats.config_events += 1;
                let applied = match self.store.apply_event(event) {
                    Ok(applied) => applied,
                    Err(e) => {
                        if matches!(
                            e,
                            ProtocolError::IndexOutOfRange { .. }
                                | ProtocolError::TooManyEntries { .. }
                        ) {
                            self.stats.out_of_range += 1;
                            metrics::counter!(metric_defs::EVENTS_OUT_OF_RANGE.name).increment(1);
                        }
                        warn!("ignoring report {}: {}", event.to_line(), e);
                        return Err(e);
                    }
                };

                for request in &applied.requests {
                    self.send(request);
                }
                metrics::gauge!(metric_defs::SCHEDULE_ENTRIES.name)
                    .set(self.store.time_count() as f64);
                for change in applied.changes {
                    self.notify(SessionEvent::Store(change));
                }
                Ok(())
            }
        }
    }

    // ========================================================================
    // Operator commands
    // ========================================================================

    /// Write a named register. The new value shows up in the store once the
    /// robot reports it back.
    pub fn set_register(&mut self, register: Register, value: impl Display) -> ProtocolResult<()> {
        self.set_raw(register.address(), value)
    }

    /// Write a flag register as 0/1.
    pub fn set_flag(&mut self, register: Register, on: bool) -> ProtocolResult<()> {
        self.set_register(register, u8::from(on))
    }

    /// Write any address.
    pub fn set_raw(&mut self, address: Address, value: impl Display) -> ProtocolResult<()> {
        self.ensure_connected()?;
        self.send(&Command::set(address, value));
        Ok(())
    }

    /// Read any address.
    pub fn get_register(&mut self, address: Address) -> ProtocolResult<()> {
        self.ensure_connected()?;
        self.send(&Command::get(address));
        Ok(())
    }

    /// Ask the robot for one more schedule entry.
    pub fn add_timing(&mut self) -> ProtocolResult<()> {
        self.ensure_connected()?;
        let line = add_timing_command(self.store.time_count());
        self.send_text(&line);
        Ok(())
    }

    /// Ask the robot to drop its last schedule entry.
    ///
    /// Returns `false` without sending anything when the table is empty.
    pub fn remove_timing(&mut self) -> ProtocolResult<bool> {
        self.ensure_connected()?;
        match remove_timing_command(self.store.time_count()) {
            Some(line) => {
                self.send_text(&line);
                Ok(true)
            }
            None => {
                debug!("schedule already empty, not removing");
                Ok(false)
            }
        }
    }

    /// Store a new on/run pair for an existing entry.
    pub fn edit_timing(&mut self, index: usize, on: TimeOfDay, run: TimeOfDay) -> ProtocolResult<()> {
        self.ensure_connected()?;
        let len = self.store.entries().len();
        if index >= len {
            return Err(ProtocolError::IndexOutOfRange { index, len });
        }
        for line in edit_timing_commands(index, on, run)? {
            self.send_text(&line);
        }
        Ok(())
    }

    /// Start cleaning.
    pub fn run(&mut self) -> ProtocolResult<()> {
        self.ensure_connected()?;
        self.send(&Command::Run);
        Ok(())
    }

    /// Pause cleaning.
    pub fn pause(&mut self) -> ProtocolResult<()> {
        self.ensure_connected()?;
        self.send(&Command::Pause);
        Ok(())
    }

    /// Send operator-typed text as-is.
    pub fn send_raw(&mut self, text: &str) -> ProtocolResult<()> {
        self.ensure_connected()?;
        self.send_text(text);
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn ensure_connected(&self) -> ProtocolResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ProtocolError::NotConnected)
        }
    }

    fn send(&mut self, command: &Command) {
        self.send_text(&command.to_command_string());
    }

    fn send_text(&mut self, line: &str) {
        let data = LineCodec::encode_command(line, self.config.terminator);
        trace!("-> {}", line);
        match self.transport.send_line(&data) {
            Ok(()) => {
                self.stats.lines_sent += 1;
                metrics::counter!(metric_defs::LINES_SENT.name).increment(1);
            }
            Err(e) => {
                self.stats.send_errors += 1;
                warn!("failed to send {:?}: {}", line, e);
            }
        }
    }

    fn notify(&mut self, event: SessionEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use stofzuiger_protocol::{FirmwareVariant, LineTerminator, MAX_LINE_LENGTH};

    fn connected() -> Session<Vec<Vec<u8>>> {
        let mut session = Session::new(Vec::new(), SessionConfig::default());
        session.on_connected();
        session.transport_mut().clear();
        session
    }

    fn sent(session: &Session<Vec<Vec<u8>>>) -> Vec<String> {
        session
            .transport()
            .iter()
            .map(|line| String::from_utf8_lossy(line).to_string())
            .collect()
    }

    #[test]
    fn test_connect_requests_everything() {
        let mut session = Session::new(Vec::new(), SessionConfig::default());
        session.on_connected();
        assert_eq!(
            sent(&session),
            vec!["g0;", "g1;", "g4;", "g5;", "g6;", "g7;", "g8;", "g9;", "g10;"]
        );
    }

    #[test]
    fn test_connect_extended_variant() {
        let config = SessionConfig {
            variant: FirmwareVariant::Extended,
            ..SessionConfig::default()
        };
        let mut session = Session::new(Vec::new(), config);
        session.on_connected();
        let lines = sent(&session);
        assert_eq!(lines.len(), 11);
        assert_eq!(&lines[2..4], &["g2;", "g3;"]);
    }

    #[test]
    fn test_terminator_is_appended() {
        let config = SessionConfig {
            terminator: LineTerminator::CrLf,
            ..SessionConfig::default()
        };
        let mut session = Session::new(Vec::new(), config);
        session.on_connected();
        assert_eq!(session.transport()[0], b"g0;\r\n");
    }

    #[test]
    fn test_count_report_starts_chains() {
        let mut session = connected();
        session.on_line("[CFG] 10 2").unwrap();
        assert_eq!(sent(&session), vec!["g11;", "g15;"]);
        assert_eq!(session.store().entries().len(), 2);
    }

    #[test]
    fn test_garbage_line() {
        let mut session = connected();
        assert!(matches!(
            session.on_line("[CFG] ten 2"),
            Err(ProtocolError::Malformed { .. })
        ));
        assert!(sent(&session).is_empty());
        assert_eq!(session.store().time_count(), 0);
        assert_eq!(session.stats().malformed, 1);
    }

    #[test]
    fn test_text_line_goes_to_observer() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut session = Session::new(Vec::new(), SessionConfig::default())
            .with_observer(move |event| sink.lock().unwrap().push(event.clone()));
        session.on_connected();
        session.on_line("garbage").unwrap();

        let events = events.lock().unwrap();
        assert!(events.contains(&SessionEvent::Connected));
        assert_eq!(events.last(), Some(&SessionEvent::Text("garbage".to_string())));
    }

    #[test]
    fn test_disconnect_clears_and_rejects() {
        let mut session = connected();
        session.on_line("[CFG] 10 1").unwrap();
        session.on_line("[CFG] 0 1").unwrap();
        session.on_disconnected();

        assert_eq!(session.store().time_count(), 0);
        assert!(!session.store().is_known(Register::FanOn));
        assert_eq!(session.add_timing(), Err(ProtocolError::NotConnected));
        assert_eq!(session.run(), Err(ProtocolError::NotConnected));
        assert_eq!(session.on_line("[CFG] 0 1"), Err(ProtocolError::NotConnected));
        assert!(!session.store().is_known(Register::FanOn));
    }

    #[test]
    fn test_add_and_remove_wait_for_echo() {
        let mut session = connected();
        session.on_line("[CFG] 10 1").unwrap();
        session.transport_mut().clear();

        session.add_timing().unwrap();
        assert_eq!(sent(&session), vec!["c10;2;"]);
        assert_eq!(session.store().entries().len(), 1);

        session.on_line("[CFG] 10 2").unwrap();
        assert_eq!(session.store().entries().len(), 2);

        session.transport_mut().clear();
        assert_eq!(session.remove_timing(), Ok(true));
        assert_eq!(sent(&session), vec!["c10;1;"]);
        assert_eq!(session.store().entries().len(), 2);
    }

    #[test]
    fn test_remove_on_empty_schedule() {
        let mut session = connected();
        session.on_line("[CFG] 10 0").unwrap();
        assert_eq!(session.remove_timing(), Ok(false));
        assert!(sent(&session).is_empty());
    }

    #[test]
    fn test_edit_timing() {
        let mut session = connected();
        let on = TimeOfDay::new(9, 0).unwrap();
        let run = TimeOfDay::new(1, 30).unwrap();
        assert_eq!(
            session.edit_timing(0, on, run),
            Err(ProtocolError::IndexOutOfRange { index: 0, len: 0 })
        );

        session.on_line("[CFG] 10 1").unwrap();
        session.transport_mut().clear();
        session.edit_timing(0, on, run).unwrap();
        assert_eq!(sent(&session), vec!["c11;9;", "c12;0;", "c13;1;", "c14;30;"]);
    }

    #[test]
    fn test_oversized_count_sends_nothing() {
        let mut session = connected();
        session.on_line("[CFG] 10 1").unwrap();
        session.transport_mut().clear();

        let err = session.on_line("[CFG] 10 20000").unwrap_err();
        assert!(matches!(err, ProtocolError::TooManyEntries { count: 20000, .. }));
        assert!(sent(&session).is_empty());
        assert_eq!(session.stats().out_of_range, 1);
        assert_eq!(session.store().time_count(), 1);
    }

    #[test]
    fn test_on_bytes_split_across_chunks() {
        let mut session = connected();
        session.on_bytes(b"[CFG] 1");
        session.on_bytes(b" 1\r\n[CFG] 7 1");
        session.on_bytes(b"20\r\n");

        assert_eq!(session.store().flag(Register::CheckStuck), Some(true));
        assert_eq!(session.store().value(Register::LeftSpeed), Some(120));
        assert_eq!(session.stats().lines_received, 2);
    }

    #[test]
    fn test_on_bytes_returns_lines_and_counts_overlong() {
        let mut session = connected();
        let lines = session.on_bytes(b"boot ok
[CFG] 0 1
[CFG] 5");
        assert_eq!(lines, vec!["boot ok", "[CFG] 0 1"]);

        let overlong = vec![b'x'; MAX_LINE_LENGTH + 1];
        assert!(session.on_bytes(&overlong).is_empty());
        assert_eq!(session.stats().malformed, 1);

        // The rest of the overlong line is skipped up to its newline.
        let lines = session.on_bytes(b"xx
[CFG] 7 90
");
        assert_eq!(lines, vec!["[CFG] 7 90"]);
        assert_eq!(session.store().value(Register::LeftSpeed), Some(90));
        assert_eq!(session.store().value(Register::BackwardsMin), None);
    }

    #[test]
    fn test_set_flag_and_actions() {
        let mut session = connected();
        session.set_flag(Register::Auto, true).unwrap();
        session.set_register(Register::StuckRange, "12").unwrap();
        session.run().unwrap();
        session.pause().unwrap();
        assert_eq!(sent(&session), vec!["c9;1;", "c4;12;", "r", "p"]);
    }
}
