//! In-process stand-in for the robot's register file.
//!
//! Answers `c`/`g` commands with `[CFG]` reports the way the firmware does,
//! resizes the schedule when the count register is written, and
//! acknowledges `r`/`p` with a text line. It models the wire contract only,
//! not the robot's behaviour.

use std::collections::BTreeMap;

use stofzuiger_protocol::{Address, ConfigEvent, FirmwareVariant, Register, ScheduleField};
use tracing::trace;

use crate::schedule::TimeOfDay;

/// Upper bound on schedule entries the emulator accepts.
pub const MAX_TIMINGS: usize = 16;

/// A decoded command from the phone.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Set(u16, i32),
    Get(u16),
    Run,
    Pause,
    Invalid(String),
}

/// Emulated firmware register file.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    variant: FirmwareVariant,
    values: BTreeMap<u16, i32>,
    pending: String,
    running: bool,
}

impl RegisterFile {
    /// A register file with factory defaults and an empty schedule.
    pub fn new(variant: FirmwareVariant) -> Self {
        let mut values = BTreeMap::new();
        for register in Register::ALL.iter().filter(|r| r.exists_in(variant)) {
            let default = match register {
                Register::FanOn | Register::CheckStuck => 1,
                Register::StuckRange => 10,
                Register::BackwardsMin => 300,
                Register::BackwardsRotMin => 500,
                Register::LeftSpeed | Register::RightSpeed => 200,
                _ => 0,
            };
            values.insert(register.address().0, default);
        }
        RegisterFile {
            variant,
            values,
            pending: String::new(),
            running: false,
        }
    }

    /// Add schedule entries, up to [`MAX_TIMINGS`] in total.
    pub fn with_timings(mut self, timings: &[(TimeOfDay, TimeOfDay)]) -> Self {
        let start = self.time_count();
        let count = (start + timings.len()).min(MAX_TIMINGS);
        self.resize(count);
        for (index, (on, run)) in (start..count).zip(timings) {
            self.store_entry(index, [on.hour, on.minute, run.hour, run.minute]);
        }
        self
    }

    pub fn variant(&self) -> FirmwareVariant {
        self.variant
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current value at `address`.
    pub fn value(&self, address: impl Into<Address>) -> i32 {
        self.values.get(&address.into().0).copied().unwrap_or(0)
    }

    /// Number of schedule entries.
    pub fn time_count(&self) -> usize {
        self.value(Register::TimeCount).max(0) as usize
    }

    /// Feed bytes from the phone; returns the lines the robot prints in
    /// reply. Incomplete commands are kept until more bytes arrive.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(data));
        let mut replies = Vec::new();
        while let Some(request) = self.next_request() {
            replies.extend(self.handle(request));
        }
        replies
    }

    fn next_request(&mut self) -> Option<Request> {
        let trimmed = self.pending.trim_start().len();
        let skip = self.pending.len() - trimmed;
        self.pending.replace_range(..skip, "");

        let first = self.pending.chars().next()?;
        let (request, used) = match first {
            'r' => (Request::Run, 1),
            'p' => (Request::Pause, 1),
            'g' => {
                let end = self.pending.find(';')?;
                let request = match self.pending[1..end].parse() {
                    Ok(addr) => Request::Get(addr),
                    Err(_) => Request::Invalid(self.pending[..=end].to_string()),
                };
                (request, end + 1)
            }
            'c' => {
                let first_sep = self.pending.find(';')?;
                let second_sep = first_sep + 1 + self.pending[first_sep + 1..].find(';')?;
                let addr = self.pending[1..first_sep].parse();
                let value = self.pending[first_sep + 1..second_sep].trim().parse();
                let request = match (addr, value) {
                    (Ok(addr), Ok(value)) => Request::Set(addr, value),
                    _ => Request::Invalid(self.pending[..=second_sep].to_string()),
                };
                (request, second_sep + 1)
            }
            other => (Request::Invalid(other.to_string()), other.len_utf8()),
        };
        self.pending.replace_range(..used, "");
        Some(request)
    }

    fn handle(&mut self, request: Request) -> Vec<String> {
        trace!("emulator handling {:?}", request);
        match request {
            Request::Get(addr) => vec![self.report(addr)],
            Request::Set(addr, value) => {
                if addr == Register::TimeCount.address().0 {
                    let count = usize::try_from(value).unwrap_or(0).min(MAX_TIMINGS);
                    self.resize(count);
                } else if self.is_addressable(addr) {
                    self.values.insert(addr, value);
                }
                vec![self.report(addr)]
            }
            Request::Run => {
                self.running = true;
                vec!["running".to_string()]
            }
            Request::Pause => {
                self.running = false;
                vec!["paused".to_string()]
            }
            Request::Invalid(text) => vec![format!("unknown command: {}", text)],
        }
    }

    fn is_addressable(&self, addr: u16) -> bool {
        if let Some(register) = Register::from_address(Address(addr), self.variant) {
            return register != Register::TimeCount;
        }
        match ScheduleField::from_address(Address(addr)) {
            Some((index, _)) => index < self.time_count(),
            None => false,
        }
    }

    fn resize(&mut self, count: usize) {
        self.values
            .retain(|&addr, _| match ScheduleField::from_address(Address(addr)) {
                Some((index, _)) => index < count,
                None => true,
            });
        for index in self.time_count()..count {
            self.store_entry(index, [0; 4]);
        }
        self.values.insert(Register::TimeCount.address().0, count as i32);
    }

    fn store_entry(&mut self, index: usize, values: [u32; 4]) {
        for (field, value) in ScheduleField::ALL.into_iter().zip(values) {
            if let Some(addr) = field.address(index) {
                self.values.insert(addr.0, value as i32);
            }
        }
    }

    fn report(&self, addr: u16) -> String {
        ConfigEvent::new(addr, self.value(addr)).to_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_reports_value() {
        let mut robot = RegisterFile::new(FirmwareVariant::Current);
        assert_eq!(robot.feed(b"g7;"), vec!["[CFG] 7 200"]);
    }

    #[test]
    fn test_set_echoes_new_value() {
        let mut robot = RegisterFile::new(FirmwareVariant::Current);
        assert_eq!(robot.feed(b"c4;15;"), vec!["[CFG] 4 15"]);
        assert_eq!(robot.value(Register::StuckRange), 15);
    }

    #[test]
    fn test_commands_split_across_chunks() {
        let mut robot = RegisterFile::new(FirmwareVariant::Current);
        assert!(robot.feed(b"c8;1").is_empty());
        assert_eq!(robot.feed(b"50;g0;"), vec!["[CFG] 8 150", "[CFG] 0 1"]);
    }

    #[test]
    fn test_time_count_resizes_schedule() {
        let on = TimeOfDay::new(8, 0).unwrap();
        let run = TimeOfDay::new(1, 0).unwrap();
        let mut robot = RegisterFile::new(FirmwareVariant::Current).with_timings(&[(on, run), (on, run)]);
        assert_eq!(robot.time_count(), 2);
        assert_eq!(robot.value(Address(15)), 8);

        assert_eq!(robot.feed(b"c10;1;"), vec!["[CFG] 10 1"]);
        assert_eq!(robot.value(Address(15)), 0);
        assert_eq!(robot.feed(b"c10;3;\n"), vec!["[CFG] 10 3"]);
        assert_eq!(robot.value(Address(19)), 0);
    }

    #[test]
    fn test_with_timings_caps_at_max() {
        let on = TimeOfDay::new(6, 30).unwrap();
        let run = TimeOfDay::new(0, 40).unwrap();
        let timings = vec![(on, run); MAX_TIMINGS + 4];
        let robot = RegisterFile::new(FirmwareVariant::Current).with_timings(&timings);

        assert_eq!(robot.time_count(), MAX_TIMINGS);
        let last = 11 + 4 * (MAX_TIMINGS as u16 - 1);
        assert_eq!(robot.value(Address(last)), 6);
        assert_eq!(robot.value(Address(last + 3)), 40);
        assert_eq!(robot.value(Address(last + 4)), 0);
    }

    #[test]
    fn test_schedule_write_outside_table_is_ignored() {
        let mut robot = RegisterFile::new(FirmwareVariant::Current);
        assert_eq!(robot.feed(b"c11;5;"), vec!["[CFG] 11 0"]);
    }

    #[test]
    fn test_run_pause_and_junk() {
        let mut robot = RegisterFile::new(FirmwareVariant::Current);
        assert_eq!(robot.feed(b"r"), vec!["running"]);
        assert!(robot.is_running());
        assert_eq!(robot.feed(b"p x"), vec!["paused", "unknown command: x"]);
        assert!(!robot.is_running());
    }
}
