//! Schedule table and its fetch chain.
//!
//! Each schedule entry is four registers wide. After connecting, the robot
//! reports how many entries it holds; for every entry the phone then reads
//! the four registers one after another, each answer triggering the read of
//! the next field. [`ChainState`] tracks where an entry is in that walk.

use serde::Serialize;
use stofzuiger_protocol::{
    encode_set, Address, ProtocolError, ProtocolResult, Register, ScheduleField,
    MAX_SCHEDULE_ENTRIES,
};

/// Progress of the fetch chain for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    AwaitingOnHour,
    AwaitingOnMinute,
    AwaitingRunHour,
    AwaitingRunMinute,
    Complete,
}

impl ChainState {
    /// The field this state is waiting for, if any.
    pub fn expected(&self) -> Option<ScheduleField> {
        match self {
            ChainState::AwaitingOnHour => Some(ScheduleField::OnHour),
            ChainState::AwaitingOnMinute => Some(ScheduleField::OnMinute),
            ChainState::AwaitingRunHour => Some(ScheduleField::RunHour),
            ChainState::AwaitingRunMinute => Some(ScheduleField::RunMinute),
            ChainState::Complete => None,
        }
    }

    /// Whether a report for `field` advances this chain.
    pub fn expects(&self, field: ScheduleField) -> bool {
        self.expected() == Some(field)
    }

    /// The state after the expected field has arrived.
    pub fn advance(self) -> ChainState {
        match self {
            ChainState::AwaitingOnHour => ChainState::AwaitingOnMinute,
            ChainState::AwaitingOnMinute => ChainState::AwaitingRunHour,
            ChainState::AwaitingRunHour => ChainState::AwaitingRunMinute,
            ChainState::AwaitingRunMinute | ChainState::Complete => ChainState::Complete,
        }
    }
}

/// A time of day as hours and minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    /// Validated constructor.
    pub fn new(hour: u32, minute: u32) -> ProtocolResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(ProtocolError::InvalidTime { hour, minute });
        }
        Ok(TimeOfDay { hour, minute })
    }

    /// Parse `HH:MM`.
    pub fn parse(s: &str) -> ProtocolResult<Self> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::malformed(s, "expected HH:MM"))?;
        let hour = h
            .trim()
            .parse()
            .map_err(|_| ProtocolError::malformed(s, "invalid hour"))?;
        let minute = m
            .trim()
            .parse()
            .map_err(|_| ProtocolError::malformed(s, "invalid minute"))?;
        TimeOfDay::new(hour, minute)
    }
}

/// One on/run time pair of the robot's automatic-run table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub index: usize,
    pub on_hour: Option<i32>,
    pub on_minute: Option<i32>,
    pub run_hour: Option<i32>,
    pub run_minute: Option<i32>,
    pub state: ChainState,
}

impl ScheduleEntry {
    /// A freshly announced entry with nothing fetched yet.
    pub fn pending(index: usize) -> Self {
        ScheduleEntry {
            index,
            on_hour: None,
            on_minute: None,
            run_hour: None,
            run_minute: None,
            state: ChainState::AwaitingOnHour,
        }
    }

    /// Whether all four fields have been fetched.
    pub fn is_complete(&self) -> bool {
        self.state == ChainState::Complete
    }

    /// Current value of a field.
    pub fn field(&self, field: ScheduleField) -> Option<i32> {
        match field {
            ScheduleField::OnHour => self.on_hour,
            ScheduleField::OnMinute => self.on_minute,
            ScheduleField::RunHour => self.run_hour,
            ScheduleField::RunMinute => self.run_minute,
        }
    }

    fn slot(&mut self, field: ScheduleField) -> &mut Option<i32> {
        match field {
            ScheduleField::OnHour => &mut self.on_hour,
            ScheduleField::OnMinute => &mut self.on_minute,
            ScheduleField::RunHour => &mut self.run_hour,
            ScheduleField::RunMinute => &mut self.run_minute,
        }
    }

    /// Human-readable summary, e.g. `starting at 8:30 for 1:15`.
    pub fn describe(&self) -> String {
        fn show(v: Option<i32>) -> String {
            v.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
        }
        format!(
            "starting at {}:{} for {}:{}",
            show(self.on_hour),
            show(self.on_minute),
            show(self.run_hour),
            show(self.run_minute)
        )
    }
}

/// Indices affected by a change of the entry count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resize {
    /// New pending entries, ascending.
    pub added: Vec<usize>,
    /// Dropped entries, highest index first.
    pub removed: Vec<usize>,
}

/// Ordered, dense table of schedule entries.
#[derive(Debug, Clone, Default)]
pub struct ScheduleTable {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ScheduleEntry> {
        self.entries.get(index)
    }

    /// Whether every entry has finished its fetch chain.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(ScheduleEntry::is_complete)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Grow or shrink the table to `count` entries.
    ///
    /// New entries start pending; the caller fetches their first field.
    pub fn resize(&mut self, count: usize) -> Resize {
        let old = self.entries.len();
        let mut resize = Resize::default();
        if count < old {
            resize.removed = (count..old).rev().collect();
            self.entries.truncate(count);
        } else {
            resize.added = (old..count).collect();
            self.entries.extend((old..count).map(ScheduleEntry::pending));
        }
        resize
    }

    /// Store a field value reported for entry `index`.
    ///
    /// Returns the address to fetch next. A report the chain is waiting for
    /// moves it forward and reads the following field. A report for a field
    /// the chain has already passed is an update (for instance the echo of
    /// an edit): updates of the on minute and run hour still read the
    /// following field, so an edited entry is confirmed end to end, while an
    /// updated on hour reads nothing unless `legacy_refetch` asks for the
    /// phone app's behaviour.
    pub fn apply(
        &mut self,
        index: usize,
        field: ScheduleField,
        value: i32,
        legacy_refetch: bool,
    ) -> ProtocolResult<Option<Address>> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(ProtocolError::IndexOutOfRange { index, len })?;

        *entry.slot(field) = Some(value);

        let advances = entry.state.expects(field);
        if advances {
            entry.state = entry.state.advance();
        }

        if advances || legacy_refetch || field != ScheduleField::OnHour {
            Ok(field.next().and_then(|next| next.address(index)))
        } else {
            Ok(None)
        }
    }
}

/// Command line asking the robot to grow the table by one entry.
pub fn add_timing_command(count: usize) -> String {
    encode_set(Register::TimeCount, count + 1)
}

/// Command line asking the robot to drop the last entry, if there is one.
pub fn remove_timing_command(count: usize) -> Option<String> {
    count
        .checked_sub(1)
        .map(|n| encode_set(Register::TimeCount, n))
}

/// The four register writes that store a new on/run pair for entry `index`.
pub fn edit_timing_commands(
    index: usize,
    on: TimeOfDay,
    run: TimeOfDay,
) -> ProtocolResult<[String; 4]> {
    let set = |field: ScheduleField, value: u32| {
        field
            .address(index)
            .map(|addr| encode_set(addr, value))
            .ok_or(ProtocolError::IndexOutOfRange {
                index,
                len: MAX_SCHEDULE_ENTRIES,
            })
    };
    Ok([
        set(ScheduleField::OnHour, on.hour)?,
        set(ScheduleField::OnMinute, on.minute)?,
        set(ScheduleField::RunHour, run.hour)?,
        set(ScheduleField::RunMinute, run.minute)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_walk() {
        let mut state = ChainState::AwaitingOnHour;
        for field in ScheduleField::ALL {
            assert!(state.expects(field));
            state = state.advance();
        }
        assert_eq!(state, ChainState::Complete);
        assert_eq!(state.expected(), None);
    }

    #[test]
    fn test_resize_grow_and_shrink() {
        let mut table = ScheduleTable::new();
        let grow = table.resize(3);
        assert_eq!(grow.added, vec![0, 1, 2]);
        assert!(grow.removed.is_empty());

        let shrink = table.resize(1);
        assert_eq!(shrink.removed, vec![2, 1]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].index, 0);
    }

    #[test]
    fn test_full_chain() {
        let mut table = ScheduleTable::new();
        table.resize(2);

        assert_eq!(table.apply(1, ScheduleField::OnHour, 8, false), Ok(Some(Address(16))));
        assert_eq!(table.apply(1, ScheduleField::OnMinute, 30, false), Ok(Some(Address(17))));
        assert_eq!(table.apply(1, ScheduleField::RunHour, 1, false), Ok(Some(Address(18))));
        assert_eq!(table.apply(1, ScheduleField::RunMinute, 15, false), Ok(None));

        let entry = table.get(1).unwrap();
        assert!(entry.is_complete());
        assert_eq!(entry.describe(), "starting at 8:30 for 1:15");
        assert!(!table.is_complete());
    }

    #[test]
    fn test_update_after_complete() {
        let mut table = ScheduleTable::new();
        table.resize(1);
        for (field, value) in ScheduleField::ALL.into_iter().zip([8, 0, 1, 0]) {
            table.apply(0, field, value, false).unwrap();
        }

        assert_eq!(table.apply(0, ScheduleField::OnHour, 9, false), Ok(None));
        assert_eq!(table.get(0).unwrap().on_hour, Some(9));

        // Later fields are re-read after an update, as after an edit.
        assert_eq!(table.apply(0, ScheduleField::OnMinute, 15, false), Ok(Some(Address(13))));
        assert_eq!(table.apply(0, ScheduleField::RunHour, 2, false), Ok(Some(Address(14))));
        assert_eq!(table.apply(0, ScheduleField::RunMinute, 5, false), Ok(None));
        assert!(table.get(0).unwrap().is_complete());

        assert_eq!(table.apply(0, ScheduleField::OnHour, 10, true), Ok(Some(Address(12))));
        assert_eq!(table.apply(0, ScheduleField::RunMinute, 5, true), Ok(None));
    }

    #[test]
    fn test_out_of_range() {
        let mut table = ScheduleTable::new();
        table.resize(1);
        assert_eq!(
            table.apply(3, ScheduleField::OnMinute, 1, false),
            Err(ProtocolError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert_eq!(table.get(0), Some(&ScheduleEntry::pending(0)));
    }

    #[test]
    fn test_timing_commands() {
        assert_eq!(add_timing_command(2), "c10;3;");
        assert_eq!(remove_timing_command(2), Some("c10;1;".to_string()));
        assert_eq!(remove_timing_command(0), None);

        let on = TimeOfDay::new(7, 45).unwrap();
        let run = TimeOfDay::new(0, 50).unwrap();
        assert_eq!(
            edit_timing_commands(1, on, run),
            Ok(["c15;7;", "c16;45;", "c17;0;", "c18;50;"].map(String::from))
        );
        assert_eq!(
            edit_timing_commands(MAX_SCHEDULE_ENTRIES, on, run),
            Err(ProtocolError::IndexOutOfRange {
                index: MAX_SCHEDULE_ENTRIES,
                len: MAX_SCHEDULE_ENTRIES
            })
        );
    }

    #[test]
    fn test_time_parse() {
        assert_eq!(TimeOfDay::parse("08:30"), Ok(TimeOfDay { hour: 8, minute: 30 }));
        assert_eq!(
            TimeOfDay::parse("24:00"),
            Err(ProtocolError::InvalidTime { hour: 24, minute: 0 })
        );
        assert!(TimeOfDay::parse("noon").is_err());
    }
}
