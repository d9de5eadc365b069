//! Local mirror of the robot's configuration registers.
//!
//! The store never talks to the link itself. Applying a report returns the
//! follow-up reads to send and the changes a presentation layer may want to
//! react to; the [`Session`](crate::Session) does the sending.

use std::collections::BTreeMap;

use serde::Serialize;
use stofzuiger_protocol::{
    Command, ConfigEvent, FirmwareVariant, ProtocolError, ProtocolResult, Register, RegisterKind,
    ScheduleField, MAX_SCHEDULE_ENTRIES,
};
use tracing::{debug, trace};

use crate::schedule::{ScheduleEntry, ScheduleTable};

/// A change to the store, for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// A scalar register was reported.
    RegisterChanged { register: Register, value: i32 },
    /// A pending schedule entry was created.
    EntryAdded { index: usize },
    /// A schedule entry field was reported.
    EntryChanged { index: usize, field: ScheduleField },
    /// A schedule entry was dropped.
    EntryRemoved { index: usize },
    /// Everything was forgotten (disconnect or reconnect).
    Cleared,
}

/// Result of applying one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Reads to send next, in order.
    pub requests: Vec<Command>,
    /// What changed.
    pub changes: Vec<StoreChange>,
}

/// Last-known state of the robot's configuration.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    variant: FirmwareVariant,
    legacy_refetch: bool,
    registers: BTreeMap<Register, i32>,
    time_count: usize,
    schedule: ScheduleTable,
}

impl ConfigStore {
    /// Create an empty store.
    pub fn new(variant: FirmwareVariant, legacy_refetch: bool) -> Self {
        ConfigStore {
            variant,
            legacy_refetch,
            registers: BTreeMap::new(),
            time_count: 0,
            schedule: ScheduleTable::new(),
        }
    }

    pub fn variant(&self) -> FirmwareVariant {
        self.variant
    }

    /// Apply a decoded `[CFG]` report.
    ///
    /// Out-of-range schedule reports, and a TIME_COUNT beyond
    /// [`MAX_SCHEDULE_ENTRIES`], fail and leave the store untouched. Reports for addresses the firmware variant does not use are ignored.
    pub fn apply_event(&mut self, event: ConfigEvent) -> ProtocolResult<Applied> {
        let mut applied = Applied::default();

        if let Some(register) = Register::from_address(event.address, self.variant) {
            if register == Register::TimeCount {
                self.apply_time_count(event.value, &mut applied)?;
            } else {
                trace!("register {} = {}", register, event.value);
                self.registers.insert(register, event.value);
                applied.changes.push(StoreChange::RegisterChanged {
                    register,
                    value: event.value,
                });
            }
        } else if let Some((index, field)) = ScheduleField::from_address(event.address) {
            let next = self
                .schedule
                .apply(index, field, event.value, self.legacy_refetch)?;
            applied.changes.push(StoreChange::EntryChanged { index, field });
            if let Some(addr) = next {
                applied.requests.push(Command::get(addr));
            }
        } else {
            trace!("ignoring report for unused address {}", event.address);
        }

        Ok(applied)
    }

    fn apply_time_count(&mut self, value: i32, applied: &mut Applied) -> ProtocolResult<()> {
        let count = usize::try_from(value).unwrap_or(0);
        if count > MAX_SCHEDULE_ENTRIES {
            return Err(ProtocolError::TooManyEntries {
                count: value,
                max: MAX_SCHEDULE_ENTRIES,
            });
        }
        self.registers.insert(Register::TimeCount, value);

        if count != self.time_count {
            debug!("schedule count {} -> {}", self.time_count, count);
        }

        let resize = self.schedule.resize(count);
        applied
            .changes
            .extend(resize.removed.iter().map(|&index| StoreChange::EntryRemoved { index }));
        for index in resize.added {
            applied.changes.push(StoreChange::EntryAdded { index });
            if let Some(addr) = ScheduleField::OnHour.address(index) {
                applied.requests.push(Command::get(addr));
            }
        }
        self.time_count = count;
        Ok(())
    }

    /// Forget everything.
    pub fn reset(&mut self) -> StoreChange {
        self.registers.clear();
        self.schedule.clear();
        self.time_count = 0;
        StoreChange::Cleared
    }

    /// Last reported value of a register.
    pub fn value(&self, register: Register) -> Option<i32> {
        self.registers.get(&register).copied()
    }

    /// Last reported value of a flag register as a boolean.
    pub fn flag(&self, register: Register) -> Option<bool> {
        self.value(register).map(|v| v != 0)
    }

    /// Whether the register has been reported since connecting.
    pub fn is_known(&self, register: Register) -> bool {
        self.registers.contains_key(&register)
    }

    /// Number of schedule entries the robot last announced.
    pub fn time_count(&self) -> usize {
        self.time_count
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        self.schedule.entries()
    }

    pub fn entry(&self, index: usize) -> Option<&ScheduleEntry> {
        self.schedule.get(index)
    }

    /// Whether every register is known and every entry fully fetched.
    pub fn is_synchronized(&self) -> bool {
        Register::scalars(self.variant).all(|r| self.is_known(r))
            && self.is_known(Register::TimeCount)
            && self.schedule.is_complete()
    }

    /// Serializable view of the store.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            registers: Register::scalars(self.variant)
                .map(|register| RegisterSnapshot {
                    name: register.as_str(),
                    address: register.address().0,
                    flag: register.kind() == RegisterKind::Flag,
                    value: self.value(register),
                })
                .collect(),
            time_count: self.time_count,
            schedule: self.schedule.entries().to_vec(),
            synchronized: self.is_synchronized(),
        }
    }
}

/// One register in a [`StoreSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct RegisterSnapshot {
    pub name: &'static str,
    pub address: u16,
    pub flag: bool,
    pub value: Option<i32>,
}

/// Serializable copy of the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub registers: Vec<RegisterSnapshot>,
    pub time_count: usize,
    pub schedule: Vec<ScheduleEntry>,
    pub synchronized: bool,
}
