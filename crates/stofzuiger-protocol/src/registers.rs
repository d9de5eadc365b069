//! Register address map of the robot firmware.
//!
//! Addresses 0..=10 are scalar registers. From address 11 on, the schedule
//! table is laid out with a fixed stride of four registers per entry:
//!
//! ```text
//! 11 + 4k  on hour
//! 12 + 4k  on minute
//! 13 + 4k  run hour
//! 14 + 4k  run minute
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of the first schedule register (on-hour of entry 0).
pub const TIME_ON_HRS: u16 = 11;
/// Number of registers per schedule entry.
pub const SCHEDULE_STRIDE: u16 = 4;
/// Largest schedule whose every register still has a 16-bit address.
pub const MAX_SCHEDULE_ENTRIES: usize =
    ((u16::MAX - TIME_ON_HRS - (SCHEDULE_STRIDE - 1)) / SCHEDULE_STRIDE) as usize + 1;

/// A configuration register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u16);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Address {
    fn from(addr: u16) -> Self {
        Address(addr)
    }
}

impl From<Register> for Address {
    fn from(reg: Register) -> Self {
        reg.address()
    }
}

/// Which generation of the firmware is on the other end.
///
/// The first robot had cliff sensors and bumpers on addresses 2 and 3.
/// The second iteration dropped them and leaves those addresses unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareVariant {
    /// Second iteration: addresses 2 and 3 are unused.
    #[default]
    Current,
    /// First iteration: addresses 2 and 3 are the cliff and bumper checks.
    Extended,
}

/// How the value of a scalar register should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// Boolean stored as 0/1.
    Flag,
    /// Plain integer magnitude.
    Magnitude,
}

/// Named scalar registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Register {
    FanOn,
    CheckStuck,
    CheckKliff,
    CheckBumpers,
    StuckRange,
    BackwardsMin,
    BackwardsRotMin,
    LeftSpeed,
    RightSpeed,
    Auto,
    TimeCount,
}

impl Register {
    /// Every named register, in address order.
    pub const ALL: [Register; 11] = [
        Register::FanOn,
        Register::CheckStuck,
        Register::CheckKliff,
        Register::CheckBumpers,
        Register::StuckRange,
        Register::BackwardsMin,
        Register::BackwardsRotMin,
        Register::LeftSpeed,
        Register::RightSpeed,
        Register::Auto,
        Register::TimeCount,
    ];

    /// The register's wire address.
    pub fn address(&self) -> Address {
        Address(match self {
            Register::FanOn => 0,
            Register::CheckStuck => 1,
            Register::CheckKliff => 2,
            Register::CheckBumpers => 3,
            Register::StuckRange => 4,
            Register::BackwardsMin => 5,
            Register::BackwardsRotMin => 6,
            Register::LeftSpeed => 7,
            Register::RightSpeed => 8,
            Register::Auto => 9,
            Register::TimeCount => 10,
        })
    }

    /// Look up the register at `addr` for the given firmware variant.
    ///
    /// Returns `None` for schedule addresses and for addresses the variant
    /// does not use.
    pub fn from_address(addr: Address, variant: FirmwareVariant) -> Option<Register> {
        Register::ALL
            .iter()
            .copied()
            .find(|reg| reg.address() == addr)
            .filter(|reg| reg.exists_in(variant))
    }

    /// Whether the register is present in the given firmware variant.
    pub fn exists_in(&self, variant: FirmwareVariant) -> bool {
        match self {
            Register::CheckKliff | Register::CheckBumpers => variant == FirmwareVariant::Extended,
            _ => true,
        }
    }

    /// The scalar registers fetched on connect, in the order the phone
    /// requests them. `TimeCount` is not included; it starts the schedule
    /// sync and is requested last.
    pub fn scalars(variant: FirmwareVariant) -> impl Iterator<Item = Register> {
        Register::ALL
            .into_iter()
            .filter(move |reg| *reg != Register::TimeCount && reg.exists_in(variant))
    }

    /// How the register's value is interpreted.
    pub fn kind(&self) -> RegisterKind {
        match self {
            Register::FanOn
            | Register::CheckStuck
            | Register::CheckKliff
            | Register::CheckBumpers
            | Register::Auto => RegisterKind::Flag,
            _ => RegisterKind::Magnitude,
        }
    }

    /// The kebab-case name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Register::FanOn => "fan-on",
            Register::CheckStuck => "check-stuck",
            Register::CheckKliff => "check-kliff",
            Register::CheckBumpers => "check-bumpers",
            Register::StuckRange => "stuck-range",
            Register::BackwardsMin => "backwards-min",
            Register::BackwardsRotMin => "backwards-rot-min",
            Register::LeftSpeed => "left-speed",
            Register::RightSpeed => "right-speed",
            Register::Auto => "auto",
            Register::TimeCount => "time-count",
        }
    }

    /// Parse a register from its kebab-case name.
    pub fn from_name(s: &str) -> Option<Register> {
        Register::ALL.iter().copied().find(|reg| reg.as_str() == s)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four registers making up a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleField {
    OnHour,
    OnMinute,
    RunHour,
    RunMinute,
}

impl ScheduleField {
    /// Fields in chain order.
    pub const ALL: [ScheduleField; 4] = [
        ScheduleField::OnHour,
        ScheduleField::OnMinute,
        ScheduleField::RunHour,
        ScheduleField::RunMinute,
    ];

    fn offset(&self) -> u16 {
        match self {
            ScheduleField::OnHour => 0,
            ScheduleField::OnMinute => 1,
            ScheduleField::RunHour => 2,
            ScheduleField::RunMinute => 3,
        }
    }

    /// Address of this field for schedule entry `index`.
    ///
    /// Returns `None` for any index at or beyond [`MAX_SCHEDULE_ENTRIES`],
    /// where at least one field of the entry would not fit in 16 bits.
    pub fn address(&self, index: usize) -> Option<Address> {
        if index >= MAX_SCHEDULE_ENTRIES {
            return None;
        }
        let base = TIME_ON_HRS + index as u16 * SCHEDULE_STRIDE;
        Some(Address(base + self.offset()))
    }

    /// Split a schedule address into entry index and field.
    ///
    /// Returns `None` for scalar addresses.
    pub fn from_address(addr: Address) -> Option<(usize, ScheduleField)> {
        let rel = addr.0.checked_sub(TIME_ON_HRS)?;
        let field = ScheduleField::ALL[(rel % SCHEDULE_STRIDE) as usize];
        Some(((rel / SCHEDULE_STRIDE) as usize, field))
    }

    /// The field after this one in the fetch chain, if any.
    pub fn next(&self) -> Option<ScheduleField> {
        match self {
            ScheduleField::OnHour => Some(ScheduleField::OnMinute),
            ScheduleField::OnMinute => Some(ScheduleField::RunHour),
            ScheduleField::RunHour => Some(ScheduleField::RunMinute),
            ScheduleField::RunMinute => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_addresses() {
        assert_eq!(Register::FanOn.address(), Address(0));
        assert_eq!(Register::StuckRange.address(), Address(4));
        assert_eq!(Register::TimeCount.address(), Address(10));
    }

    #[test]
    fn test_variant_hides_cliff_and_bumpers() {
        assert_eq!(Register::from_address(Address(2), FirmwareVariant::Current), None);
        assert_eq!(
            Register::from_address(Address(3), FirmwareVariant::Extended),
            Some(Register::CheckBumpers)
        );
        assert_eq!(Register::scalars(FirmwareVariant::Current).count(), 8);
        assert_eq!(Register::scalars(FirmwareVariant::Extended).count(), 10);
    }

    #[test]
    fn test_schedule_address_split() {
        assert_eq!(ScheduleField::from_address(Address(10)), None);
        assert_eq!(
            ScheduleField::from_address(Address(11)),
            Some((0, ScheduleField::OnHour))
        );
        assert_eq!(
            ScheduleField::from_address(Address(18)),
            Some((1, ScheduleField::RunMinute))
        );
        assert_eq!(ScheduleField::OnHour.address(1), Some(Address(15)));
        assert_eq!(ScheduleField::RunMinute.address(2), Some(Address(22)));
    }

    #[test]
    fn test_schedule_address_limit() {
        let last = MAX_SCHEDULE_ENTRIES - 1;
        assert_eq!(MAX_SCHEDULE_ENTRIES, 16381);
        assert_eq!(ScheduleField::OnHour.address(last), Some(Address(65531)));
        assert_eq!(ScheduleField::RunMinute.address(last), Some(Address(65534)));
        assert_eq!(
            ScheduleField::from_address(Address(65534)),
            Some((last, ScheduleField::RunMinute))
        );

        // Only the on-hour of entry 16381 would still fit; the entry as a
        // whole does not.
        for field in ScheduleField::ALL {
            assert_eq!(field.address(MAX_SCHEDULE_ENTRIES), None);
        }
        assert_eq!(ScheduleField::OnHour.address(16384), None);
        assert_eq!(ScheduleField::OnHour.address(2_000_000_000), None);
    }

    #[test]
    fn test_register_names() {
        for reg in Register::ALL {
            assert_eq!(Register::from_name(reg.as_str()), Some(reg));
        }
        assert_eq!(Register::from_name("turbo"), None);
    }
}
