use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Granularity every bookable time must align to.
///
/// Older parts of the hospital front end call this the "15 minute" interval;
/// the grid actually enforced everywhere is 10 minutes.
pub const SLOT_STEP_MINUTES: u16 = 10;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

const WIRE_TIME_PATTERN: &str = r"^([01][0-9]|2[0-3]):[0-5][0-9]$";

fn wire_time_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(WIRE_TIME_PATTERN).expect("wire time pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time {0:?}, expected zero-padded 24-hour HH:MM")]
pub struct TimeParseError(pub String);

/// Wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { minutes: 0 };

    /// Const constructor for fixed, known-good times.
    pub const fn at(hour: u8, minute: u8) -> Self {
        assert!(hour < 24 && minute < 60, "time of day out of range");
        Self { minutes: hour as u16 * 60 + minute as u16 }
    }

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { minutes: hour as u16 * 60 + minute as u16 })
    }

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self { minutes })
    }

    /// Strict parse of the wire format; `"8:00"` and `"08:00:00"` are rejected.
    pub fn parse(value: &str) -> Result<Self, TimeParseError> {
        if !wire_time_regex().is_match(value) {
            return Err(TimeParseError(value.to_string()));
        }
        let (hour, minute) = value
            .split_once(':')
            .ok_or_else(|| TimeParseError(value.to_string()))?;
        let hour: u8 = hour.parse().map_err(|_| TimeParseError(value.to_string()))?;
        let minute: u8 = minute.parse().map_err(|_| TimeParseError(value.to_string()))?;
        Self::new(hour, minute).ok_or_else(|| TimeParseError(value.to_string()))
    }

    /// True when `value` is shaped like a wire time, without checking the grid.
    pub fn is_wire_format(value: &str) -> bool {
        wire_time_regex().is_match(value)
    }

    pub fn hour(&self) -> u8 {
        (self.minutes / 60) as u8
    }

    pub fn minute(&self) -> u8 {
        (self.minutes % 60) as u8
    }

    pub fn minutes_since_midnight(&self) -> u16 {
        self.minutes
    }

    pub fn is_on_grid(&self, step_minutes: u16) -> bool {
        step_minutes != 0 && self.minute() as u16 % step_minutes == 0
    }

    pub fn checked_add_minutes(&self, minutes: u16) -> Option<Self> {
        self.minutes.checked_add(minutes).and_then(Self::from_minutes)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
