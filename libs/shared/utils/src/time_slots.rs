//! Slot generation and grid normalisation for bookable times.

use tracing::debug;

use shared_models::time::{TimeOfDay, SLOT_STEP_MINUTES};

/// Opening of the default booking window when a schedule gives none.
pub const DEFAULT_WINDOW_START: TimeOfDay = TimeOfDay::at(8, 0);
/// Closing ("last departure") of the default booking window.
pub const DEFAULT_WINDOW_END: TimeOfDay = TimeOfDay::at(18, 0);
/// Value `quantize` falls back to for malformed input.
pub const FALLBACK_TIME: TimeOfDay = TimeOfDay::at(8, 0);

/// Ordered, restartable sequence of slot start times.
///
/// Starts at the window opening and stops strictly before the window end:
/// the end is when the doctor leaves, not a bookable start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlots {
    next: u16,
    end: u16,
    step: u16,
}

impl TimeSlots {
    pub fn step_minutes(&self) -> u16 {
        self.step
    }

    fn remaining(&self) -> usize {
        if self.step == 0 || self.next >= self.end {
            return 0;
        }
        let span = self.end - self.next;
        span.div_ceil(self.step) as usize
    }
}

impl Iterator for TimeSlots {
    type Item = TimeOfDay;

    fn next(&mut self) -> Option<TimeOfDay> {
        if self.remaining() == 0 {
            return None;
        }
        let slot = TimeOfDay::from_minutes(self.next)?;
        self.next = self.next.saturating_add(self.step);
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TimeSlots {}

/// Enumerates slots in `[start, end)` every `step_minutes`.
///
/// Empty when `start >= end` or when the step is zero.
pub fn generate_slots(start: TimeOfDay, end: TimeOfDay, step_minutes: u16) -> TimeSlots {
    TimeSlots {
        next: start.minutes_since_midnight(),
        end: end.minutes_since_midnight(),
        step: step_minutes,
    }
}

/// Slots on the standard booking grid.
pub fn generate_grid_slots(start: TimeOfDay, end: TimeOfDay) -> TimeSlots {
    generate_slots(start, end, SLOT_STEP_MINUTES)
}

/// String front door used by request handlers: missing or malformed bounds
/// fall back to the default 08:00-18:00 window.
pub fn generate_slots_str(start: Option<&str>, end: Option<&str>) -> TimeSlots {
    let start = parse_or(start, DEFAULT_WINDOW_START);
    let end = parse_or(end, DEFAULT_WINDOW_END);
    generate_grid_slots(start, end)
}

fn parse_or(value: Option<&str>, default: TimeOfDay) -> TimeOfDay {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => TimeOfDay::parse(raw).unwrap_or_else(|_| {
            debug!("Ignoring malformed window bound {:?}, using {}", raw, default);
            default
        }),
        None => default,
    }
}

/// True iff `time` is a well-formed `HH:MM` value sitting on the 10 minute grid.
pub fn is_quantized(time: &str) -> bool {
    TimeOfDay::parse(time)
        .map(|parsed| parsed.is_on_grid(SLOT_STEP_MINUTES))
        .unwrap_or(false)
}

/// Rounds `time` to the nearest grid value, half up.
///
/// Malformed input yields 08:00. Rounding past 23:59 clamps to the last
/// slot of the day instead of wrapping to tomorrow.
pub fn quantize(time: &str) -> TimeOfDay {
    match TimeOfDay::parse(time) {
        Ok(parsed) => quantize_time(parsed),
        Err(_) => FALLBACK_TIME,
    }
}

pub fn quantize_time(time: TimeOfDay) -> TimeOfDay {
    round_to_step(time, SLOT_STEP_MINUTES)
}

fn round_to_step(time: TimeOfDay, step: u16) -> TimeOfDay {
    let minute = time.minute() as u16;
    let rounded = (2 * minute + step) / (2 * step) * step;

    let (hour, minute) = if rounded >= 60 {
        (time.hour() as u16 + 1, 0)
    } else {
        (time.hour() as u16, rounded)
    };

    if hour >= 24 {
        return TimeOfDay::at(23, (60 - step) as u8);
    }
    TimeOfDay::at(hour as u8, minute as u8)
}
