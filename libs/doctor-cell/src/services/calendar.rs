use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use tracing::debug;

use shared_utils::clock::{Clock, SystemClock};

use crate::models::{DayOfWeek, DoctorSchedule};

/// Next date strictly after `today` that falls on `day`.
///
/// The result always lies in `(today, today + 7]`: a schedule for today's
/// weekday resolves to the same weekday next week.
pub fn next_date_for_weekday(day: DayOfWeek, today: NaiveDate) -> NaiveDate {
    let current = today.weekday().num_days_from_sunday();
    let target = day.days_from_sunday();
    let mut ahead = (target + 7 - current) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    today + Days::new(u64::from(ahead))
}

pub fn resolve_schedule_date(schedule: &DoctorSchedule, today: NaiveDate) -> NaiveDate {
    next_date_for_weekday(schedule.day_of_week, today)
}

/// Resolves weekly schedules against the current local date.
#[derive(Clone)]
pub struct ScheduleCalendar {
    clock: Arc<dyn Clock>,
}

impl Default for ScheduleCalendar {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ScheduleCalendar {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn next_occurrence(&self, schedule: &DoctorSchedule) -> NaiveDate {
        let today = self.today();
        let date = resolve_schedule_date(schedule, today);
        debug!(
            "Schedule {} ({}) resolves to {} from {}",
            schedule.id, schedule.day_of_week, date, today
        );
        date
    }
}
