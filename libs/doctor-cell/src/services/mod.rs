pub mod calendar;

pub use calendar::{next_date_for_weekday, resolve_schedule_date, ScheduleCalendar};
