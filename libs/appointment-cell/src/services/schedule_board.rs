use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};

use doctor_cell::models::DoctorSchedule;
use doctor_cell::services::calendar::ScheduleCalendar;

use crate::models::{AppointmentFilter, BookingCapacity, StoreError};
use crate::services::availability::count_in_window;
use crate::services::store::AppointmentStore;

/// A weekly schedule resolved to its next date, with how full that date is.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleBoardEntry {
    pub schedule: DoctorSchedule,
    pub date: NaiveDate,
    pub capacity: BookingCapacity,
}

impl ScheduleBoardEntry {
    pub fn is_open(&self) -> bool {
        !self.capacity.is_full()
    }
}

/// Loads every schedule and counts bookings on its next occurrence.
///
/// Counts are fetched concurrently; a failed count reads as zero.
#[instrument(skip(store, calendar), fields(today = %calendar.today()))]
pub async fn load_schedule_board(
    store: &dyn AppointmentStore,
    calendar: &ScheduleCalendar,
) -> Result<Vec<ScheduleBoardEntry>, StoreError> {
    let schedules = store.list_doctor_schedules().await?;

    let entries = join_all(schedules.into_iter().map(|schedule| async move {
        let date = calendar.next_occurrence(&schedule);
        let booked = match store
            .list_appointments(&AppointmentFilter::for_doctor_on(schedule.doctor_id.clone(), date))
            .await
        {
            Ok(appointments) => count_in_window(&schedule, date, &appointments),
            Err(e) => {
                warn!("Could not count bookings for schedule {}: {}", schedule.id, e);
                0
            }
        };

        ScheduleBoardEntry {
            capacity: BookingCapacity {
                max_patients: schedule.capacity_limit(),
                booked,
            },
            schedule,
            date,
        }
    }))
    .await;

    info!("Loaded schedule board with {} schedules", entries.len());
    Ok(entries)
}
