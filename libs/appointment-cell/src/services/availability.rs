use std::collections::BTreeSet;

use chrono::NaiveDate;

use doctor_cell::models::DoctorSchedule;
use shared_models::time::TimeOfDay;

use crate::models::{Appointment, AppointmentFilter, AvailabilityMap, BookingCapacity};

/// The doctor and date whose bookings matter, optionally ignoring the
/// appointment currently being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotScope {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub exclude_appointment_id: Option<String>,
}

impl SlotScope {
    pub fn new(doctor_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            doctor_id: doctor_id.into(),
            date,
            exclude_appointment_id: None,
        }
    }

    pub fn excluding(mut self, appointment_id: impl Into<String>) -> Self {
        self.exclude_appointment_id = Some(appointment_id.into());
        self
    }

    pub fn filter(&self) -> AppointmentFilter {
        AppointmentFilter::for_doctor_on(self.doctor_id.clone(), self.date)
    }

    pub fn is_excluded(&self, appointment: &Appointment) -> bool {
        self.exclude_appointment_id.as_deref() == Some(appointment.id.as_str())
    }

    /// The time `appointment` holds within this scope, if any.
    pub fn occupied_time(&self, appointment: &Appointment) -> Option<TimeOfDay> {
        if appointment.doctor_id != self.doctor_id
            || appointment.appointment_date != self.date
            || !appointment.is_active()
            || self.is_excluded(appointment)
        {
            return None;
        }
        appointment.appointment_time
    }

    fn occupied_times(&self, appointments: &[Appointment]) -> BTreeSet<TimeOfDay> {
        appointments.iter().filter_map(|a| self.occupied_time(a)).collect()
    }
}

/// Marks every slot free or booked. Booked times outside `slots` are recorded too.
pub fn compute_availability<I>(scope: &SlotScope, slots: I, appointments: &[Appointment]) -> AvailabilityMap
where
    I: IntoIterator<Item = TimeOfDay>,
{
    let occupied = scope.occupied_times(appointments);
    let mut availability = AvailabilityMap::new();

    for slot in slots {
        availability.insert(slot, !occupied.contains(&slot));
    }
    for time in occupied {
        availability.insert(time, false);
    }

    availability
}

pub fn is_slot_free(scope: &SlotScope, time: TimeOfDay, appointments: &[Appointment]) -> bool {
    !appointments.iter().any(|a| scope.occupied_time(a) == Some(time))
}

/// Active bookings of the schedule's doctor on `date` between its start and end, both inclusive.
pub fn count_in_window(schedule: &DoctorSchedule, date: NaiveDate, appointments: &[Appointment]) -> u32 {
    let scope = SlotScope::new(schedule.doctor_id.clone(), date);
    let count = appointments
        .iter()
        .filter_map(|a| scope.occupied_time(a))
        .filter(|time| schedule.start_time <= *time && *time <= schedule.end_time)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

pub fn booking_capacity(schedule: &DoctorSchedule, date: NaiveDate, appointments: &[Appointment]) -> BookingCapacity {
    BookingCapacity {
        max_patients: schedule.capacity_limit(),
        booked: count_in_window(schedule, date, appointments),
    }
}
