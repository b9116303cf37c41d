use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use shared_database::ApiError;
use shared_models::time::{TimeOfDay, SLOT_STEP_MINUTES};
use shared_models::wire::{
    deserialize_calendar_date, deserialize_lenient_time, deserialize_optional_reference, deserialize_reference,
};

/// Long date used in user-facing messages, e.g. `Monday, October 19, 2026`.
pub const LONG_DATE_FORMAT: &str = "%A, %B %-d, %Y";

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_reference")]
    pub patient_id: String,
    #[serde(deserialize_with = "deserialize_reference")]
    pub doctor_id: String,
    #[serde(default, deserialize_with = "deserialize_optional_reference")]
    pub department_id: Option<String>,
    #[serde(deserialize_with = "deserialize_calendar_date")]
    pub appointment_date: NaiveDate,
    /// `None` when the stored time is missing or not `HH:MM`; such records never hold a slot.
    #[serde(default, deserialize_with = "deserialize_lenient_time")]
    pub appointment_time: Option<TimeOfDay>,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn from_draft(id: impl Into<String>, draft: &AppointmentDraft) -> Self {
        Self {
            id: id.into(),
            patient_id: draft.patient_id.clone(),
            doctor_id: draft.doctor_id.clone(),
            department_id: Some(draft.department_id.clone()),
            appointment_date: draft.appointment_date,
            appointment_time: Some(draft.appointment_time),
            reason: draft.reason.clone(),
            status: draft.status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    #[serde(rename = "no-show", alias = "no_show")]
    NoShow,
}

impl AppointmentStatus {
    /// Only scheduled and confirmed appointments occupy a slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create/update payload sent to the hospital API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentDraft {
    pub patient_id: String,
    pub doctor_id: String,
    pub department_id: String,
    #[serde(serialize_with = "serialize_midnight_utc")]
    pub appointment_date: NaiveDate,
    pub appointment_time: TimeOfDay,
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn serialize_midnight_utc<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{}T00:00:00.000Z", date.format("%Y-%m-%d")))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub doctor_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub patient_id: Option<String>,
}

impl AppointmentFilter {
    pub fn for_doctor_on(doctor_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            doctor_id: Some(doctor_id.into()),
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(doctor_id) = &self.doctor_id {
            query.push(("doctor_id", doctor_id.clone()));
        }
        if let Some(date) = self.date {
            query.push(("date", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.to_string()));
        }
        if let Some(patient_id) = &self.patient_id {
            query.push(("patient_id", patient_id.clone()));
        }
        query
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.as_ref().map_or(true, |id| *id == appointment.doctor_id)
            && self.date.map_or(true, |date| date == appointment.appointment_date)
            && self.status.map_or(true, |status| status == appointment.status)
            && self.patient_id.as_ref().map_or(true, |id| *id == appointment.patient_id)
    }
}

/// Booking form as submitted; every field is checked before anything is sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingRequest {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub department_id: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub reason: Option<String>,
    /// Set when booking against a doctor's weekly schedule.
    pub schedule_id: Option<String>,
    /// Ignored on create. On reschedule, `None` keeps the stored status.
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub patient_id: Option<String>,
}

impl PatientSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// Free/booked state of the times of one doctor on one date.
///
/// `true` = free, `false` = booked, absent = not checked.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AvailabilityMap {
    times: BTreeMap<TimeOfDay, bool>,
}

impl AvailabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, time: TimeOfDay, free: bool) {
        self.times.insert(time, free);
    }

    pub fn get(&self, time: TimeOfDay) -> Option<bool> {
        self.times.get(&time).copied()
    }

    pub fn is_booked(&self, time: TimeOfDay) -> bool {
        self.get(time) == Some(false)
    }

    pub fn booked_times(&self) -> Vec<TimeOfDay> {
        self.times.iter().filter(|(_, free)| !**free).map(|(time, _)| *time).collect()
    }

    pub fn free_times(&self) -> Vec<TimeOfDay> {
        self.times.iter().filter(|(_, free)| **free).map(|(time, _)| *time).collect()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimeOfDay, bool)> + '_ {
        self.times.iter().map(|(time, free)| (*time, *free))
    }

    /// Times a picker should offer: booked slots are dropped, unknown ones kept,
    /// and the current selection stays visible unless it is booked or off-grid.
    pub fn selectable<I>(&self, slots: I, selected: Option<TimeOfDay>) -> Vec<TimeOfDay>
    where
        I: IntoIterator<Item = TimeOfDay>,
    {
        let mut offered: Vec<TimeOfDay> = slots.into_iter().filter(|time| !self.is_booked(*time)).collect();

        if let Some(selected) = selected {
            if selected.is_on_grid(SLOT_STEP_MINUTES) && !self.is_booked(selected) {
                if let Err(position) = offered.binary_search(&selected) {
                    offered.insert(position, selected);
                }
            }
        }

        offered
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingCapacity {
    pub max_patients: Option<u32>,
    pub booked: u32,
}

impl BookingCapacity {
    pub fn unlimited(booked: u32) -> Self {
        Self { max_patients: None, booked }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.max_patients.map(|max| max.saturating_sub(self.booked))
    }

    pub fn is_full(&self) -> bool {
        self.max_patients.map_or(false, |max| self.booked >= max)
    }

    pub fn with_one_more(&self) -> Self {
        Self {
            booked: self.booked + 1,
            ..*self
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Backend verdicts, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Hospital API unavailable: {0}")]
    Unavailable(String),
}

impl From<ApiError> for StoreError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Validation(message) => StoreError::Validation(message),
            ApiError::Conflict(message) => StoreError::Conflict(message),
            ApiError::NotFound(message) => StoreError::NotFound(message),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field} format: {value:?}, expected {expected}")]
pub struct FormatError {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Appointment time {time} is not on the {step}-minute grid, nearest slot is {suggested}")]
pub struct QuantizationError {
    pub time: TimeOfDay,
    pub suggested: TimeOfDay,
    pub step: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "This time slot ({time}) has already been booked on {}. Please select a different time.",
    .date.format(LONG_DATE_FORMAT)
)]
pub struct ConflictError {
    pub date: NaiveDate,
    pub time: TimeOfDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Schedule {schedule_id} is fully booked on {date} ({booked}/{max_patients} patients)")]
pub struct CapacityError {
    pub schedule_id: String,
    pub date: NaiveDate,
    pub max_patients: u32,
    pub booked: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Appointment date {0} is in the past")]
    PastDate(NaiveDate),

    #[error(transparent)]
    Quantization(#[from] QuantizationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("Outside schedule {schedule_id}: {reason}")]
    OutsideSchedule { schedule_id: String, reason: String },

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingErrorKind {
    Validation,
    Conflict,
    Capacity,
    NotFound,
    Unavailable,
}

impl BookingError {
    pub fn kind(&self) -> BookingErrorKind {
        match self {
            BookingError::MissingField(_)
            | BookingError::Format(_)
            | BookingError::PastDate(_)
            | BookingError::Quantization(_)
            | BookingError::OutsideSchedule { .. }
            | BookingError::Store(StoreError::Validation(_)) => BookingErrorKind::Validation,
            BookingError::Conflict(_) | BookingError::Store(StoreError::Conflict(_)) => BookingErrorKind::Conflict,
            BookingError::Capacity(_) => BookingErrorKind::Capacity,
            BookingError::NotFound(_) | BookingError::Store(StoreError::NotFound(_)) => BookingErrorKind::NotFound,
            BookingError::Store(StoreError::Unavailable(_)) => BookingErrorKind::Unavailable,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Failed to look up notification data: {0}")]
    Lookup(#[from] StoreError),

    #[error("Doctor {0} has no user account to notify")]
    MissingRecipient(String),

    #[error("Failed to deliver notification: {0}")]
    Delivery(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_appointment_from_backend_payload() {
        let appointment: Appointment = serde_json::from_value(json!({
            "_id": "appt-1",
            "patient_id": { "_id": "pat-1", "first_name": "Ada" },
            "doctor_id": "doc-1",
            "department_id": { "_id": "dept-1" },
            "appointment_date": "2026-10-19T00:00:00.000Z",
            "appointment_time": "08:10",
            "status": "no-show"
        }))
        .unwrap();

        assert_eq!(appointment.patient_id, "pat-1");
        assert_eq!(appointment.department_id.as_deref(), Some("dept-1"));
        assert_eq!(appointment.appointment_time, TimeOfDay::new(8, 10));
        assert_eq!(appointment.status, AppointmentStatus::NoShow);
        assert!(!appointment.is_active());
    }

    #[test]
    fn test_draft_serialization() {
        let draft = AppointmentDraft {
            patient_id: "pat-1".to_string(),
            doctor_id: "doc-1".to_string(),
            department_id: "dept-1".to_string(),
            appointment_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            appointment_time: TimeOfDay::at(8, 0),
            status: AppointmentStatus::Scheduled,
            reason: None,
        };

        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({
                "patient_id": "pat-1",
                "doctor_id": "doc-1",
                "department_id": "dept-1",
                "appointment_date": "2026-10-19T00:00:00.000Z",
                "appointment_time": "08:00",
                "status": "scheduled"
            })
        );
    }

    #[test]
    fn test_filter_query_and_matching() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let filter = AppointmentFilter::for_doctor_on("doc-1", date);
        assert_eq!(
            filter.to_query(),
            vec![("doctor_id", "doc-1".to_string()), ("date", "2026-10-19".to_string())]
        );

        let draft = AppointmentDraft {
            patient_id: "pat-1".to_string(),
            doctor_id: "doc-2".to_string(),
            department_id: "dept-1".to_string(),
            appointment_date: date,
            appointment_time: TimeOfDay::at(9, 0),
            status: AppointmentStatus::Scheduled,
            reason: Some("Checkup".to_string()),
        };
        assert!(!filter.matches(&Appointment::from_draft("appt-2", &draft)));
    }

    #[test]
    fn test_selectable_keeps_unknown_and_selected() {
        let mut map = AvailabilityMap::new();
        map.insert(TimeOfDay::at(8, 0), false);
        map.insert(TimeOfDay::at(8, 10), true);

        let slots = [TimeOfDay::at(8, 0), TimeOfDay::at(8, 10), TimeOfDay::at(8, 20)];
        assert_eq!(
            map.selectable(slots, Some(TimeOfDay::at(7, 50))),
            vec![TimeOfDay::at(7, 50), TimeOfDay::at(8, 10), TimeOfDay::at(8, 20)]
        );
        assert_eq!(
            map.selectable(slots, Some(TimeOfDay::at(8, 0))),
            vec![TimeOfDay::at(8, 10), TimeOfDay::at(8, 20)]
        );
        assert_eq!(map.selectable(slots, Some(TimeOfDay::at(8, 15))).len(), 2);
    }

    #[test]
    fn test_capacity() {
        let capacity = BookingCapacity { max_patients: Some(2), booked: 1 };
        assert_eq!(capacity.remaining(), Some(1));
        assert!(!capacity.is_full());
        assert!(capacity.with_one_more().is_full());
        assert!(!BookingCapacity::unlimited(40).is_full());
    }

    #[test]
    fn test_error_kinds_and_messages() {
        let conflict = BookingError::from(ConflictError {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            time: TimeOfDay::at(8, 0),
        });
        assert_eq!(conflict.kind(), BookingErrorKind::Conflict);
        assert_eq!(
            conflict.to_string(),
            "This time slot (08:00) has already been booked on Monday, October 19, 2026. Please select a different time."
        );

        let backend = BookingError::Store(StoreError::from(ApiError::Conflict("Slot taken".to_string())));
        assert_eq!(backend.kind(), BookingErrorKind::Conflict);
        assert_eq!(backend.to_string(), "Slot taken");

        let transport = StoreError::from(ApiError::Transport("connection refused".to_string()));
        assert_eq!(BookingError::Store(transport).kind(), BookingErrorKind::Unavailable);
    }
}
