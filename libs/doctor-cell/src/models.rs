use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use shared_models::time::TimeOfDay;
use shared_models::wire::{deserialize_optional_reference, deserialize_reference};
use shared_utils::time_slots::{generate_grid_slots, TimeSlots};

// ==============================================================================
// DAY OF WEEK
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown day of week: {0}")]
pub struct UnknownDayOfWeek(pub String);

impl DayOfWeek {
    /// Sunday-first, matching the backend's numeric encoding (0 = Sunday).
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }

    pub fn days_from_sunday(&self) -> u32 {
        self.to_weekday().num_days_from_sunday()
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn to_weekday(&self) -> Weekday {
        match self {
            DayOfWeek::Sunday => Weekday::Sun,
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        Self::ALL[weekday.num_days_from_sunday() as usize]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DayOfWeek {
    type Err = UnknownDayOfWeek;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|day| {
                let name = day.name().to_ascii_lowercase();
                name == wanted || (wanted.len() == 3 && name.starts_with(&wanted))
            })
            .copied()
            .ok_or_else(|| UnknownDayOfWeek(s.to_string()))
    }
}

impl Serialize for DayOfWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DayOfWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(name) => name.parse().map_err(serde::de::Error::custom),
            Value::Number(index) => index
                .as_u64()
                .and_then(|i| u32::try_from(i).ok())
                .and_then(DayOfWeek::from_index)
                .ok_or_else(|| serde::de::Error::custom(format!("day of week index out of range: {}", index))),
            other => Err(serde::de::Error::custom(format!("invalid day of week: {}", other))),
        }
    }
}

// ==============================================================================
// DOCTOR REFERENCE DATA
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Login account of the doctor; notifications are addressed to it.
    #[serde(default, deserialize_with = "deserialize_optional_reference")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_reference")]
    pub department_id: Option<String>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn display_name(&self) -> String {
        let name = self.full_name();
        if name.is_empty() {
            "Selected Doctor".to_string()
        } else {
            format!("Dr. {}", name)
        }
    }
}

// ==============================================================================
// RECURRING SCHEDULES
// ==============================================================================

/// Weekly window in which a doctor takes appointments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawDoctorSchedule")]
pub struct DoctorSchedule {
    pub id: String,
    pub doctor_id: String,
    /// Department of the doctor when the backend populated the reference.
    pub department_id: Option<String>,
    pub day_of_week: DayOfWeek,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub max_patients: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawDoctorSchedule {
    #[serde(alias = "_id")]
    id: String,
    doctor_id: Value,
    #[serde(default, deserialize_with = "deserialize_optional_reference")]
    department_id: Option<String>,
    day_of_week: DayOfWeek,
    start_time: TimeOfDay,
    end_time: TimeOfDay,
    #[serde(default)]
    max_patients: Option<u32>,
}

impl TryFrom<RawDoctorSchedule> for DoctorSchedule {
    type Error = String;

    fn try_from(raw: RawDoctorSchedule) -> Result<Self, Self::Error> {
        let doctor_id = deserialize_reference(raw.doctor_id.clone()).map_err(|e| e.to_string())?;
        let department_id = raw.department_id.or_else(|| {
            raw.doctor_id
                .get("department_id")
                .and_then(|department| deserialize_optional_reference(department.clone()).ok().flatten())
        });

        Ok(Self {
            id: raw.id,
            doctor_id,
            department_id,
            day_of_week: raw.day_of_week,
            start_time: raw.start_time,
            end_time: raw.end_time,
            max_patients: raw.max_patients,
        })
    }
}

impl DoctorSchedule {
    pub fn is_valid(&self) -> bool {
        self.start_time < self.end_time
    }

    /// Bookable starts lie in `[start_time, end_time)`.
    pub fn window_contains(&self, time: TimeOfDay) -> bool {
        self.start_time <= time && time < self.end_time
    }

    pub fn slots(&self) -> TimeSlots {
        generate_grid_slots(self.start_time, self.end_time)
    }

    /// `None` means unlimited; a declared limit of 0 is treated the same way.
    pub fn capacity_limit(&self) -> Option<u32> {
        self.max_patients.filter(|max| *max > 0)
    }

    pub fn falls_on(&self, date: NaiveDate) -> bool {
        DayOfWeek::of(date) == self.day_of_week
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_day_of_week_parsing() {
        assert_eq!("monday".parse::<DayOfWeek>(), Ok(DayOfWeek::Monday));
        assert_eq!("Sat".parse::<DayOfWeek>(), Ok(DayOfWeek::Saturday));
        assert_matches!("Someday".parse::<DayOfWeek>(), Err(UnknownDayOfWeek(_)));
        assert_eq!(serde_json::from_value::<DayOfWeek>(json!(0)).unwrap(), DayOfWeek::Sunday);
        assert!(serde_json::from_value::<DayOfWeek>(json!(7)).is_err());
        assert_eq!(serde_json::to_value(DayOfWeek::Thursday).unwrap(), json!("Thursday"));
    }

    #[test]
    fn test_day_of_week_matches_chrono() {
        for day in DayOfWeek::ALL {
            assert_eq!(DayOfWeek::from(day.to_weekday()), day);
        }
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(DayOfWeek::of(monday), DayOfWeek::Monday);
    }

    #[test]
    fn test_schedule_from_populated_doctor() {
        let schedule: DoctorSchedule = serde_json::from_value(json!({
            "_id": "sched-1",
            "doctor_id": { "_id": "doc-1", "department_id": { "_id": "dept-7", "name": "Cardiology" } },
            "day_of_week": "Monday",
            "start_time": "08:00",
            "end_time": "09:00",
            "max_patients": 2
        }))
        .unwrap();

        assert_eq!(schedule.doctor_id, "doc-1");
        assert_eq!(schedule.department_id.as_deref(), Some("dept-7"));
        assert_eq!(schedule.capacity_limit(), Some(2));
        assert_eq!(schedule.slots().count(), 6);
        assert!(schedule.window_contains(TimeOfDay::at(8, 50)));
        assert!(!schedule.window_contains(TimeOfDay::at(9, 0)));
    }

    #[test]
    fn test_schedule_without_capacity() {
        let schedule: DoctorSchedule = serde_json::from_value(json!({
            "id": "sched-2",
            "doctor_id": "doc-2",
            "day_of_week": 3,
            "start_time": "14:00",
            "end_time": "16:30",
            "max_patients": 0
        }))
        .unwrap();

        assert_eq!(schedule.day_of_week, DayOfWeek::Wednesday);
        assert_eq!(schedule.department_id, None);
        assert_eq!(schedule.capacity_limit(), None);
        assert!(schedule.is_valid());
    }

    #[test]
    fn test_doctor_display_name() {
        let doctor: Doctor = serde_json::from_value(json!({
            "_id": "doc-1",
            "first_name": "Grace",
            "last_name": "Hopper",
            "user_id": { "_id": "user-1" }
        }))
        .unwrap();
        assert_eq!(doctor.display_name(), "Dr. Grace Hopper");
        assert_eq!(doctor.user_id.as_deref(), Some("user-1"));
        assert_eq!(doctor.department_id, None);
    }
}
