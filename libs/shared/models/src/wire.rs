//! Deserialization helpers for the hospital backend's JSON.
//!
//! References may arrive either as a bare id or as a populated document,
//! and dates as either `YYYY-MM-DD` or a full ISO-8601 date-time.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::Value;

use crate::time::TimeOfDay;

/// Truncates an ISO-8601 date or date-time to its calendar date.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return Some(date_time.naive_utc().date());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|date_time| date_time.date())
}

fn reference_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(document) => document
            .get("_id")
            .or_else(|| document.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

pub fn deserialize_reference<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    reference_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("expected an id or a populated document, got {}", value)))
}

pub fn deserialize_optional_reference<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(reference_from_value))
}

pub fn deserialize_calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid calendar date {:?}", raw)))
}

/// Missing or malformed times become `None` instead of failing the whole payload.
pub fn deserialize_lenient_time<'de, D>(deserializer: D) -> Result<Option<TimeOfDay>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(raw)) => TimeOfDay::parse(raw.trim()).ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "deserialize_reference")]
        doctor_id: String,
        #[serde(default, deserialize_with = "deserialize_optional_reference")]
        user_id: Option<String>,
        #[serde(deserialize_with = "deserialize_calendar_date")]
        date: NaiveDate,
        #[serde(default, deserialize_with = "deserialize_lenient_time")]
        time: Option<TimeOfDay>,
    }

    #[test]
    fn test_parse_calendar_date_truncates_date_times() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(parse_calendar_date("2026-10-19"), Some(expected));
        assert_eq!(parse_calendar_date("2026-10-19T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_calendar_date("2026-10-19T13:45:00"), Some(expected));
        assert_eq!(parse_calendar_date("19/10/2026"), None);
    }

    #[test]
    fn test_populated_references_and_lenient_time() {
        let sample: Sample = serde_json::from_value(json!({
            "doctor_id": { "_id": "doc-1", "first_name": "Ada" },
            "user_id": null,
            "date": "2026-10-19T00:00:00.000Z",
            "time": "9:00"
        }))
        .unwrap();

        assert_eq!(sample.doctor_id, "doc-1");
        assert_eq!(sample.user_id, None);
        assert_eq!(sample.date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(sample.time, None);
    }

    #[test]
    fn test_plain_references() {
        let sample: Sample = serde_json::from_value(json!({
            "doctor_id": "doc-2",
            "user_id": { "id": "user-9" },
            "date": "2026-10-20",
            "time": "10:30"
        }))
        .unwrap();

        assert_eq!(sample.doctor_id, "doc-2");
        assert_eq!(sample.user_id.as_deref(), Some("user-9"));
        assert_eq!(sample.time, TimeOfDay::new(10, 30));
    }
}
