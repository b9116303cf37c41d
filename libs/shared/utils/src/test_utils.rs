use std::sync::Arc;

use serde_json::{json, Value};

use shared_config::AppConfig;

pub struct TestConfig {
    pub hospital_api_url: String,
    pub hospital_api_token: Option<String>,
    pub notify_doctors: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            hospital_api_url: "http://localhost:5000/api".to_string(),
            hospital_api_token: Some("test-api-token".to_string()),
            notify_doctors: true,
        }
    }
}

impl TestConfig {
    /// Points the configuration at a mock server (e.g. `MockServer::uri()`).
    pub fn with_backend(uri: &str) -> Self {
        Self {
            hospital_api_url: uri.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn without_notifications(mut self) -> Self {
        self.notify_doctors = false;
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            hospital_api_url: self.hospital_api_url.clone(),
            hospital_api_token: self.hospital_api_token.clone(),
            notify_doctors: self.notify_doctors,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// JSON payloads shaped like the hospital backend's responses.
pub struct MockHospitalResponses;

impl MockHospitalResponses {
    pub fn envelope(data: Value) -> Value {
        let count = data.as_array().map(|items| items.len());
        match count {
            Some(count) => json!({ "success": true, "count": count, "data": data }),
            None => json!({ "success": true, "data": data }),
        }
    }

    pub fn appointment(id: &str, doctor_id: &str, date: &str, time: &str, status: &str) -> Value {
        json!({
            "_id": id,
            "patient_id": { "_id": format!("patient-of-{}", id), "first_name": "Test", "last_name": "Patient" },
            "doctor_id": doctor_id,
            "department_id": "dept-general",
            "appointment_date": format!("{}T00:00:00.000Z", date),
            "appointment_time": time,
            "reason": null,
            "status": status,
            "createdAt": "2026-01-01T00:00:00.000Z"
        })
    }

    pub fn schedule(id: &str, doctor_id: &str, day: &str, start: &str, end: &str, max_patients: Option<u32>) -> Value {
        json!({
            "_id": id,
            "doctor_id": {
                "_id": doctor_id,
                "first_name": "Grace",
                "last_name": "Hopper",
                "department_id": { "_id": "dept-general", "name": "General Medicine" }
            },
            "day_of_week": day,
            "start_time": start,
            "end_time": end,
            "max_patients": max_patients
        })
    }

    pub fn doctor(id: &str, user_id: Option<&str>) -> Value {
        json!({
            "_id": id,
            "first_name": "Grace",
            "last_name": "Hopper",
            "user_id": user_id.map(|user| json!({ "_id": user, "email": "doctor@example.com" })),
            "department_id": "dept-general"
        })
    }

    pub fn patient(id: &str, first_name: &str, last_name: &str) -> Value {
        json!({
            "_id": id,
            "patient_id": "PAT-000001",
            "first_name": first_name,
            "last_name": last_name,
            "phone": "+250700000000"
        })
    }

    pub fn error_response(message: &str) -> Value {
        json!({
            "success": false,
            "message": message
        })
    }

    pub fn validation_errors(errors: &[&str]) -> Value {
        json!({
            "success": false,
            "errors": errors
        })
    }
}
