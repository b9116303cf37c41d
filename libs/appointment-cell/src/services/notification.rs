use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::HospitalApiClient;

use crate::models::{Appointment, NotificationError, LONG_DATE_FORMAT};
use crate::services::store::AppointmentStore;

const UNKNOWN_PATIENT: &str = "A patient";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, message: &str) -> Result<(), NotificationError>;
}

#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    user_id: &'a str,
    message: &'a str,
    notification_type: &'static str,
    is_read: bool,
}

/// Posts in-app notifications to the hospital API.
pub struct RestNotifier {
    client: HospitalApiClient,
}

impl RestNotifier {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            client: HospitalApiClient::new(config, auth_token),
        }
    }
}

#[async_trait]
impl Notifier for RestNotifier {
    async fn notify(&self, user_id: &str, message: &str) -> Result<(), NotificationError> {
        let payload = NotificationPayload {
            user_id,
            message,
            notification_type: "appointment",
            is_read: false,
        };

        let _: Value = self
            .client
            .post("/notifications", &payload)
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        Ok(())
    }
}

pub fn booking_message(patient_name: Option<&str>, appointment: &Appointment) -> String {
    let patient = patient_name.filter(|name| !name.trim().is_empty()).unwrap_or(UNKNOWN_PATIENT);
    let time = appointment
        .appointment_time
        .map(|time| time.to_string())
        .unwrap_or_else(|| "TBD".to_string());

    let mut message = format!(
        "New appointment booked! {} has scheduled an appointment with you on {} at {}.",
        patient,
        appointment.appointment_date.format(LONG_DATE_FORMAT),
        time
    );

    if let Some(reason) = appointment.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        message.push_str(" Reason: ");
        message.push_str(reason);
    }

    message
}

/// Tells a doctor about a new booking on their calendar.
#[derive(Clone)]
pub struct DoctorNotifier {
    store: Arc<dyn AppointmentStore>,
    notifier: Arc<dyn Notifier>,
}

impl DoctorNotifier {
    pub fn new(store: Arc<dyn AppointmentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn notify_booking(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        let doctor = self.store.get_doctor(&appointment.doctor_id).await?;
        let user_id = doctor
            .user_id
            .ok_or_else(|| NotificationError::MissingRecipient(doctor.id.clone()))?;

        let patient_name = match self.store.get_patient(&appointment.patient_id).await {
            Ok(patient) => Some(patient.full_name()),
            Err(e) => {
                debug!("Patient {} lookup failed, using generic name: {}", appointment.patient_id, e);
                None
            }
        };

        let message = booking_message(patient_name.as_deref(), appointment);
        self.notifier.notify(&user_id, &message).await?;

        info!("Notified doctor {} about appointment {}", appointment.doctor_id, appointment.id);
        Ok(())
    }

    /// Runs the notification in the background. Failures are logged and dropped.
    pub fn spawn(&self, appointment: Appointment) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.notify_booking(&appointment).await {
                warn!("Doctor notification for appointment {} failed: {}", appointment.id, e);
            }
        })
    }
}
