use async_trait::async_trait;
use tracing::{debug, instrument};

use doctor_cell::models::{Doctor, DoctorSchedule};
use shared_config::AppConfig;
use shared_database::HospitalApiClient;

use crate::models::{Appointment, AppointmentDraft, AppointmentFilter, PatientSummary, StoreError};

/// Backend that owns appointments, schedules and reference data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    async fn get_appointment(&self, id: &str) -> Result<Appointment, StoreError>;

    async fn create_appointment(&self, draft: &AppointmentDraft) -> Result<Appointment, StoreError>;

    async fn update_appointment(&self, id: &str, draft: &AppointmentDraft) -> Result<Appointment, StoreError>;

    async fn list_doctor_schedules(&self) -> Result<Vec<DoctorSchedule>, StoreError>;

    async fn get_doctor(&self, id: &str) -> Result<Doctor, StoreError>;

    async fn get_patient(&self, id: &str) -> Result<PatientSummary, StoreError>;
}

/// `AppointmentStore` backed by the hospital REST API.
pub struct RestAppointmentStore {
    client: HospitalApiClient,
}

impl RestAppointmentStore {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            client: HospitalApiClient::new(config, auth_token),
        }
    }
}

#[async_trait]
impl AppointmentStore for RestAppointmentStore {
    #[instrument(skip(self))]
    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let appointments: Vec<Appointment> = self.client.get("/appointments", &filter.to_query()).await?;
        debug!("Fetched {} appointments", appointments.len());
        Ok(appointments)
    }

    async fn get_appointment(&self, id: &str) -> Result<Appointment, StoreError> {
        let path = HospitalApiClient::resource_path("/appointments", id);
        Ok(self.client.get(&path, &[]).await?)
    }

    #[instrument(skip(self, draft), fields(doctor_id = %draft.doctor_id, date = %draft.appointment_date))]
    async fn create_appointment(&self, draft: &AppointmentDraft) -> Result<Appointment, StoreError> {
        Ok(self.client.post("/appointments", draft).await?)
    }

    #[instrument(skip(self, draft))]
    async fn update_appointment(&self, id: &str, draft: &AppointmentDraft) -> Result<Appointment, StoreError> {
        let path = HospitalApiClient::resource_path("/appointments", id);
        Ok(self.client.put(&path, draft).await?)
    }

    async fn list_doctor_schedules(&self) -> Result<Vec<DoctorSchedule>, StoreError> {
        let schedules: Vec<DoctorSchedule> = self.client.get("/doctor-schedules", &[]).await?;
        debug!("Fetched {} doctor schedules", schedules.len());
        Ok(schedules)
    }

    async fn get_doctor(&self, id: &str) -> Result<Doctor, StoreError> {
        let path = HospitalApiClient::resource_path("/doctors", id);
        Ok(self.client.get(&path, &[]).await?)
    }

    async fn get_patient(&self, id: &str) -> Result<PatientSummary, StoreError> {
        let path = HospitalApiClient::resource_path("/patients", id);
        Ok(self.client.get(&path, &[]).await?)
    }
}
