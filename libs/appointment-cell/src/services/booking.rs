use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use doctor_cell::models::DoctorSchedule;
use shared_models::time::{TimeOfDay, SLOT_STEP_MINUTES};
use shared_models::wire::parse_calendar_date;
use shared_utils::time_slots::quantize_time;

use crate::models::{
    Appointment, AppointmentDraft, AppointmentStatus, BookingCapacity, BookingError, BookingRequest, CapacityError,
    ConflictError, FormatError, NotFoundError, QuantizationError,
};
use crate::services::availability::{booking_capacity, is_slot_free, SlotScope};
use crate::services::notification::{DoctorNotifier, Notifier};
use crate::services::session::AvailabilitySession;
use crate::services::store::AppointmentStore;

// ==============================================================================
// BOOKING STATE MACHINE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    Idle,
    Validating,
    ConflictCheck,
    Committing,
    Done,
    Rejected,
}

impl BookingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingState::Done | BookingState::Rejected)
    }

    pub fn can_transition_to(&self, target: &BookingState) -> bool {
        use BookingState::*;
        match (self, target) {
            (Idle, Validating) => true,
            (Validating, ConflictCheck) => true,
            (ConflictCheck, Committing) => true,
            (Committing, Done) => true,
            (_, Rejected) => !self.is_terminal(),
            _ => false,
        }
    }
}

/// Tracks one booking attempt through the state machine.
#[derive(Debug)]
struct BookingAttempt {
    state: BookingState,
}

impl BookingAttempt {
    fn new() -> Self {
        Self { state: BookingState::Idle }
    }

    fn advance(&mut self, next: BookingState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "invalid booking transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Booking attempt {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

// ==============================================================================
// VALIDATION
// ==============================================================================

/// A booking request whose fields passed the local checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBooking {
    pub patient_id: String,
    pub doctor_id: String,
    /// May be left out on schedule-bound bookings; the schedule's department is used.
    pub department_id: Option<String>,
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub reason: Option<String>,
    pub schedule_id: Option<String>,
    pub status: Option<AppointmentStatus>,
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, BookingError> {
    optional(value).ok_or(BookingError::MissingField(field))
}

/// Like `required`, but hands the value to its parser as submitted.
fn required_raw(value: &Option<String>, field: &'static str) -> Result<String, BookingError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or(BookingError::MissingField(field))
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Checks a request without touching the network.
pub fn validate_request(request: &BookingRequest, today: NaiveDate) -> Result<ValidatedBooking, BookingError> {
    let patient_id = required(&request.patient_id, "patient_id")?;
    let doctor_id = required(&request.doctor_id, "doctor_id")?;
    let schedule_id = optional(&request.schedule_id);
    let department_id = match schedule_id {
        Some(_) => optional(&request.department_id),
        None => Some(required(&request.department_id, "department_id")?),
    };
    let raw_date = required_raw(&request.appointment_date, "appointment_date")?;
    let raw_time = required_raw(&request.appointment_time, "appointment_time")?;

    let date = parse_calendar_date(&raw_date).ok_or_else(|| FormatError {
        field: "appointment_date",
        value: raw_date.clone(),
        expected: "YYYY-MM-DD",
    })?;
    if date < today {
        return Err(BookingError::PastDate(date));
    }

    let time = TimeOfDay::parse(&raw_time).map_err(|_| FormatError {
        field: "appointment_time",
        value: raw_time.clone(),
        expected: "HH:MM",
    })?;
    if !time.is_on_grid(SLOT_STEP_MINUTES) {
        return Err(QuantizationError {
            time,
            suggested: quantize_time(time),
            step: SLOT_STEP_MINUTES,
        }
        .into());
    }

    Ok(ValidatedBooking {
        patient_id,
        doctor_id,
        department_id,
        date,
        time,
        reason: optional(&request.reason),
        schedule_id,
        status: request.status,
    })
}

fn check_schedule_fit(schedule: &DoctorSchedule, booking: &ValidatedBooking) -> Result<(), BookingError> {
    let outside = |reason: String| BookingError::OutsideSchedule {
        schedule_id: schedule.id.clone(),
        reason,
    };

    if schedule.doctor_id != booking.doctor_id {
        return Err(outside(format!("schedule belongs to doctor {}", schedule.doctor_id)));
    }
    if !schedule.falls_on(booking.date) {
        return Err(outside(format!("{} is not a {}", booking.date, schedule.day_of_week)));
    }
    if !schedule.window_contains(booking.time) {
        return Err(outside(format!(
            "{} is outside {}-{}",
            booking.time, schedule.start_time, schedule.end_time
        )));
    }
    Ok(())
}

// ==============================================================================
// ORCHESTRATOR
// ==============================================================================

#[derive(Debug, Serialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    /// Schedule capacity including this booking, for schedule-bound requests.
    pub capacity: Option<BookingCapacity>,
    /// Background doctor notification, when one was started.
    #[serde(skip)]
    pub notification: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Commit {
    Create,
    Update(String),
}

/// Runs booking attempts: validate, re-check the slot, commit, notify.
pub struct BookingOrchestrator {
    store: Arc<dyn AppointmentStore>,
    notifier: Option<Arc<dyn Notifier>>,
    session: Option<Arc<AvailabilitySession>>,
}

impl BookingOrchestrator {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            store,
            notifier: None,
            session: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Session to invalidate after every successful commit.
    pub fn with_session(mut self, session: Arc<AvailabilitySession>) -> Self {
        self.session = Some(session);
        self
    }

    #[instrument(skip(self, request), fields(doctor_id = ?request.doctor_id))]
    pub async fn book(&self, request: &BookingRequest, today: NaiveDate) -> Result<BookingOutcome, BookingError> {
        self.run(request, today, Commit::Create).await
    }

    /// Moves an existing appointment; it never conflicts with itself.
    #[instrument(skip(self, request))]
    pub async fn reschedule(
        &self,
        appointment_id: &str,
        request: &BookingRequest,
        today: NaiveDate,
    ) -> Result<BookingOutcome, BookingError> {
        self.run(request, today, Commit::Update(appointment_id.to_string())).await
    }

    async fn run(
        &self,
        request: &BookingRequest,
        today: NaiveDate,
        commit: Commit,
    ) -> Result<BookingOutcome, BookingError> {
        let mut attempt = BookingAttempt::new();
        let result = self.execute(&mut attempt, request, today, commit).await;

        match &result {
            Ok(outcome) => info!(
                "Booked appointment {} for doctor {} on {}",
                outcome.appointment.id, outcome.appointment.doctor_id, outcome.appointment.appointment_date
            ),
            Err(e) => {
                attempt.advance(BookingState::Rejected);
                warn!("Booking rejected ({:?}): {}", e.kind(), e);
            }
        }

        result
    }

    async fn execute(
        &self,
        attempt: &mut BookingAttempt,
        request: &BookingRequest,
        today: NaiveDate,
        commit: Commit,
    ) -> Result<BookingOutcome, BookingError> {
        attempt.advance(BookingState::Validating);
        let booking = validate_request(request, today)?;

        attempt.advance(BookingState::ConflictCheck);
        let mut scope = SlotScope::new(booking.doctor_id.clone(), booking.date);
        let status = match &commit {
            Commit::Create => AppointmentStatus::Scheduled,
            Commit::Update(id) => {
                scope = scope.excluding(id.clone());
                match booking.status {
                    Some(status) => status,
                    None => self.store.get_appointment(id).await?.status,
                }
            }
        };

        let appointments: Vec<Appointment> = self
            .store
            .list_appointments(&scope.filter())
            .await?
            .into_iter()
            .filter(|a| !scope.is_excluded(a))
            .collect();

        if !is_slot_free(&scope, booking.time, &appointments) {
            return Err(ConflictError {
                date: booking.date,
                time: booking.time,
            }
            .into());
        }

        let (department_id, capacity) = match &booking.schedule_id {
            Some(schedule_id) => {
                let schedule = self.find_schedule(schedule_id).await?;
                check_schedule_fit(&schedule, &booking)?;

                let capacity = booking_capacity(&schedule, booking.date, &appointments);
                if let Some(max_patients) = capacity.max_patients {
                    if capacity.is_full() {
                        return Err(CapacityError {
                            schedule_id: schedule.id.clone(),
                            date: booking.date,
                            max_patients,
                            booked: capacity.booked,
                        }
                        .into());
                    }
                }

                let department_id = self.resolve_department(&booking, &schedule).await?;
                (department_id, Some(capacity))
            }
            None => {
                let department_id = booking
                    .department_id
                    .clone()
                    .ok_or(BookingError::MissingField("department_id"))?;
                (department_id, None)
            }
        };

        attempt.advance(BookingState::Committing);
        let draft = AppointmentDraft {
            patient_id: booking.patient_id.clone(),
            doctor_id: booking.doctor_id.clone(),
            department_id,
            appointment_date: booking.date,
            appointment_time: booking.time,
            status,
            reason: booking.reason.clone(),
        };

        let appointment = match &commit {
            Commit::Create => self.store.create_appointment(&draft).await?,
            Commit::Update(id) => self.store.update_appointment(id, &draft).await?,
        };

        attempt.advance(BookingState::Done);
        if let Some(session) = &self.session {
            session.invalidate().await;
        }

        let notification = match (&commit, &self.notifier) {
            (Commit::Create, Some(notifier)) => {
                Some(DoctorNotifier::new(self.store.clone(), notifier.clone()).spawn(appointment.clone()))
            }
            _ => None,
        };

        Ok(BookingOutcome {
            appointment,
            capacity: capacity.map(|c| c.with_one_more()),
            notification,
        })
    }

    async fn find_schedule(&self, schedule_id: &str) -> Result<DoctorSchedule, BookingError> {
        self.store
            .list_doctor_schedules()
            .await?
            .into_iter()
            .find(|schedule| schedule.id == schedule_id)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Schedule",
                    id: schedule_id.to_string(),
                }
                .into()
            })
    }

    async fn resolve_department(
        &self,
        booking: &ValidatedBooking,
        schedule: &DoctorSchedule,
    ) -> Result<String, BookingError> {
        if let Some(department_id) = booking.department_id.clone().or_else(|| schedule.department_id.clone()) {
            return Ok(department_id);
        }

        let doctor = self.store.get_doctor(&booking.doctor_id).await?;
        doctor.department_id.ok_or(BookingError::MissingField("department_id"))
    }
}
