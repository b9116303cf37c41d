use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use doctor_cell::services::calendar::ScheduleCalendar;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_models::time::{TimeOfDay, SLOT_STEP_MINUTES};
use shared_models::wire::parse_calendar_date;
use shared_utils::clock::FixedClock;
use shared_utils::time_slots::{generate_slots_str, is_quantized, quantize};

use crate::models::{BookingError, BookingErrorKind, BookingRequest, StoreError};
use crate::router::SchedulingState;
use crate::services::availability::{compute_availability, SlotScope};
use crate::services::booking::{BookingOrchestrator, BookingOutcome};
use crate::services::notification::RestNotifier;
use crate::services::schedule_board::load_schedule_board;
use crate::services::store::{AppointmentStore, RestAppointmentStore};

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuantizeQuery {
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleBoardQuery {
    pub today: Option<String>,
    #[serde(default)]
    pub include_full: bool,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: String,
    pub date: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub exclude_appointment_id: Option<String>,
    pub selected: Option<String>,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        let message = error.to_string();
        match (&error, error.kind()) {
            (BookingError::MissingField(_) | BookingError::Format(_), _) => AppError::BadRequest(message),
            (_, BookingErrorKind::Validation) => AppError::ValidationError(message),
            (_, BookingErrorKind::Conflict | BookingErrorKind::Capacity) => AppError::Conflict(message),
            (_, BookingErrorKind::NotFound) => AppError::NotFound(message),
            (_, BookingErrorKind::Unavailable) => AppError::ExternalService(message),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        BookingError::Store(error).into()
    }
}

fn store_for(state: &AppConfig, auth: &BearerHeader) -> Arc<dyn AppointmentStore> {
    let token = auth.as_ref().map(|TypedHeader(header)| header.token());
    Arc::new(RestAppointmentStore::new(state, token))
}

fn orchestrator_for(state: &AppConfig, auth: &BearerHeader) -> BookingOrchestrator {
    let orchestrator = BookingOrchestrator::new(store_for(state, auth));
    if state.notify_doctors {
        let token = auth.as_ref().map(|TypedHeader(header)| header.token());
        orchestrator.with_notifier(Arc::new(RestNotifier::new(state, token)))
    } else {
        orchestrator
    }
}

fn parse_date_param(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    parse_calendar_date(value).ok_or_else(|| AppError::BadRequest(format!("Invalid {} format: {:?}, expected YYYY-MM-DD", field, value)))
}

fn outcome_body(outcome: &BookingOutcome, message: &str) -> Value {
    json!({
        "success": true,
        "message": message,
        "data": outcome.appointment,
        "capacity": outcome.capacity,
        "doctor_notified": outcome.notification.is_some(),
    })
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

pub async fn get_slots(Query(query): Query<SlotsQuery>) -> Json<Value> {
    let slots = generate_slots_str(query.start.as_deref(), query.end.as_deref());
    let times: Vec<TimeOfDay> = slots.collect();

    Json(json!({
        "step_minutes": SLOT_STEP_MINUTES,
        "count": times.len(),
        "slots": times,
    }))
}

pub async fn quantize_time(Query(query): Query<QuantizeQuery>) -> Json<Value> {
    Json(json!({
        "time": query.time,
        "valid": is_quantized(&query.time),
        "quantized": quantize(&query.time),
    }))
}

// ==============================================================================
// SCHEDULE AND AVAILABILITY HANDLERS
// ==============================================================================

pub async fn get_schedule_board(
    State(state): State<SchedulingState>,
    auth: BearerHeader,
    Query(query): Query<ScheduleBoardQuery>,
) -> Result<Json<Value>, AppError> {
    let calendar = match query.today.as_deref() {
        Some(raw) => ScheduleCalendar::new(Arc::new(FixedClock(parse_date_param("today", raw)?))),
        None => state.calendar.clone(),
    };

    let store = store_for(&state.config, &auth);
    let entries: Vec<_> = load_schedule_board(store.as_ref(), &calendar)
        .await?
        .into_iter()
        .filter(|entry| query.include_full || entry.is_open())
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "data": entries,
    })))
}

pub async fn get_availability(
    State(state): State<SchedulingState>,
    auth: BearerHeader,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date_param("date", &query.date)?;
    let mut scope = SlotScope::new(query.doctor_id.clone(), date);
    if let Some(id) = query.exclude_appointment_id.as_deref().filter(|id| !id.is_empty()) {
        scope = scope.excluding(id);
    }

    let slots: Vec<TimeOfDay> = generate_slots_str(query.start.as_deref(), query.end.as_deref()).collect();
    let appointments = store_for(&state.config, &auth).list_appointments(&scope.filter()).await?;
    let availability = compute_availability(&scope, slots.iter().copied(), &appointments);

    let selected = query.selected.as_deref().and_then(|raw| TimeOfDay::parse(raw).ok());
    let selectable = availability.selectable(slots.iter().copied(), selected);

    debug!(
        "Availability for doctor {} on {}: {} booked",
        scope.doctor_id,
        date,
        availability.booked_times().len()
    );

    Ok(Json(json!({
        "success": true,
        "doctor_id": scope.doctor_id,
        "date": date,
        "availability": availability,
        "booked": availability.booked_times(),
        "selectable": selectable,
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<SchedulingState>,
    auth: BearerHeader,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let outcome = orchestrator_for(&state.config, &auth)
        .book(&request, state.calendar.today())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(outcome_body(&outcome, "Appointment scheduled successfully")),
    ))
}

pub async fn reschedule_appointment(
    State(state): State<SchedulingState>,
    auth: BearerHeader,
    Path(appointment_id): Path<String>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = orchestrator_for(&state.config, &auth)
        .reschedule(&appointment_id, &request, state.calendar.today())
        .await?;

    Ok(Json(outcome_body(&outcome, "Appointment updated successfully")))
}
