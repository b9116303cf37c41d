use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use doctor_cell::services::calendar::ScheduleCalendar;
use shared_config::AppConfig;

use crate::handlers;

/// Shared by every scheduling handler.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub calendar: ScheduleCalendar,
}

impl SchedulingState {
    /// Uses the local wall-clock date.
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            calendar: ScheduleCalendar::default(),
        }
    }

    pub fn with_calendar(mut self, calendar: ScheduleCalendar) -> Self {
        self.calendar = calendar;
        self
    }
}

pub fn scheduling_routes(state: SchedulingState) -> Router {
    Router::new()
        // Pure slot utilities
        .route("/slots", get(handlers::get_slots))
        .route("/time/quantize", get(handlers::quantize_time))
        // Backed by the hospital API; a bearer token, if any, is forwarded
        .route("/schedules", get(handlers::get_schedule_board))
        .route("/availability", get(handlers::get_availability))
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments/{appointment_id}", put(handlers::reschedule_appointment))
        .with_state(state)
}
