use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::{scheduling_routes, SchedulingState};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/api/scheduling", scheduling_routes(SchedulingState::new(state)))
}
