use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use reminder_cell::router::reminder_routes;
use schedule_cell::router::schedule_routes;
use scheduler_cell::router::scheduler_routes;
use scheduler_cell::JobCoordinator;
use shared_database::AppState;

pub fn create_router(state: Arc<AppState>, coordinator: Arc<JobCoordinator>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/reminders", reminder_routes(state.clone()))
        .nest("/scheduler", scheduler_routes(coordinator))
}
