// libs/scheduler-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::JobCoordinator;

pub fn scheduler_routes(coordinator: Arc<JobCoordinator>) -> Router {
    Router::new()
        .route("/start", post(handlers::start_coordinator))
        .route("/stop", post(handlers::stop_coordinator))
        .route("/status", get(handlers::coordinator_status))
        .with_state(coordinator)
}
