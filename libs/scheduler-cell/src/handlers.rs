// libs/scheduler-cell/src/handlers.rs
use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::services::JobCoordinator;

#[axum::debug_handler]
pub async fn start_coordinator(State(coordinator): State<Arc<JobCoordinator>>) -> Json<Value> {
    let started = coordinator.start().await;
    Json(json!({
        "running": true,
        "started": started,
    }))
}

#[axum::debug_handler]
pub async fn stop_coordinator(State(coordinator): State<Arc<JobCoordinator>>) -> Json<Value> {
    let stopped = coordinator.stop().await;
    Json(json!({
        "running": false,
        "stopped": stopped,
    }))
}

#[axum::debug_handler]
pub async fn coordinator_status(State(coordinator): State<Arc<JobCoordinator>>) -> Json<Value> {
    let status = coordinator.status().await;
    Json(json!(status))
}
