// libs/reminder-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::MarkFailedRequest;
use crate::services::ReminderSchedulerService;

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    pub limit: Option<usize>,
}

#[axum::debug_handler]
pub async fn list_due_reminders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DueQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderSchedulerService::new(&state);
    let due = service
        .due_reminders(Utc::now(), query.limit.unwrap_or(100))
        .await;
    let total = due.len();
    Ok(Json(json!({
        "reminders": due,
        "total": total,
    })))
}

#[axum::debug_handler]
pub async fn mark_reminder_sent(
    State(state): State<Arc<AppState>>,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderSchedulerService::new(&state);
    let reminder = service.mark_sent(reminder_id).await?;
    Ok(Json(json!(reminder)))
}

#[axum::debug_handler]
pub async fn mark_reminder_failed(
    State(state): State<Arc<AppState>>,
    Path(reminder_id): Path<Uuid>,
    Json(request): Json<MarkFailedRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderSchedulerService::new(&state);
    let reminder = service.mark_failed(reminder_id, &request.error).await?;
    Ok(Json(json!(reminder)))
}

#[axum::debug_handler]
pub async fn list_appointment_reminders(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ReminderSchedulerService::new(&state);
    let reminders = service.list_for_appointment(appointment_id).await;
    Ok(Json(json!({
        "appointment_id": appointment_id,
        "reminders": reminders,
    })))
}
