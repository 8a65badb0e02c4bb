// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{BookAppointmentRequest, CancelAppointmentRequest, CompleteAppointmentRequest};
use crate::services::{AppointmentLifecycleService, AppointmentQueueService};

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub date: Option<NaiveDate>,
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.book(request).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.get(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.confirm(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service
        .cancel(appointment_id, request.cancelled_by, request.reason)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.complete(appointment_id, request.notes).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(&state);
    let appointment = service.mark_no_show(appointment_id, Utc::now()).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_queue(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let entries = service.list_for_day(doctor_id, date).await;
    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "queue": entries,
    })))
}

#[axum::debug_handler]
pub async fn call_next_in_queue(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let entry = service.call_next(doctor_id, date).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn skip_queue_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let entry = service.skip(entry_id).await?;
    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn finish_queue_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueueService::new(&state);
    let entry = service.finish(entry_id).await?;
    Ok(Json(json!(entry)))
}
