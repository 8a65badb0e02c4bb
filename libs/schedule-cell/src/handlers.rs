// libs/schedule-cell/src/handlers.rs
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

use crate::models::{CreateExceptionRequest, GenerateSlotsRequest, UpsertTemplateRequest};
use crate::services::{ScheduleService, SlotGeneratorService};

#[derive(Debug, Deserialize)]
pub struct AvailableDaysQuery {
    pub start_date: Option<NaiveDate>,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SlotListQuery {
    pub date: NaiveDate,
}

#[axum::debug_handler]
pub async fn upsert_template(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpsertTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let template = service.upsert_template(doctor_id, request).await?;
    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn create_exception(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let exception = service.create_exception(doctor_id, request).await?;
    Ok(Json(json!(exception)))
}

#[axum::debug_handler]
pub async fn get_weekly_schedule(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let schedule = service.weekly_schedule(doctor_id).await;
    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedule": schedule,
    })))
}

#[axum::debug_handler]
pub async fn get_available_days(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableDaysQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let start = query.start_date.unwrap_or_else(|| Utc::now().date_naive());
    let days = query.days.unwrap_or(30).min(90);
    let available_days = service.available_days(doctor_id, start, days).await;
    Ok(Json(json!({
        "doctor_id": doctor_id,
        "days": available_days,
    })))
}

#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotListQuery>,
) -> Result<Json<Value>, AppError> {
    let generator = SlotGeneratorService::new(&state);
    let slots = generator.slots_for_day(doctor_id, query.date).await;
    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn generate_slots(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let generator = SlotGeneratorService::new(&state);
    let start = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
    let days = request
        .days
        .unwrap_or(state.config.generation_horizon_days);
    let report = generator
        .generate(doctor_id, start, days, request.force.unwrap_or(false))
        .await?;
    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn block_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let generator = SlotGeneratorService::new(&state);
    let slot = generator.block_slot(slot_id).await?;
    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn unblock_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let generator = SlotGeneratorService::new(&state);
    let slot = generator.unblock_slot(slot_id).await?;
    Ok(Json(json!(slot)))
}
