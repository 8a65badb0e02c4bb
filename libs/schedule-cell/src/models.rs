// libs/schedule-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::{ExceptionKind, TimeSlot};

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertTemplateRequest {
    pub day_of_week: u8, // 0 = Monday, 6 = Sunday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    pub max_patients_per_slot: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExceptionRequest {
    pub exception_date: NaiveDate,
    #[serde(flatten)]
    pub kind: ExceptionKind,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSlotsRequest {
    pub start_date: Option<NaiveDate>,
    pub days: Option<u32>,
    pub force: Option<bool>,
}

/// One date in an availability lookup, with the reason when not bookable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub day_name: String,
    pub is_available: bool,
    pub reason: Option<String>,
}

/// Outcome of slot generation for one doctor over a date range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub created: usize,
    pub kept: usize,
    pub skipped_booked: usize,
    pub slots: BTreeMap<NaiveDate, Vec<TimeSlot>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorGenerationOutcome {
    pub doctor_id: Uuid,
    pub created: usize,
    pub kept: usize,
    pub skipped_booked: usize,
    pub error: Option<String>,
}

/// Batch generation result; a failing doctor never aborts the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchGenerationReport {
    pub outcomes: Vec<DoctorGenerationOutcome>,
}

impl BatchGenerationReport {
    pub fn total_created(&self) -> usize {
        self.outcomes.iter().map(|o| o.created).sum()
    }

    pub fn failed_doctors(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule not found")]
    NotFound,

    #[error("invalid day of week: {0}")]
    InvalidDayOfWeek(u8),

    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("slot state conflict: {0}")]
    SlotStateConflict(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ScheduleError::NotFound,
            StoreError::Duplicate(what) => {
                ScheduleError::SlotStateConflict(format!("duplicate {}", what))
            }
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::NotFound => AppError::NotFound(err.to_string()),
            ScheduleError::InvalidDayOfWeek(_) | ScheduleError::InvalidWindow(_) => {
                AppError::ValidationError(err.to_string())
            }
            ScheduleError::SlotStateConflict(_) => AppError::Conflict(err.to_string()),
            ScheduleError::Store(_) => AppError::Internal(err.to_string()),
        }
    }
}
