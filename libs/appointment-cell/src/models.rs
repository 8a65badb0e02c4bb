// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::{AppointmentStatus, BookingChannel, CancelledBy};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_id: Uuid,
    pub channel: BookingChannel,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub cancelled_by: CancelledBy,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub notes: Option<String>,
}

/// Outcome of a background sweep over appointments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepStats {
    pub examined: usize,
    pub transitioned: usize,
    pub failed: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("appointment not found")]
    NotFound,

    #[error("time slot not found")]
    SlotNotFound,

    #[error("slot unavailable")]
    SlotUnavailable,

    #[error("slot is in the past")]
    SlotInPast,

    #[error("patient already has an appointment with this doctor on this date")]
    DuplicateBooking,

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("queue is empty")]
    QueueEmpty,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound("time slot") => AppointmentError::SlotNotFound,
            StoreError::NotFound(_) => AppointmentError::NotFound,
            StoreError::Duplicate(what) => AppointmentError::Store(format!("duplicate {}", what)),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::SlotNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotUnavailable
            | AppointmentError::DuplicateBooking
            | AppointmentError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::SlotInPast
            | AppointmentError::QueueEmpty
            | AppointmentError::Validation(_) => AppError::BadRequest(err.to_string()),
            AppointmentError::Store(_) => AppError::Internal(err.to_string()),
        }
    }
}
