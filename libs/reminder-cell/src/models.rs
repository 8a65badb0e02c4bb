// libs/reminder-cell/src/models.rs
use serde::{Deserialize, Serialize};

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkFailedRequest {
    pub error: String,
}

/// Outcome of one dispatch sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchStats {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReminderError {
    #[error("reminder not found")]
    NotFound,

    #[error("reminder already {0}")]
    AlreadyResolved(String),

    #[error("notification transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl From<StoreError> for ReminderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ReminderError::NotFound,
            StoreError::Duplicate(what) => ReminderError::Store(format!("duplicate {}", what)),
        }
    }
}

impl From<ReminderError> for AppError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::NotFound => AppError::NotFound(err.to_string()),
            ReminderError::AlreadyResolved(_) => AppError::Conflict(err.to_string()),
            ReminderError::Transport(_) => AppError::ExternalService(err.to_string()),
            ReminderError::Store(_) => AppError::Internal(err.to_string()),
        }
    }
}
