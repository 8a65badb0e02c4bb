// libs/appointment-cell/src/services/queue.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore};
use shared_models::{Appointment, QueueEntry, QueueStatus};

use crate::models::AppointmentError;

/// Per-doctor, per-day walk-in ordering for confirmed same-day
/// appointments. Positions are assigned at enqueue time and never
/// renumbered.
pub struct AppointmentQueueService {
    store: Arc<ClinicStore>,
}

impl AppointmentQueueService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    pub async fn enqueue(&self, appointment: &Appointment) -> QueueEntry {
        let position = self
            .store
            .next_queue_position(appointment.doctor_id, appointment.appointment_date)
            .await;

        let entry = QueueEntry {
            id: Uuid::new_v4(),
            doctor_id: appointment.doctor_id,
            queue_date: appointment.appointment_date,
            appointment_id: appointment.id,
            status: QueueStatus::Waiting,
            position,
            created_at: Utc::now(),
        };

        debug!(
            "Queued appointment {} at position {} for doctor {} on {}",
            appointment.id, position, appointment.doctor_id, appointment.appointment_date
        );
        self.store.insert_queue_entry(entry).await
    }

    pub async fn list_for_day(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<QueueEntry> {
        self.store.queue_for_day(doctor_id, date).await
    }

    /// Call the lowest-position waiting entry.
    pub async fn call_next(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<QueueEntry, AppointmentError> {
        let next = self
            .store
            .queue_for_day(doctor_id, date)
            .await
            .into_iter()
            .find(|e| e.status == QueueStatus::Waiting)
            .ok_or(AppointmentError::QueueEmpty)?;

        let called = self
            .store
            .with_queue_entry(next.id, |entry| {
                if entry.status != QueueStatus::Waiting {
                    // Lost a race with another caller.
                    return Err(AppointmentError::QueueEmpty);
                }
                entry.status = QueueStatus::Called;
                Ok::<QueueEntry, AppointmentError>(entry.clone())
            })
            .await?;

        info!(
            "Called queue position {} for doctor {} on {}",
            called.position, doctor_id, date
        );
        Ok(called)
    }

    /// Skip a waiting or called patient.
    pub async fn skip(&self, entry_id: Uuid) -> Result<QueueEntry, AppointmentError> {
        self.store
            .with_queue_entry(entry_id, |entry| {
                match entry.status {
                    QueueStatus::Waiting | QueueStatus::Called => {}
                    QueueStatus::Skipped | QueueStatus::Done => {
                        return Err(AppointmentError::Validation(format!(
                            "queue entry is already resolved as {:?}",
                            entry.status
                        )));
                    }
                }
                entry.status = QueueStatus::Skipped;
                Ok::<QueueEntry, AppointmentError>(entry.clone())
            })
            .await
    }

    /// Drop queue entries dated before `cutoff`. Used by retention cleanup.
    pub async fn purge_past(&self, cutoff: NaiveDate) -> usize {
        let purged = self.store.purge_queue_before(cutoff).await;
        if purged > 0 {
            info!("Purged {} past queue entries", purged);
        }
        purged
    }

    /// Mark a called patient as seen.
    pub async fn finish(&self, entry_id: Uuid) -> Result<QueueEntry, AppointmentError> {
        self.store
            .with_queue_entry(entry_id, |entry| {
                if entry.status != QueueStatus::Called {
                    return Err(AppointmentError::Validation(
                        "only a called patient can be marked done".to_string(),
                    ));
                }
                entry.status = QueueStatus::Done;
                Ok::<QueueEntry, AppointmentError>(entry.clone())
            })
            .await
    }
}
