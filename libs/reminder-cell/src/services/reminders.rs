// libs/reminder-cell/src/services/reminders.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore, StoreError};
use shared_models::{Appointment, AppointmentStatus, Reminder, ReminderKind, ReminderStatus};

use crate::models::ReminderError;

pub struct ReminderSchedulerService {
    store: Arc<ClinicStore>,
}

impl ReminderSchedulerService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    /// Create the configured reminder kinds for a freshly confirmed
    /// appointment. Kinds whose fire time has already passed are skipped;
    /// the (appointment, kind) uniqueness key makes repeated calls safe.
    pub async fn create_for_appointment(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> Vec<Reminder> {
        let start = appointment.start_datetime();
        let mut created = Vec::new();

        for kind in ReminderKind::all() {
            let scheduled_time = start - kind.offset();
            if scheduled_time <= now {
                debug!(
                    "Skipping {} reminder for appointment {}: fire time already passed",
                    kind, appointment.id
                );
                continue;
            }

            let (title, body) = render_content(kind, appointment);
            let reminder = Reminder {
                id: Uuid::new_v4(),
                appointment_id: appointment.id,
                kind,
                scheduled_time,
                status: ReminderStatus::Pending,
                title,
                body,
                error_message: None,
                sent_at: None,
                created_at: now,
            };

            match self.store.insert_reminder(reminder).await {
                Ok(stored) => {
                    info!("Created {} reminder for appointment {}", kind, appointment.id);
                    created.push(stored);
                }
                Err(StoreError::Duplicate(_)) => {
                    debug!(
                        "Reminder {} already exists for appointment {}",
                        kind, appointment.id
                    );
                }
                Err(e) => {
                    debug!("Failed to store reminder: {}", e);
                }
            }
        }

        created
    }

    /// Pending reminders due at `now`, oldest first, limited to `limit`.
    /// Reminders for appointments that are no longer active are excluded.
    pub async fn due_reminders(&self, now: DateTime<Utc>, limit: usize) -> Vec<Reminder> {
        let mut due = self
            .store
            .reminders_matching(|r| {
                r.status == ReminderStatus::Pending && r.scheduled_time <= now
            })
            .await;
        due.sort_by_key(|r| r.scheduled_time);

        let mut result = Vec::new();
        for reminder in due {
            if result.len() >= limit {
                break;
            }
            let active = matches!(
                self.store.get_appointment(reminder.appointment_id).await,
                Ok(a) if matches!(a.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
            );
            if active {
                result.push(reminder);
            }
        }
        result
    }

    pub async fn mark_sent(&self, id: Uuid) -> Result<Reminder, ReminderError> {
        self.store
            .with_reminder(id, |reminder| {
                if reminder.status != ReminderStatus::Pending {
                    return Err(ReminderError::AlreadyResolved(reminder.status.to_string()));
                }
                reminder.status = ReminderStatus::Sent;
                reminder.sent_at = Some(Utc::now());
                Ok(reminder.clone())
            })
            .await
    }

    /// Record a delivery failure. Terminal for this reminder kind.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Reminder, ReminderError> {
        self.store
            .with_reminder(id, |reminder| {
                if reminder.status != ReminderStatus::Pending {
                    return Err(ReminderError::AlreadyResolved(reminder.status.to_string()));
                }
                reminder.status = ReminderStatus::Failed;
                reminder.error_message = Some(error.to_string());
                Ok(reminder.clone())
            })
            .await
    }

    /// Fail all pending reminders of a cancelled appointment.
    pub async fn cancel_for_appointment(&self, appointment_id: Uuid) -> usize {
        let pending = self
            .store
            .reminders_matching(|r| {
                r.appointment_id == appointment_id && r.status == ReminderStatus::Pending
            })
            .await;

        let mut cancelled = 0;
        for reminder in pending {
            if self
                .mark_failed(reminder.id, "Appointment cancelled")
                .await
                .is_ok()
            {
                cancelled += 1;
            }
        }

        info!(
            "Cancelled {} reminders for appointment {}",
            cancelled, appointment_id
        );
        cancelled
    }

    pub async fn list_for_appointment(&self, appointment_id: Uuid) -> Vec<Reminder> {
        self.store.reminders_for_appointment(appointment_id).await
    }

    /// Delete sent/failed reminders created before `cutoff`.
    pub async fn purge_old(&self, cutoff: DateTime<Utc>) -> usize {
        let purged = self.store.purge_reminders_before(cutoff).await;
        if purged > 0 {
            info!("Purged {} old reminders", purged);
        }
        purged
    }
}

fn render_content(kind: ReminderKind, appointment: &Appointment) -> (String, String) {
    let time = appointment.start_time.format("%H:%M");
    match kind {
        ReminderKind::DayBefore => (
            "Appointment Reminder".to_string(),
            format!("You have an appointment tomorrow at {}.", time),
        ),
        ReminderKind::HourBefore => (
            "Appointment in 1 Hour".to_string(),
            format!("Your appointment is in 1 hour at {}.", time),
        ),
    }
}
