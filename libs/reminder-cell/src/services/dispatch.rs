// libs/reminder-cell/src/services/dispatch.rs
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::AppState;
use shared_models::{AppointmentStatus, Reminder, ReminderKind};

use crate::models::{DispatchStats, ReminderError};
use crate::services::reminders::ReminderSchedulerService;

/// Outbound transport to the notification collaborator. Delivery failures
/// are recorded on the reminder, never retried here.
pub struct NotificationClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NotificationClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.notification_url.clone(),
            timeout: Duration::from_secs(config.notification_timeout_secs),
        }
    }

    pub async fn send(
        &self,
        recipient: Uuid,
        kind: ReminderKind,
        title: &str,
        body: &str,
    ) -> Result<(), ReminderError> {
        if self.base_url.is_empty() {
            // No transport configured; the reminder is still surfaced in-app.
            warn!("Notification transport not configured, skipping delivery");
            return Ok(());
        }

        debug!("Sending {} notification to {}", kind, recipient);

        let payload = json!({
            "recipient": recipient,
            "type": "appointment_reminder",
            "reminder_kind": kind.to_string(),
            "title": title,
            "body": body,
        });

        let response = self
            .client
            .post(format!("{}/notifications", self.base_url))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReminderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Notification API error ({}): {}", status, error_text);
            return Err(ReminderError::Transport(format!(
                "notification API error ({}): {}",
                status, error_text
            )));
        }

        Ok(())
    }
}

/// Drives one dispatch sweep: claim the due set, attempt delivery once per
/// reminder, and resolve each to sent or failed before the next sweep.
pub struct ReminderDispatchService {
    state: AppState,
    scheduler: ReminderSchedulerService,
    client: NotificationClient,
}

impl ReminderDispatchService {
    pub fn new(state: &AppState) -> Self {
        Self {
            state: state.clone(),
            scheduler: ReminderSchedulerService::new(state),
            client: NotificationClient::new(&state.config),
        }
    }

    #[instrument(skip(self))]
    pub async fn process_due(&self, now: DateTime<Utc>, batch_size: usize) -> DispatchStats {
        let due = self.scheduler.due_reminders(now, batch_size).await;
        let mut stats = DispatchStats::default();

        for reminder in due {
            stats.processed += 1;
            match self.dispatch_one(&reminder).await {
                Ok(()) => stats.sent += 1,
                Err(e) => {
                    stats.failed += 1;
                    if let Err(mark_err) = self
                        .scheduler
                        .mark_failed(reminder.id, &e.to_string())
                        .await
                    {
                        warn!("Could not record reminder failure: {}", mark_err);
                    }
                }
            }
        }

        if stats.processed > 0 {
            info!(
                "Processed {} reminders: {} sent, {} failed",
                stats.processed, stats.sent, stats.failed
            );
        }
        stats
    }

    async fn dispatch_one(&self, reminder: &Reminder) -> Result<(), ReminderError> {
        let appointment = self
            .state
            .store
            .get_appointment(reminder.appointment_id)
            .await?;

        // The due listing already filters inactive appointments, but the
        // status can change between listing and dispatch.
        if !matches!(
            appointment.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        ) {
            return Err(ReminderError::Transport(format!(
                "appointment status is {}",
                appointment.status
            )));
        }

        self.client
            .send(
                appointment.patient_id,
                reminder.kind,
                &reminder.title,
                &reminder.body,
            )
            .await?;

        self.scheduler.mark_sent(reminder.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use shared_models::{BookingChannel, ReminderStatus};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use shared_models::Appointment;

    fn state_with_notification_url(url: String) -> AppState {
        let mut config = AppConfig::default();
        config.notification_url = url;
        AppState::new(config)
    }

    async fn seed_confirmed_appointment(state: &AppState, hours_out: i64) -> Appointment {
        let start = Utc::now() + ChronoDuration::hours(hours_out);
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            appointment_date: start.date_naive(),
            start_time: start.time(),
            end_time: (start + ChronoDuration::minutes(30)).time(),
            status: AppointmentStatus::Confirmed,
            channel: BookingChannel::Online,
            reason: None,
            consultation_fee: None,
            confirmed_at: Some(Utc::now()),
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            doctor_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.store.insert_appointment(appointment.clone()).await;
        appointment
    }

    #[tokio::test]
    async fn dispatch_marks_sent_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let state = state_with_notification_url(server.uri());
        let scheduler = ReminderSchedulerService::new(&state);
        let dispatch = ReminderDispatchService::new(&state);

        let appointment = seed_confirmed_appointment(&state, 26).await;
        scheduler.create_for_appointment(&appointment, Utc::now()).await;

        let stats = dispatch
            .process_due(Utc::now() + ChronoDuration::hours(3), 50)
            .await;
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.sent, 1);

        let reminders = scheduler.list_for_appointment(appointment.id).await;
        let day_before = reminders
            .iter()
            .find(|r| r.kind == ReminderKind::DayBefore)
            .unwrap();
        assert_eq!(day_before.status, ReminderStatus::Sent);
        assert!(day_before.sent_at.is_some());
    }

    #[tokio::test]
    async fn dispatch_marks_failed_on_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notifications"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let state = state_with_notification_url(server.uri());
        let scheduler = ReminderSchedulerService::new(&state);
        let dispatch = ReminderDispatchService::new(&state);

        let appointment = seed_confirmed_appointment(&state, 26).await;
        scheduler.create_for_appointment(&appointment, Utc::now()).await;

        let stats = dispatch
            .process_due(Utc::now() + ChronoDuration::hours(3), 50)
            .await;
        assert_eq!(stats.failed, 1);

        let reminders = scheduler.list_for_appointment(appointment.id).await;
        let day_before = reminders
            .iter()
            .find(|r| r.kind == ReminderKind::DayBefore)
            .unwrap();
        assert_eq!(day_before.status, ReminderStatus::Failed);
        assert!(day_before.error_message.is_some());

        // A failed reminder is terminal: the next sweep finds nothing.
        let second = dispatch
            .process_due(Utc::now() + ChronoDuration::hours(3), 50)
            .await;
        assert_eq!(second.processed, 0);
    }

    #[tokio::test]
    async fn reminder_for_cancelled_appointment_is_failed_not_sent() {
        let server = MockServer::start().await;
        let state = state_with_notification_url(server.uri());
        let scheduler = ReminderSchedulerService::new(&state);
        let dispatch = ReminderDispatchService::new(&state);

        let appointment = seed_confirmed_appointment(&state, 26).await;
        scheduler.create_for_appointment(&appointment, Utc::now()).await;

        state
            .store
            .with_appointment(appointment.id, |a| -> Result<(), ReminderError> {
                a.status = AppointmentStatus::Cancelled;
                Ok(())
            })
            .await
            .unwrap();

        // due_reminders filters inactive appointments, so nothing is sent.
        let stats = dispatch
            .process_due(Utc::now() + ChronoDuration::hours(3), 50)
            .await;
        assert_eq!(stats.processed, 0);
    }
}
