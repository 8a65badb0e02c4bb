// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use reminder_cell::services::ReminderSchedulerService;
use shared_database::{AppState, ClinicStore};
use shared_models::{Appointment, AppointmentStatus, CancelledBy};

use crate::models::{AppointmentError, BookAppointmentRequest, SweepStats};
use crate::services::ledger::BookingLedger;
use crate::services::queue::AppointmentQueueService;

pub struct AppointmentLifecycleService {
    store: Arc<ClinicStore>,
    ledger: BookingLedger,
    reminder_service: ReminderSchedulerService,
    queue_service: AppointmentQueueService,
    no_show_grace: Duration,
    auto_confirm_age: Duration,
}

impl AppointmentLifecycleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            ledger: BookingLedger::new(state),
            reminder_service: ReminderSchedulerService::new(state),
            queue_service: AppointmentQueueService::new(state),
            no_show_grace: Duration::minutes(state.config.no_show_grace_minutes),
            auto_confirm_age: Duration::minutes(state.config.auto_confirm_age_minutes),
        }
    }

    /// All states reachable from `current`. Anything else is rejected.
    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Pending => {
                &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => &[],
        }
    }

    fn validate_transition(
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if Self::valid_transitions(current).contains(&next) {
            Ok(())
        } else {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            Err(AppointmentError::InvalidTransition {
                from: current,
                to: next,
            })
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get_appointment(id).await.map_err(Into::into)
    }

    /// Book a slot: reserve one capacity unit and create the appointment in
    /// `pending`. Capacity is exhausted atomically, so a concurrent booking
    /// against the last unit surfaces as `SlotUnavailable` here.
    #[instrument(skip(self, request), fields(slot_id = %request.slot_id))]
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let slot = self.store.get_slot(request.slot_id).await?;

        if slot.doctor_id != request.doctor_id {
            return Err(AppointmentError::Validation(
                "slot does not belong to the requested doctor".to_string(),
            ));
        }
        if slot.start_datetime() <= now {
            return Err(AppointmentError::SlotInPast);
        }

        // One non-cancelled appointment per (patient, doctor, date).
        // Advisory under concurrency: two simultaneous bookings for
        // different slots can both pass; only capacity is serialized.
        let duplicates = self
            .store
            .appointments_matching(|a| {
                a.patient_id == request.patient_id
                    && a.doctor_id == request.doctor_id
                    && a.appointment_date == slot.slot_date
                    && a.status != AppointmentStatus::Cancelled
            })
            .await;
        if !duplicates.is_empty() {
            return Err(AppointmentError::DuplicateBooking);
        }

        let reserved = self.ledger.reserve(request.slot_id).await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            slot_id: reserved.id,
            appointment_date: reserved.slot_date,
            start_time: reserved.start_time,
            end_time: reserved.end_time,
            status: AppointmentStatus::Pending,
            channel: request.channel,
            reason: request.reason,
            consultation_fee: reserved.consultation_fee,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            doctor_notes: None,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.insert_appointment(appointment).await;
        info!(
            "Booked appointment {} for patient {} on {} at {}",
            stored.id, stored.patient_id, stored.appointment_date, stored.start_time
        );
        Ok(stored)
    }

    /// `pending -> confirmed`: stamps `confirmed_at`, creates reminders and,
    /// for same-day appointments, a day-queue entry.
    pub async fn confirm(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let confirmed = self
            .store
            .with_appointment(id, |appointment| {
                Self::validate_transition(appointment.status, AppointmentStatus::Confirmed)?;
                appointment.status = AppointmentStatus::Confirmed;
                appointment.confirmed_at = Some(now);
                appointment.updated_at = now;
                Ok::<Appointment, AppointmentError>(appointment.clone())
            })
            .await?;

        self.reminder_service
            .create_for_appointment(&confirmed, now)
            .await;

        if confirmed.appointment_date == now.date_naive() {
            self.queue_service.enqueue(&confirmed).await;
        }

        info!("Confirmed appointment {}", confirmed.id);
        Ok(confirmed)
    }

    /// `confirmed -> completed`. Capacity is not released; the visit
    /// consumed the slot.
    pub async fn complete(
        &self,
        id: Uuid,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let completed = self
            .store
            .with_appointment(id, |appointment| {
                Self::validate_transition(appointment.status, AppointmentStatus::Completed)?;
                appointment.status = AppointmentStatus::Completed;
                appointment.completed_at = Some(now);
                if notes.is_some() {
                    appointment.doctor_notes = notes.clone();
                }
                appointment.updated_at = now;
                Ok::<Appointment, AppointmentError>(appointment.clone())
            })
            .await?;

        info!("Completed appointment {}", completed.id);
        Ok(completed)
    }

    /// `pending|confirmed -> cancelled`: releases the capacity unit and
    /// fails any pending reminders.
    pub async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: CancelledBy,
        reason: String,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let cancelled = self
            .store
            .with_appointment(id, |appointment| {
                Self::validate_transition(appointment.status, AppointmentStatus::Cancelled)?;
                appointment.status = AppointmentStatus::Cancelled;
                appointment.cancelled_at = Some(now);
                appointment.cancelled_by = Some(cancelled_by);
                appointment.cancellation_reason = Some(reason.clone());
                appointment.updated_at = now;
                Ok::<Appointment, AppointmentError>(appointment.clone())
            })
            .await?;

        if let Err(e) = self.ledger.release(cancelled.slot_id).await {
            // The slot may already have been purged by retention cleanup.
            warn!(
                "Could not release slot {} for cancelled appointment {}: {}",
                cancelled.slot_id, cancelled.id, e
            );
        }
        self.reminder_service.cancel_for_appointment(cancelled.id).await;

        info!("Cancelled appointment {} by {:?}", cancelled.id, cancelled_by);
        Ok(cancelled)
    }

    /// Whether a confirmed appointment has passed the no-show deadline.
    pub fn should_mark_no_show(
        &self,
        status: AppointmentStatus,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        status == AppointmentStatus::Confirmed && now > start + self.no_show_grace
    }

    /// `confirmed -> no_show`, only past the grace deadline. Capacity is not
    /// released.
    pub async fn mark_no_show(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        self.store
            .with_appointment(id, |appointment| {
                Self::validate_transition(appointment.status, AppointmentStatus::NoShow)?;
                let deadline = appointment.start_datetime() + self.no_show_grace;
                if now <= deadline {
                    return Err(AppointmentError::Validation(
                        "no-show grace period has not elapsed".to_string(),
                    ));
                }
                appointment.status = AppointmentStatus::NoShow;
                appointment.updated_at = now;
                Ok::<Appointment, AppointmentError>(appointment.clone())
            })
            .await
    }

    /// Background job: confirm pending appointments older than the
    /// auto-confirm age threshold. Per-row errors never abort the sweep.
    #[instrument(skip(self))]
    pub async fn auto_confirm_due(&self, now: DateTime<Utc>) -> SweepStats {
        let due = self
            .store
            .appointments_matching(|a| {
                a.status == AppointmentStatus::Pending && a.created_at + self.auto_confirm_age <= now
            })
            .await;

        let mut stats = SweepStats {
            examined: due.len(),
            ..Default::default()
        };

        for appointment in due {
            match self.confirm(appointment.id).await {
                Ok(_) => stats.transitioned += 1,
                Err(e) => {
                    warn!("Auto-confirm failed for appointment {}: {}", appointment.id, e);
                    stats.failed += 1;
                }
            }
        }

        if stats.transitioned > 0 {
            info!("Auto-confirmed {} appointments", stats.transitioned);
        }
        stats
    }

    /// Background job: transition confirmed appointments past the grace
    /// deadline to `no_show`.
    #[instrument(skip(self))]
    pub async fn sweep_no_shows(&self, now: DateTime<Utc>) -> SweepStats {
        let overdue = self
            .store
            .appointments_matching(|a| {
                self.should_mark_no_show(a.status, a.start_datetime(), now)
            })
            .await;

        let mut stats = SweepStats {
            examined: overdue.len(),
            ..Default::default()
        };

        for appointment in overdue {
            match self.mark_no_show(appointment.id, now).await {
                Ok(_) => {
                    debug!("Marked appointment {} as no-show", appointment.id);
                    stats.transitioned += 1;
                }
                Err(e) => {
                    warn!("No-show sweep failed for appointment {}: {}", appointment.id, e);
                    stats.failed += 1;
                }
            }
        }

        if stats.transitioned > 0 {
            info!("Marked {} appointments as no-show", stats.transitioned);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveTime;
    use shared_config::AppConfig;
    use shared_models::{BookingChannel, SlotStatus, TimeSlot};

    fn state() -> AppState {
        AppState::new(AppConfig::default())
    }

    async fn seed_slot(state: &AppState, days_out: i64, max_bookings: i32) -> TimeSlot {
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let slot = TimeSlot {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            slot_date: (Utc::now() + Duration::days(days_out)).date_naive(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            status: SlotStatus::Available,
            current_bookings: 0,
            max_bookings,
            consultation_fee: Some(50.0),
            created_at: Utc::now(),
        };
        state.store.insert_slot(slot).await.unwrap()
    }

    fn booking_for(slot: &TimeSlot) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            doctor_id: slot.doctor_id,
            slot_id: slot.id,
            channel: BookingChannel::Online,
            reason: Some("checkup".to_string()),
        }
    }

    #[tokio::test]
    async fn booking_creates_pending_appointment_with_slot_snapshot() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 1).await;

        let appointment = service.book(booking_for(&slot)).await.unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.slot_id, slot.id);
        assert_eq!(appointment.appointment_date, slot.slot_date);
        assert_eq!(appointment.consultation_fee, Some(50.0));

        let stored_slot = state.store.get_slot(slot.id).await.unwrap();
        assert_eq!(stored_slot.current_bookings, 1);
        assert_eq!(stored_slot.status, SlotStatus::Booked);
    }

    #[tokio::test]
    async fn concurrent_bookings_of_last_unit_yield_one_appointment() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 1).await;

        let (a, b) = tokio::join!(
            service.book(booking_for(&slot)),
            service.book(booking_for(&slot))
        );

        let outcomes = [a, b];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let failure = outcomes.into_iter().find(|r| r.is_err()).unwrap();
        assert_matches!(failure.unwrap_err(), AppointmentError::SlotUnavailable);

        let stored_slot = state.store.get_slot(slot.id).await.unwrap();
        assert_eq!(stored_slot.current_bookings, 1);
    }

    #[tokio::test]
    async fn duplicate_same_day_booking_is_rejected() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let first_slot = seed_slot(&state, 7, 1).await;

        // A second slot the same day for the same doctor.
        let second_slot = state
            .store
            .insert_slot(TimeSlot {
                id: Uuid::new_v4(),
                start_time: first_slot.start_time + Duration::minutes(30),
                end_time: first_slot.end_time + Duration::minutes(30),
                ..first_slot.clone()
            })
            .await
            .unwrap();

        let patient = Uuid::new_v4();
        let mut first_request = booking_for(&first_slot);
        first_request.patient_id = patient;
        service.book(first_request).await.unwrap();

        let mut second_request = booking_for(&second_slot);
        second_request.patient_id = patient;
        let err = service.book(second_request).await.unwrap_err();
        assert_matches!(err, AppointmentError::DuplicateBooking);
    }

    #[tokio::test]
    async fn booking_a_past_slot_is_rejected() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, -1, 1).await;

        let err = service.book(booking_for(&slot)).await.unwrap_err();
        assert_matches!(err, AppointmentError::SlotInPast);
    }

    #[tokio::test]
    async fn confirm_creates_reminders_and_rejects_a_second_confirm() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 1).await;

        let appointment = service.book(booking_for(&slot)).await.unwrap();
        let confirmed = service.confirm(appointment.id).await.unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert!(confirmed.confirmed_at.is_some());

        let reminders = state.store.reminders_for_appointment(appointment.id).await;
        assert_eq!(reminders.len(), 2);

        let err = service.confirm(appointment.id).await.unwrap_err();
        assert_matches!(
            err,
            AppointmentError::InvalidTransition {
                from: AppointmentStatus::Confirmed,
                to: AppointmentStatus::Confirmed,
            }
        );
        // Still exactly one reminder per kind.
        assert_eq!(
            state.store.reminders_for_appointment(appointment.id).await.len(),
            2
        );
    }

    #[tokio::test]
    async fn cancel_releases_capacity_and_terminal_cancel_is_rejected() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 1).await;

        let appointment = service.book(booking_for(&slot)).await.unwrap();
        assert_eq!(
            state.store.get_slot(slot.id).await.unwrap().status,
            SlotStatus::Booked
        );

        let cancelled = service
            .cancel(appointment.id, CancelledBy::Patient, "conflict".to_string())
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Patient));

        let stored_slot = state.store.get_slot(slot.id).await.unwrap();
        assert_eq!(stored_slot.current_bookings, 0);
        assert_eq!(stored_slot.status, SlotStatus::Available);

        let err = service
            .cancel(appointment.id, CancelledBy::Patient, "again".to_string())
            .await
            .unwrap_err();
        assert_matches!(err, AppointmentError::InvalidTransition { .. });
    }

    #[tokio::test]
    async fn completed_appointment_cannot_be_cancelled() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 1).await;

        let appointment = service.book(booking_for(&slot)).await.unwrap();
        service.confirm(appointment.id).await.unwrap();
        service
            .complete(appointment.id, Some("routine visit".to_string()))
            .await
            .unwrap();

        let err = service
            .cancel(appointment.id, CancelledBy::Doctor, "oops".to_string())
            .await
            .unwrap_err();
        assert_matches!(err, AppointmentError::InvalidTransition { .. });

        // Completion keeps the capacity unit consumed.
        let stored_slot = state.store.get_slot(slot.id).await.unwrap();
        assert_eq!(stored_slot.current_bookings, 1);
    }

    #[tokio::test]
    async fn no_show_sweep_only_touches_confirmed_past_grace() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 2).await;

        let pending = service.book(booking_for(&slot)).await.unwrap();
        let confirmed = service.book(booking_for(&slot)).await.unwrap();
        service.confirm(confirmed.id).await.unwrap();

        // 40 minutes past the start with a 30 minute grace.
        let sweep_time = pending.start_datetime() + Duration::minutes(40);
        let stats = service.sweep_no_shows(sweep_time).await;
        assert_eq!(stats.transitioned, 1);

        let untouched = service.get(pending.id).await.unwrap();
        assert_eq!(untouched.status, AppointmentStatus::Pending);

        let swept = service.get(confirmed.id).await.unwrap();
        assert_eq!(swept.status, AppointmentStatus::NoShow);

        // No-show keeps the capacity unit consumed.
        let stored_slot = state.store.get_slot(slot.id).await.unwrap();
        assert_eq!(stored_slot.current_bookings, 2);
    }

    #[tokio::test]
    async fn no_show_before_grace_deadline_is_rejected() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 1).await;

        let appointment = service.book(booking_for(&slot)).await.unwrap();
        service.confirm(appointment.id).await.unwrap();

        let too_early = appointment.start_datetime() + Duration::minutes(10);
        let err = service.mark_no_show(appointment.id, too_early).await.unwrap_err();
        assert_matches!(err, AppointmentError::Validation(_));
    }

    #[tokio::test]
    async fn auto_confirm_picks_up_old_pending_appointments() {
        let state = state();
        let service = AppointmentLifecycleService::new(&state);
        let slot = seed_slot(&state, 7, 1).await;

        let appointment = service.book(booking_for(&slot)).await.unwrap();

        let early = service.auto_confirm_due(Utc::now()).await;
        assert_eq!(early.transitioned, 0);

        let later = Utc::now() + Duration::minutes(45);
        let stats = service.auto_confirm_due(later).await;
        assert_eq!(stats.transitioned, 1);

        let confirmed = service.get(appointment.id).await.unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
    }
}
