// libs/schedule-cell/src/services/slots.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore, StoreError};
use shared_models::{DayWindow, SlotStatus, TimeSlot};

use crate::models::{
    BatchGenerationReport, DoctorGenerationOutcome, GenerationReport, ScheduleError,
};
use crate::services::schedule::ScheduleService;

pub struct SlotGeneratorService {
    store: Arc<ClinicStore>,
    schedule_service: ScheduleService,
    horizon_max_days: u32,
}

impl SlotGeneratorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            schedule_service: ScheduleService::new(state),
            horizon_max_days: state.config.generation_horizon_max_days,
        }
    }

    /// Expand templates and exceptions into concrete slots for
    /// `[start_date, start_date + days)`.
    ///
    /// Repeated calls are idempotent: existing slots are kept untouched.
    /// With `force`, only slots with zero bookings are regenerated; booked
    /// slots are preserved and counted as skipped.
    #[instrument(skip(self))]
    pub async fn generate(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        days: u32,
        force: bool,
    ) -> Result<GenerationReport, ScheduleError> {
        let days = days.min(self.horizon_max_days);
        debug!("Generating slots for doctor {} over {} days", doctor_id, days);

        let mut report = GenerationReport::default();

        for offset in 0..days {
            let date = start_date + Duration::days(offset as i64);
            let Some(window) = self.schedule_service.resolve_window(doctor_id, date).await else {
                continue;
            };

            let slots = self
                .generate_for_date(doctor_id, date, &window, force, &mut report)
                .await?;
            if !slots.is_empty() {
                report.slots.insert(date, slots);
            }
        }

        info!(
            "Slot generation for doctor {}: {} created, {} kept, {} skipped (booked)",
            doctor_id, report.created, report.kept, report.skipped_booked
        );
        Ok(report)
    }

    async fn generate_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        window: &DayWindow,
        force: bool,
        report: &mut GenerationReport,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        let duration = Duration::minutes(window.slot_duration_minutes as i64);
        let mut slots = Vec::new();
        let mut current = window.start_time;

        loop {
            let (slot_end, wrapped) = current.overflowing_add_signed(duration);
            if wrapped != 0 || slot_end > window.end_time {
                break;
            }

            // A candidate overlapping the break jumps to the break end.
            if let (Some(bs), Some(be)) = (window.break_start, window.break_end) {
                if current < be && slot_end > bs {
                    current = be;
                    continue;
                }
            }

            let slot = match self.store.find_slot(doctor_id, date, current).await {
                Some(existing) if !force => {
                    report.kept += 1;
                    existing
                }
                Some(existing) => {
                    if existing.current_bookings > 0 {
                        warn!(
                            "Skipping regeneration of booked slot {} on {} at {}",
                            existing.id, date, current
                        );
                        report.skipped_booked += 1;
                        existing
                    } else if existing.status == SlotStatus::Blocked {
                        report.kept += 1;
                        existing
                    } else {
                        self.store.remove_slot_if_unbooked(existing.id).await?;
                        self.create_slot(doctor_id, date, current, window, report)
                            .await?
                    }
                }
                None => {
                    self.create_slot(doctor_id, date, current, window, report)
                        .await?
                }
            };

            slots.push(slot);
            current = slot_end;
        }

        Ok(slots)
    }

    async fn create_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start: chrono::NaiveTime,
        window: &DayWindow,
        report: &mut GenerationReport,
    ) -> Result<TimeSlot, ScheduleError> {
        let slot = TimeSlot {
            id: Uuid::new_v4(),
            doctor_id,
            slot_date: date,
            start_time: start,
            end_time: start + Duration::minutes(window.slot_duration_minutes as i64),
            status: SlotStatus::Available,
            current_bookings: 0,
            max_bookings: window.max_patients_per_slot,
            consultation_fee: window.consultation_fee,
            created_at: Utc::now(),
        };

        match self.store.insert_slot(slot).await {
            Ok(created) => {
                report.created += 1;
                Ok(created)
            }
            // A concurrent generation run won the insert; keep its slot.
            Err(StoreError::Duplicate(_)) => {
                report.kept += 1;
                self.store
                    .find_slot(doctor_id, date, start)
                    .await
                    .ok_or(ScheduleError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Generate for every doctor with an active template. Per-doctor errors
    /// are collected; one doctor failing never aborts the batch.
    #[instrument(skip(self))]
    pub async fn generate_for_all(
        &self,
        start_date: NaiveDate,
        days: u32,
        force: bool,
    ) -> BatchGenerationReport {
        let doctors = self.store.doctors_with_active_templates().await;
        let mut batch = BatchGenerationReport::default();

        for doctor_id in doctors {
            match self.generate(doctor_id, start_date, days, force).await {
                Ok(report) => batch.outcomes.push(DoctorGenerationOutcome {
                    doctor_id,
                    created: report.created,
                    kept: report.kept,
                    skipped_booked: report.skipped_booked,
                    error: None,
                }),
                Err(e) => {
                    warn!("Slot generation failed for doctor {}: {}", doctor_id, e);
                    batch.outcomes.push(DoctorGenerationOutcome {
                        doctor_id,
                        created: 0,
                        kept: 0,
                        skipped_booked: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        batch
    }

    pub async fn slots_for_day(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<TimeSlot> {
        self.store.slots_for_day(doctor_id, date).await
    }

    /// Take a zero-booking slot out of circulation.
    pub async fn block_slot(&self, slot_id: Uuid) -> Result<TimeSlot, ScheduleError> {
        self.store
            .with_slot(slot_id, |slot| {
                if slot.current_bookings > 0 {
                    return Err(ScheduleError::SlotStateConflict(
                        "slot has bookings".to_string(),
                    ));
                }
                if slot.status == SlotStatus::Blocked {
                    return Err(ScheduleError::SlotStateConflict(
                        "slot is already blocked".to_string(),
                    ));
                }
                slot.status = SlotStatus::Blocked;
                Ok(slot.clone())
            })
            .await
    }

    pub async fn unblock_slot(&self, slot_id: Uuid) -> Result<TimeSlot, ScheduleError> {
        self.store
            .with_slot(slot_id, |slot| {
                if slot.status != SlotStatus::Blocked {
                    return Err(ScheduleError::SlotStateConflict(
                        "slot is not blocked".to_string(),
                    ));
                }
                slot.status = SlotStatus::Available;
                Ok(slot.clone())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use shared_config::AppConfig;
    use shared_models::ExceptionKind;

    use crate::models::{CreateExceptionRequest, UpsertTemplateRequest};

    fn state() -> AppState {
        AppState::new(AppConfig::default())
    }

    // 2026-09-07 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 7).unwrap()
    }

    async fn seed_monday_template(state: &AppState, doctor: Uuid) {
        ScheduleService::new(state)
            .upsert_template(
                doctor,
                UpsertTemplateRequest {
                    day_of_week: 0,
                    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                    break_start: Some(NaiveTime::from_hms_opt(13, 0, 0).unwrap()),
                    break_end: Some(NaiveTime::from_hms_opt(14, 0, 0).unwrap()),
                    slot_duration_minutes: Some(30),
                    max_patients_per_slot: Some(1),
                    consultation_fee: Some(50.0),
                    is_active: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn monday_with_lunch_break_yields_fourteen_slots() {
        let state = state();
        let doctor = Uuid::new_v4();
        seed_monday_template(&state, doctor).await;

        let generator = SlotGeneratorService::new(&state);
        let report = generator.generate(doctor, monday(), 1, false).await.unwrap();

        assert_eq!(report.created, 14);
        let slots = &report.slots[&monday()];
        assert_eq!(slots.len(), 14);
        assert!(slots.iter().all(|s| s.status == SlotStatus::Available));
        assert!(slots.iter().all(|s| s.max_bookings == 1));

        // Nothing between 13:00 and 14:00.
        let lunch = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        let lunch_end = NaiveTime::from_hms_opt(14, 0, 0).unwrap();
        assert!(slots
            .iter()
            .all(|s| s.end_time <= lunch || s.start_time >= lunch_end));
    }

    #[tokio::test]
    async fn generation_is_idempotent() {
        let state = state();
        let doctor = Uuid::new_v4();
        seed_monday_template(&state, doctor).await;

        let generator = SlotGeneratorService::new(&state);
        let first = generator.generate(doctor, monday(), 1, false).await.unwrap();
        let second = generator.generate(doctor, monday(), 1, false).await.unwrap();

        assert_eq!(first.created, 14);
        assert_eq!(second.created, 0);
        assert_eq!(second.kept, 14);

        let first_ids: Vec<Uuid> = first.slots[&monday()].iter().map(|s| s.id).collect();
        let second_ids: Vec<Uuid> = second.slots[&monday()].iter().map(|s| s.id).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn force_regeneration_preserves_booked_slots() {
        let state = state();
        let doctor = Uuid::new_v4();
        seed_monday_template(&state, doctor).await;

        let generator = SlotGeneratorService::new(&state);
        let first = generator.generate(doctor, monday(), 1, false).await.unwrap();
        let booked_id = first.slots[&monday()][0].id;

        state
            .store
            .with_slot(booked_id, |slot| -> Result<(), ScheduleError> {
                slot.current_bookings = 1;
                slot.status = SlotStatus::Booked;
                Ok(())
            })
            .await
            .unwrap();

        let forced = generator.generate(doctor, monday(), 1, true).await.unwrap();
        assert_eq!(forced.skipped_booked, 1);
        assert_eq!(forced.created, 13);

        let survivor = state.store.get_slot(booked_id).await.unwrap();
        assert_eq!(survivor.current_bookings, 1);
        assert_eq!(survivor.status, SlotStatus::Booked);
    }

    #[tokio::test]
    async fn leave_exception_yields_zero_slots() {
        let state = state();
        let doctor = Uuid::new_v4();
        seed_monday_template(&state, doctor).await;

        ScheduleService::new(&state)
            .create_exception(
                doctor,
                CreateExceptionRequest {
                    exception_date: monday(),
                    kind: ExceptionKind::Leave,
                    reason: None,
                },
            )
            .await
            .unwrap();

        let generator = SlotGeneratorService::new(&state);
        let report = generator.generate(doctor, monday(), 1, false).await.unwrap();
        assert_eq!(report.created, 0);
        assert!(report.slots.is_empty());
    }

    #[tokio::test]
    async fn modified_hours_override_applies_to_that_date_only() {
        let state = state();
        let doctor = Uuid::new_v4();
        seed_monday_template(&state, doctor).await;

        ScheduleService::new(&state)
            .create_exception(
                doctor,
                CreateExceptionRequest {
                    exception_date: monday(),
                    kind: ExceptionKind::ModifiedHours {
                        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                        end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                    },
                    reason: None,
                },
            )
            .await
            .unwrap();

        let generator = SlotGeneratorService::new(&state);
        // Covers the overridden Monday and the regular Monday a week later.
        let report = generator.generate(doctor, monday(), 8, false).await.unwrap();

        assert_eq!(report.slots[&monday()].len(), 4);
        assert_eq!(report.slots[&(monday() + Duration::days(7))].len(), 14);
    }

    #[tokio::test]
    async fn batch_generation_covers_all_active_doctors() {
        let state = state();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        seed_monday_template(&state, first).await;
        seed_monday_template(&state, second).await;

        let generator = SlotGeneratorService::new(&state);
        let batch = generator.generate_for_all(monday(), 1, false).await;

        assert_eq!(batch.outcomes.len(), 2);
        assert_eq!(batch.total_created(), 28);
        assert_eq!(batch.failed_doctors(), 0);
    }

    #[tokio::test]
    async fn blocked_slot_rejects_double_blocking() {
        let state = state();
        let doctor = Uuid::new_v4();
        seed_monday_template(&state, doctor).await;

        let generator = SlotGeneratorService::new(&state);
        let report = generator.generate(doctor, monday(), 1, false).await.unwrap();
        let slot_id = report.slots[&monday()][0].id;

        generator.block_slot(slot_id).await.unwrap();
        assert!(generator.block_slot(slot_id).await.is_err());

        let unblocked = generator.unblock_slot(slot_id).await.unwrap();
        assert_eq!(unblocked.status, SlotStatus::Available);
    }
}
