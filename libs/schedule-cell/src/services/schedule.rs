// libs/schedule-cell/src/services/schedule.rs
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore};
use shared_models::{DayWindow, ExceptionKind, ScheduleException, ScheduleTemplate};

use crate::models::{CreateExceptionRequest, DayAvailability, ScheduleError, UpsertTemplateRequest};

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub struct ScheduleService {
    store: Arc<ClinicStore>,
}

impl ScheduleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    /// Create or replace the weekly template for (doctor, weekday).
    pub async fn upsert_template(
        &self,
        doctor_id: Uuid,
        request: UpsertTemplateRequest,
    ) -> Result<ScheduleTemplate, ScheduleError> {
        debug!("Upserting template for doctor {} day {}", doctor_id, request.day_of_week);

        if request.day_of_week > 6 {
            return Err(ScheduleError::InvalidDayOfWeek(request.day_of_week));
        }
        if request.start_time >= request.end_time {
            return Err(ScheduleError::InvalidWindow(
                "start time must be before end time".to_string(),
            ));
        }

        let slot_duration = request.slot_duration_minutes.unwrap_or(30);
        if slot_duration <= 0 {
            return Err(ScheduleError::InvalidWindow(
                "slot duration must be positive".to_string(),
            ));
        }
        let max_patients = request.max_patients_per_slot.unwrap_or(1);
        if max_patients < 1 {
            return Err(ScheduleError::InvalidWindow(
                "max patients per slot must be at least 1".to_string(),
            ));
        }

        match (request.break_start, request.break_end) {
            (None, None) => {}
            (Some(bs), Some(be)) => {
                if !(request.start_time < bs && bs < be && be < request.end_time) {
                    return Err(ScheduleError::InvalidWindow(
                        "break window must fall strictly inside working hours".to_string(),
                    ));
                }
            }
            _ => {
                return Err(ScheduleError::InvalidWindow(
                    "break start and break end must be set together".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let template = ScheduleTemplate {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            break_start: request.break_start,
            break_end: request.break_end,
            slot_duration_minutes: slot_duration,
            max_patients_per_slot: max_patients,
            consultation_fee: request.consultation_fee,
            is_active: request.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.upsert_template(template).await;
        info!(
            "Stored schedule template for doctor {} on {}",
            doctor_id, DAY_NAMES[stored.day_of_week as usize]
        );
        Ok(stored)
    }

    /// Create or replace the exception for (doctor, date).
    pub async fn create_exception(
        &self,
        doctor_id: Uuid,
        request: CreateExceptionRequest,
    ) -> Result<ScheduleException, ScheduleError> {
        if let ExceptionKind::ModifiedHours { start_time, end_time } = &request.kind {
            if start_time >= end_time {
                return Err(ScheduleError::InvalidWindow(
                    "override start time must be before end time".to_string(),
                ));
            }
        }

        let exception = ScheduleException {
            id: Uuid::new_v4(),
            doctor_id,
            exception_date: request.exception_date,
            kind: request.kind,
            reason: request.reason.unwrap_or_default(),
            created_at: Utc::now(),
        };

        let stored = self.store.upsert_exception(exception).await;
        info!(
            "Stored schedule exception for doctor {} on {}",
            doctor_id, stored.exception_date
        );
        Ok(stored)
    }

    pub async fn weekly_schedule(&self, doctor_id: Uuid) -> Vec<ScheduleTemplate> {
        self.store.weekly_schedule(doctor_id).await
    }

    pub async fn upcoming_exceptions(
        &self,
        doctor_id: Uuid,
        days: i64,
    ) -> Vec<ScheduleException> {
        let today = Utc::now().date_naive();
        self.store
            .exceptions_between(doctor_id, today, today + Duration::days(days))
            .await
    }

    /// Resolve the effective bookable window for one date.
    ///
    /// Exception precedence: `leave` suppresses the day entirely;
    /// `modified_hours` substitutes its window (no break) and inherits slot
    /// sizing from the base weekday template when one exists.
    pub async fn resolve_window(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Option<DayWindow> {
        let weekday = date.weekday().num_days_from_monday() as u8;

        if let Some(exception) = self.store.exception_on(doctor_id, date).await {
            return match exception.kind {
                ExceptionKind::Leave => None,
                ExceptionKind::ModifiedHours { start_time, end_time } => {
                    let base = self.store.active_template(doctor_id, weekday).await;
                    Some(DayWindow {
                        start_time,
                        end_time,
                        break_start: None,
                        break_end: None,
                        slot_duration_minutes: base
                            .as_ref()
                            .map(|t| t.slot_duration_minutes)
                            .unwrap_or(30),
                        max_patients_per_slot: base
                            .as_ref()
                            .map(|t| t.max_patients_per_slot)
                            .unwrap_or(1),
                        consultation_fee: base.and_then(|t| t.consultation_fee),
                    })
                }
            };
        }

        self.store
            .active_template(doctor_id, weekday)
            .await
            .map(|t| DayWindow {
                start_time: t.start_time,
                end_time: t.end_time,
                break_start: t.break_start,
                break_end: t.break_end,
                slot_duration_minutes: t.slot_duration_minutes,
                max_patients_per_slot: t.max_patients_per_slot,
                consultation_fee: t.consultation_fee,
            })
    }

    /// List which dates are bookable, with a reason for the ones that are not.
    pub async fn available_days(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        days: u32,
    ) -> Vec<DayAvailability> {
        let mut result = Vec::with_capacity(days as usize);

        for offset in 0..days {
            let date = start_date + Duration::days(offset as i64);
            let weekday = date.weekday().num_days_from_monday() as usize;

            let (is_available, reason) = match self.store.exception_on(doctor_id, date).await {
                Some(exception) => match exception.kind {
                    ExceptionKind::Leave => {
                        let why = if exception.reason.is_empty() {
                            "Not specified".to_string()
                        } else {
                            exception.reason.clone()
                        };
                        (false, Some(format!("Doctor is on leave: {}", why)))
                    }
                    ExceptionKind::ModifiedHours { .. } => (true, None),
                },
                None => {
                    if self.store.active_template(doctor_id, weekday as u8).await.is_some() {
                        (true, None)
                    } else {
                        (
                            false,
                            Some(format!("Doctor does not work on {}", DAY_NAMES[weekday])),
                        )
                    }
                }
            };

            result.push(DayAvailability {
                date,
                day_name: DAY_NAMES[weekday].to_string(),
                is_available,
                reason,
            });
        }

        result
    }
}
