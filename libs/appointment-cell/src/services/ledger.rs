// libs/appointment-cell/src/services/ledger.rs
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore};
use shared_models::{SlotStatus, TimeSlot};

use crate::models::AppointmentError;

/// The single place slot capacity is mutated. Every operation runs inside
/// the slot collection's write lock, so concurrent bookings against the
/// same slot are serialized: with one unit left, two callers get exactly
/// one success and one `SlotUnavailable`.
pub struct BookingLedger {
    store: Arc<ClinicStore>,
}

impl BookingLedger {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    /// Reserve one capacity unit. The slot flips to `booked` when the last
    /// unit is taken.
    pub async fn reserve(&self, slot_id: Uuid) -> Result<TimeSlot, AppointmentError> {
        self.store
            .with_slot(slot_id, |slot| {
                if slot.status == SlotStatus::Blocked {
                    return Err(AppointmentError::SlotUnavailable);
                }
                if !slot.has_capacity() {
                    return Err(AppointmentError::SlotUnavailable);
                }
                slot.current_bookings += 1;
                if slot.current_bookings == slot.max_bookings {
                    slot.status = SlotStatus::Booked;
                }
                debug!(
                    "Reserved slot {}: {}/{} bookings",
                    slot.id, slot.current_bookings, slot.max_bookings
                );
                Ok(slot.clone())
            })
            .await
    }

    /// Release one capacity unit. A full slot flips back to `available`.
    pub async fn release(&self, slot_id: Uuid) -> Result<TimeSlot, AppointmentError> {
        self.store
            .with_slot(slot_id, |slot| {
                if slot.current_bookings == 0 {
                    warn!("Release requested on slot {} with zero bookings", slot.id);
                    return Ok(slot.clone());
                }
                slot.current_bookings -= 1;
                if slot.status == SlotStatus::Booked {
                    slot.status = SlotStatus::Available;
                }
                debug!(
                    "Released slot {}: {}/{} bookings",
                    slot.id, slot.current_bookings, slot.max_bookings
                );
                Ok(slot.clone())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveTime, Utc};
    use shared_config::AppConfig;

    fn state() -> AppState {
        AppState::new(AppConfig::default())
    }

    async fn seed_slot(state: &AppState, max_bookings: i32) -> Uuid {
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let slot = TimeSlot {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            slot_date: (Utc::now() + Duration::days(7)).date_naive(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            status: SlotStatus::Available,
            current_bookings: 0,
            max_bookings,
            consultation_fee: None,
            created_at: Utc::now(),
        };
        state.store.insert_slot(slot).await.unwrap().id
    }

    #[tokio::test]
    async fn last_unit_flips_slot_to_booked() {
        let state = state();
        let ledger = BookingLedger::new(&state);
        let slot_id = seed_slot(&state, 2).await;

        let after_first = ledger.reserve(slot_id).await.unwrap();
        assert_eq!(after_first.status, SlotStatus::Available);

        let after_second = ledger.reserve(slot_id).await.unwrap();
        assert_eq!(after_second.status, SlotStatus::Booked);
        assert_eq!(after_second.current_bookings, 2);

        let err = ledger.reserve(slot_id).await.unwrap_err();
        assert_matches!(err, AppointmentError::SlotUnavailable);
    }

    #[tokio::test]
    async fn concurrent_reservations_of_last_unit_yield_one_success() {
        let state = state();
        let ledger = BookingLedger::new(&state);
        let slot_id = seed_slot(&state, 1).await;

        let (a, b) = tokio::join!(ledger.reserve(slot_id), ledger.reserve(slot_id));
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let failure = if a.is_err() { a } else { b };
        assert_matches!(failure.unwrap_err(), AppointmentError::SlotUnavailable);

        let slot = state.store.get_slot(slot_id).await.unwrap();
        assert_eq!(slot.current_bookings, 1);
        assert!(slot.current_bookings <= slot.max_bookings);
    }

    #[tokio::test]
    async fn release_reopens_a_full_slot() {
        let state = state();
        let ledger = BookingLedger::new(&state);
        let slot_id = seed_slot(&state, 1).await;

        ledger.reserve(slot_id).await.unwrap();
        let released = ledger.release(slot_id).await.unwrap();
        assert_eq!(released.status, SlotStatus::Available);
        assert_eq!(released.current_bookings, 0);
    }

    #[tokio::test]
    async fn blocked_slot_rejects_reservation() {
        let state = state();
        let ledger = BookingLedger::new(&state);
        let slot_id = seed_slot(&state, 1).await;

        state
            .store
            .with_slot(slot_id, |slot| -> Result<(), AppointmentError> {
                slot.status = SlotStatus::Blocked;
                Ok(())
            })
            .await
            .unwrap();

        let err = ledger.reserve(slot_id).await.unwrap_err();
        assert_matches!(err, AppointmentError::SlotUnavailable);
    }
}
