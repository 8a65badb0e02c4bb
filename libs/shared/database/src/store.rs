use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::{
    Appointment, QueueEntry, Reminder, ReminderKind, ReminderStatus, ScheduleException,
    ScheduleTemplate, TimeSlot,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("duplicate {0}")]
    Duplicate(&'static str),
}

#[derive(Default)]
struct SlotTable {
    by_id: HashMap<Uuid, TimeSlot>,
    // (doctor, date, start) uniqueness index
    by_key: HashMap<(Uuid, NaiveDate, NaiveTime), Uuid>,
}

#[derive(Default)]
struct ReminderTable {
    by_id: HashMap<Uuid, Reminder>,
    // (appointment, kind) uniqueness index
    by_key: HashMap<(Uuid, ReminderKind), Uuid>,
}

/// In-process data store for all scheduling collections.
///
/// Slots are memory-resident; `with_slot` runs the caller's mutation under
/// the collection write lock, which serializes capacity changes per slot.
pub struct ClinicStore {
    templates: RwLock<HashMap<(Uuid, u8), ScheduleTemplate>>,
    exceptions: RwLock<HashMap<(Uuid, NaiveDate), ScheduleException>>,
    slots: RwLock<SlotTable>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    queue: RwLock<HashMap<Uuid, QueueEntry>>,
    reminders: RwLock<ReminderTable>,
}

impl ClinicStore {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            exceptions: RwLock::new(HashMap::new()),
            slots: RwLock::new(SlotTable::default()),
            appointments: RwLock::new(HashMap::new()),
            queue: RwLock::new(HashMap::new()),
            reminders: RwLock::new(ReminderTable::default()),
        }
    }

    // ==========================================================================
    // SCHEDULE TEMPLATES
    // ==========================================================================

    /// Insert or replace the template for (doctor, weekday).
    pub async fn upsert_template(&self, template: ScheduleTemplate) -> ScheduleTemplate {
        let mut templates = self.templates.write().await;
        let key = (template.doctor_id, template.day_of_week);
        templates.insert(key, template.clone());
        template
    }

    pub async fn active_template(&self, doctor_id: Uuid, day_of_week: u8) -> Option<ScheduleTemplate> {
        let templates = self.templates.read().await;
        templates
            .get(&(doctor_id, day_of_week))
            .filter(|t| t.is_active)
            .cloned()
    }

    pub async fn weekly_schedule(&self, doctor_id: Uuid) -> Vec<ScheduleTemplate> {
        let templates = self.templates.read().await;
        let mut result: Vec<ScheduleTemplate> = templates
            .values()
            .filter(|t| t.doctor_id == doctor_id && t.is_active)
            .cloned()
            .collect();
        result.sort_by_key(|t| t.day_of_week);
        result
    }

    pub async fn doctors_with_active_templates(&self) -> Vec<Uuid> {
        let templates = self.templates.read().await;
        let mut doctors: Vec<Uuid> = templates
            .values()
            .filter(|t| t.is_active)
            .map(|t| t.doctor_id)
            .collect();
        doctors.sort();
        doctors.dedup();
        doctors
    }

    // ==========================================================================
    // SCHEDULE EXCEPTIONS
    // ==========================================================================

    /// Insert or replace the exception for (doctor, date).
    pub async fn upsert_exception(&self, exception: ScheduleException) -> ScheduleException {
        let mut exceptions = self.exceptions.write().await;
        let key = (exception.doctor_id, exception.exception_date);
        exceptions.insert(key, exception.clone());
        exception
    }

    pub async fn exception_on(&self, doctor_id: Uuid, date: NaiveDate) -> Option<ScheduleException> {
        let exceptions = self.exceptions.read().await;
        exceptions.get(&(doctor_id, date)).cloned()
    }

    pub async fn exceptions_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<ScheduleException> {
        let exceptions = self.exceptions.read().await;
        let mut result: Vec<ScheduleException> = exceptions
            .values()
            .filter(|e| e.doctor_id == doctor_id && e.exception_date >= from && e.exception_date <= to)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.exception_date);
        result
    }

    // ==========================================================================
    // TIME SLOTS
    // ==========================================================================

    pub async fn insert_slot(&self, slot: TimeSlot) -> Result<TimeSlot, StoreError> {
        let mut slots = self.slots.write().await;
        let key = (slot.doctor_id, slot.slot_date, slot.start_time);
        if slots.by_key.contains_key(&key) {
            return Err(StoreError::Duplicate("time slot"));
        }
        slots.by_key.insert(key, slot.id);
        slots.by_id.insert(slot.id, slot.clone());
        Ok(slot)
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<TimeSlot, StoreError> {
        let slots = self.slots.read().await;
        slots
            .by_id
            .get(&slot_id)
            .cloned()
            .ok_or(StoreError::NotFound("time slot"))
    }

    pub async fn find_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Option<TimeSlot> {
        let slots = self.slots.read().await;
        slots
            .by_key
            .get(&(doctor_id, date, start_time))
            .and_then(|id| slots.by_id.get(id))
            .cloned()
    }

    pub async fn slots_for_day(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<TimeSlot> {
        let slots = self.slots.read().await;
        let mut result: Vec<TimeSlot> = slots
            .by_id
            .values()
            .filter(|s| s.doctor_id == doctor_id && s.slot_date == date)
            .cloned()
            .collect();
        result.sort_by_key(|s| s.start_time);
        result
    }

    /// Run `f` against the slot under the collection write lock. All capacity
    /// and status mutations go through here so concurrent callers are
    /// serialized per slot.
    pub async fn with_slot<T, E>(
        &self,
        slot_id: Uuid,
        f: impl FnOnce(&mut TimeSlot) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut slots = self.slots.write().await;
        let slot = slots
            .by_id
            .get_mut(&slot_id)
            .ok_or(StoreError::NotFound("time slot"))?;
        f(slot)
    }

    /// Remove the slot only if it has no bookings. Returns whether it was
    /// removed; a slot that gained a booking concurrently is left untouched.
    pub async fn remove_slot_if_unbooked(&self, slot_id: Uuid) -> Result<bool, StoreError> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .by_id
            .get(&slot_id)
            .ok_or(StoreError::NotFound("time slot"))?;
        if slot.current_bookings > 0 {
            return Ok(false);
        }
        let key = (slot.doctor_id, slot.slot_date, slot.start_time);
        slots.by_key.remove(&key);
        slots.by_id.remove(&slot_id);
        Ok(true)
    }

    /// Delete slots dated strictly before `cutoff`. Used by retention cleanup.
    pub async fn purge_slots_before(&self, cutoff: NaiveDate) -> usize {
        let mut slots = self.slots.write().await;
        let stale: Vec<Uuid> = slots
            .by_id
            .values()
            .filter(|s| s.slot_date < cutoff)
            .map(|s| s.id)
            .collect();
        for id in &stale {
            if let Some(slot) = slots.by_id.remove(id) {
                slots
                    .by_key
                    .remove(&(slot.doctor_id, slot.slot_date, slot.start_time));
            }
        }
        debug!("Purged {} slots before {}", stale.len(), cutoff);
        stale.len()
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    pub async fn insert_appointment(&self, appointment: Appointment) -> Appointment {
        let mut appointments = self.appointments.write().await;
        appointments.insert(appointment.id, appointment.clone());
        appointment
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, StoreError> {
        let appointments = self.appointments.read().await;
        appointments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("appointment"))
    }

    /// Run `f` against the appointment under the collection write lock so a
    /// status transition is atomic per row.
    pub async fn with_appointment<T, E>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Appointment) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or(StoreError::NotFound("appointment"))?;
        f(appointment)
    }

    pub async fn appointments_matching(
        &self,
        pred: impl Fn(&Appointment) -> bool,
    ) -> Vec<Appointment> {
        let appointments = self.appointments.read().await;
        appointments.values().filter(|a| pred(a)).cloned().collect()
    }

    // ==========================================================================
    // DAY QUEUE
    // ==========================================================================

    pub async fn insert_queue_entry(&self, entry: QueueEntry) -> QueueEntry {
        let mut queue = self.queue.write().await;
        queue.insert(entry.id, entry.clone());
        entry
    }

    pub async fn queue_for_day(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<QueueEntry> {
        let queue = self.queue.read().await;
        let mut result: Vec<QueueEntry> = queue
            .values()
            .filter(|e| e.doctor_id == doctor_id && e.queue_date == date)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.position);
        result
    }

    pub async fn next_queue_position(&self, doctor_id: Uuid, date: NaiveDate) -> i32 {
        let queue = self.queue.read().await;
        queue
            .values()
            .filter(|e| e.doctor_id == doctor_id && e.queue_date == date)
            .map(|e| e.position)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub async fn with_queue_entry<T, E>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut QueueEntry) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut queue = self.queue.write().await;
        let entry = queue.get_mut(&id).ok_or(StoreError::NotFound("queue entry"))?;
        f(entry)
    }

    /// Delete queue entries dated strictly before `cutoff`.
    pub async fn purge_queue_before(&self, cutoff: NaiveDate) -> usize {
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|_, e| e.queue_date >= cutoff);
        before - queue.len()
    }

    // ==========================================================================
    // REMINDERS
    // ==========================================================================

    /// Insert a reminder, enforcing at most one per (appointment, kind).
    pub async fn insert_reminder(&self, reminder: Reminder) -> Result<Reminder, StoreError> {
        let mut reminders = self.reminders.write().await;
        let key = (reminder.appointment_id, reminder.kind);
        if reminders.by_key.contains_key(&key) {
            return Err(StoreError::Duplicate("reminder"));
        }
        reminders.by_key.insert(key, reminder.id);
        reminders.by_id.insert(reminder.id, reminder.clone());
        Ok(reminder)
    }

    pub async fn get_reminder(&self, id: Uuid) -> Result<Reminder, StoreError> {
        let reminders = self.reminders.read().await;
        reminders
            .by_id
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("reminder"))
    }

    pub async fn with_reminder<T, E>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Reminder) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .by_id
            .get_mut(&id)
            .ok_or(StoreError::NotFound("reminder"))?;
        f(reminder)
    }

    pub async fn reminders_matching(&self, pred: impl Fn(&Reminder) -> bool) -> Vec<Reminder> {
        let reminders = self.reminders.read().await;
        reminders.by_id.values().filter(|r| pred(r)).cloned().collect()
    }

    pub async fn reminders_for_appointment(&self, appointment_id: Uuid) -> Vec<Reminder> {
        let reminders = self.reminders.read().await;
        let mut result: Vec<Reminder> = reminders
            .by_id
            .values()
            .filter(|r| r.appointment_id == appointment_id)
            .cloned()
            .collect();
        result.sort_by_key(|r| r.scheduled_time);
        result
    }

    /// Delete sent/failed reminders created before `cutoff`.
    pub async fn purge_reminders_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut reminders = self.reminders.write().await;
        let stale: Vec<Uuid> = reminders
            .by_id
            .values()
            .filter(|r| r.status != ReminderStatus::Pending && r.created_at < cutoff)
            .map(|r| r.id)
            .collect();
        for id in &stale {
            if let Some(r) = reminders.by_id.remove(id) {
                reminders.by_key.remove(&(r.appointment_id, r.kind));
            }
        }
        stale.len()
    }
}

impl Default for ClinicStore {
    fn default() -> Self {
        Self::new()
    }
}
