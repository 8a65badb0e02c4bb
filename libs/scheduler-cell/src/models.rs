// libs/scheduler-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// The background jobs the coordinator owns. Each kind runs in exactly
/// one task, so a slow run delays the next one instead of overlapping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ReminderDispatch,
    AutoConfirm,
    NoShowSweep,
    SlotGeneration,
    RetentionCleanup,
}

/// How often a job fires.
#[derive(Debug, Clone, Copy)]
pub enum Cadence {
    Every(std::time::Duration),
    DailyAt(NaiveTime),
}

impl JobKind {
    pub fn all() -> [JobKind; 5] {
        [
            JobKind::ReminderDispatch,
            JobKind::AutoConfirm,
            JobKind::NoShowSweep,
            JobKind::SlotGeneration,
            JobKind::RetentionCleanup,
        ]
    }

    pub fn cadence(&self) -> Cadence {
        match self {
            JobKind::ReminderDispatch => Cadence::Every(std::time::Duration::from_secs(5 * 60)),
            JobKind::AutoConfirm => Cadence::Every(std::time::Duration::from_secs(30 * 60)),
            JobKind::NoShowSweep => Cadence::Every(std::time::Duration::from_secs(15 * 60)),
            // Off-peak daily maintenance windows.
            JobKind::SlotGeneration => {
                Cadence::DailyAt(NaiveTime::from_hms_opt(0, 15, 0).unwrap_or_default())
            }
            JobKind::RetentionCleanup => {
                Cadence::DailyAt(NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default())
            }
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::ReminderDispatch => "reminder_dispatch",
            JobKind::AutoConfirm => "auto_confirm",
            JobKind::NoShowSweep => "no_show_sweep",
            JobKind::SlotGeneration => "slot_generation",
            JobKind::RetentionCleanup => "retention_cleanup",
        };
        write!(f, "{}", name)
    }
}

/// Most recent completed run of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub kind: JobKind,
    pub finished_at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub running: bool,
    pub jobs: Vec<JobRun>,
}
