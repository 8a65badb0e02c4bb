// libs/scheduler-cell/src/services/coordinator.rs
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use appointment_cell::{AppointmentLifecycleService, AppointmentQueueService};
use reminder_cell::services::{ReminderDispatchService, ReminderSchedulerService};
use schedule_cell::services::SlotGeneratorService;
use shared_database::AppState;

use crate::models::{Cadence, CoordinatorStatus, JobKind, JobRun};

const DISPATCH_BATCH_SIZE: usize = 100;

/// Owns the five background jobs. One task per job: runs of the same
/// job never overlap, and a tick that lands while a run is still in
/// flight is skipped rather than queued.
pub struct JobCoordinator {
    state: Arc<AppState>,
    running: Arc<RwLock<bool>>,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    runs: Arc<RwLock<HashMap<JobKind, JobRun>>>,
}

impl JobCoordinator {
    pub fn new(state: Arc<AppState>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            state,
            running: Arc::new(RwLock::new(false)),
            shutdown,
            handles: Mutex::new(Vec::new()),
            runs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Spawn all job loops. Returns `false` without touching anything
    /// when the coordinator is already running.
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.write().await;
        if *running {
            debug!("Job coordinator already running, start ignored");
            return false;
        }
        *running = true;

        let mut handles = self.handles.lock().await;
        for kind in JobKind::all() {
            let coordinator = Arc::clone(self);
            // Subscribed here, before `start` returns, so no loop can miss
            // a shutdown signal sent later.
            let shutdown = self.shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                coordinator.job_loop(kind, shutdown).await;
            }));
        }

        info!("Job coordinator started with {} jobs", handles.len());
        true
    }

    /// Stop all job loops. No new runs start, and a run already in flight
    /// finishes before this returns. Returns `false` when already stopped.
    #[instrument(skip(self))]
    pub async fn stop(self: &Arc<Self>) -> bool {
        let mut running = self.running.write().await;
        if !*running {
            debug!("Job coordinator already stopped, stop ignored");
            return false;
        }
        *running = false;
        drop(running);

        // Wakes idle loops; a loop mid-run sees the signal after its run.
        let _ = self.shutdown.send(true);

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("Job loop ended abnormally: {}", e);
            }
        }

        info!("Job coordinator stopped");
        true
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let running = *self.running.read().await;
        let runs = self.runs.read().await;
        let mut jobs: Vec<JobRun> = runs.values().cloned().collect();
        jobs.sort_by_key(|r| r.finished_at);
        CoordinatorStatus { running, jobs }
    }

    async fn job_loop(self: Arc<Self>, kind: JobKind, mut shutdown: watch::Receiver<bool>) {
        match kind.cadence() {
            Cadence::Every(period) => {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = shutdown.changed() => break,
                    }
                    if !*self.running.read().await {
                        break;
                    }
                    self.run_job(kind).await;
                }
            }
            Cadence::DailyAt(at) => loop {
                let wait = until_next_occurrence(Utc::now(), at);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.changed() => break,
                }
                if !*self.running.read().await {
                    break;
                }
                self.run_job(kind).await;
            },
        }
        debug!("Job loop ended: {}", kind);
    }

    /// Execute a single run of a job and record its outcome. Failures
    /// inside a run never take the loop down.
    pub async fn run_job(&self, kind: JobKind) -> JobRun {
        let now = Utc::now();
        let summary = match kind {
            JobKind::ReminderDispatch => {
                let dispatcher = ReminderDispatchService::new(&self.state);
                let stats = dispatcher.process_due(now, DISPATCH_BATCH_SIZE).await;
                format!(
                    "processed {} reminders ({} sent, {} failed)",
                    stats.processed, stats.sent, stats.failed
                )
            }
            JobKind::AutoConfirm => {
                let lifecycle = AppointmentLifecycleService::new(&self.state);
                let stats = lifecycle.auto_confirm_due(now).await;
                format!(
                    "confirmed {} of {} pending appointments ({} failed)",
                    stats.transitioned, stats.examined, stats.failed
                )
            }
            JobKind::NoShowSweep => {
                let lifecycle = AppointmentLifecycleService::new(&self.state);
                let stats = lifecycle.sweep_no_shows(now).await;
                format!(
                    "marked {} of {} overdue appointments as no-show ({} failed)",
                    stats.transitioned, stats.examined, stats.failed
                )
            }
            JobKind::SlotGeneration => {
                let generator = SlotGeneratorService::new(&self.state);
                let start = now.date_naive() + Duration::days(1);
                let report = generator
                    .generate_for_all(start, self.state.config.generation_horizon_days, false)
                    .await;
                if report.failed_doctors() > 0 {
                    warn!(
                        "Slot generation failed for {} doctors",
                        report.failed_doctors()
                    );
                }
                format!(
                    "created {} slots for {} doctors ({} failed)",
                    report.total_created(),
                    report.outcomes.len(),
                    report.failed_doctors()
                )
            }
            JobKind::RetentionCleanup => {
                let config = &self.state.config;
                let today = now.date_naive();
                let slots = self
                    .state
                    .store
                    .purge_slots_before(today - Duration::days(config.slot_retention_days))
                    .await;
                let reminders = ReminderSchedulerService::new(&self.state)
                    .purge_old(now - Duration::days(config.reminder_retention_days))
                    .await;
                let queue = AppointmentQueueService::new(&self.state)
                    .purge_past(today - Duration::days(config.queue_retention_days))
                    .await;
                format!(
                    "purged {} slots, {} reminders, {} queue entries",
                    slots, reminders, queue
                )
            }
        };

        debug!("Job {} finished: {}", kind, summary);
        let run = JobRun {
            kind,
            finished_at: Utc::now(),
            summary,
        };
        self.runs.write().await.insert(kind, run.clone());
        run
    }
}

/// Wall-clock delay until the next daily occurrence of `at` (UTC).
fn until_next_occurrence(now: DateTime<Utc>, at: NaiveTime) -> StdDuration {
    let today = now.date_naive().and_time(at);
    let target = if today > now.naive_utc() {
        today
    } else {
        today + Duration::days(1)
    };
    let target = Utc.from_utc_datetime(&target);
    (target - now).to_std().unwrap_or(StdDuration::ZERO)
}
