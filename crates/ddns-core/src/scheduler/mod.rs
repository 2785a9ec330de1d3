//! Periodic trigger for the reconciliation engine
//!
//! The scheduler is created once at startup and owns two jobs:
//! - **reconcile**: calls [`ReconciliationEngine::run()`] on its trigger
//! - **heartbeat**: logs a liveness line on its own trigger
//!
//! ## Overlap Guard
//!
//! Each reconcile tick spawns a run that holds a mutex for its whole
//! duration. A tick that finds the mutex held is skipped (and counted), so at
//! most one run is ever in flight.
//!
//! ## Lifecycle
//!
//! 1. Create with [`Scheduler::new()`]
//! 2. Start with [`Scheduler::start()`], which returns a [`SchedulerHandle`]
//! 3. Stop with [`SchedulerHandle::stop()`]; an in-flight run is allowed to
//!    finish (every outbound call is bounded by a timeout)

use crate::config::ReconciliationConfig;
use crate::engine::{ReconciliationEngine, RunOutcome};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default reconcile schedule: every five minutes
pub const DEFAULT_RECONCILE_SCHEDULE: &str = "0 */5 * * * *";

/// Default heartbeat schedule: every minute
pub const DEFAULT_HEARTBEAT_SCHEDULE: &str = "0 * * * * *";

/// When a job fires
#[derive(Clone)]
pub enum Trigger {
    /// Fixed delay between firings
    Every(Duration),
    /// Cron expression (six fields, seconds first)
    Cron {
        /// Source expression, kept for logging
        expression: String,
        /// Parsed schedule
        schedule: Box<Schedule>,
    },
}

impl Trigger {
    /// Parse a cron expression
    pub fn cron(expression: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expression.trim()).map_err(|e| {
            Error::config(format!("Invalid cron expression {:?}: {}", expression, e))
        })?;

        Ok(Trigger::Cron {
            expression: expression.trim().to_string(),
            schedule: Box::new(schedule),
        })
    }
}

/// A trigger plus the last cron instant it fired for
struct Ticker {
    trigger: Trigger,
    last_fired: Option<DateTime<Utc>>,
}

impl Ticker {
    fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            last_fired: None,
        }
    }

    /// Delay until the next firing; that firing is consumed
    ///
    /// Returns `None` if a cron schedule has no upcoming firing.
    fn next_delay(&mut self) -> Option<Duration> {
        match &self.trigger {
            Trigger::Every(period) => Some(*period),
            Trigger::Cron { schedule, .. } => {
                let now = Utc::now();
                let next = next_cron_firing(schedule, self.last_fired, now)?;
                self.last_fired = Some(next);
                Some((next - now).to_std().unwrap_or_default())
            }
        }
    }
}

/// Next cron instant strictly after both `now` and the last one fired
///
/// A wall clock lagging the timer must not yield the same instant twice.
fn next_cron_firing(
    schedule: &Schedule,
    last_fired: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let from = last_fired.map_or(now, |last| last.max(now));
    schedule.after(&from).next()
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Every(period) => write!(f, "every {:?}", period),
            Trigger::Cron { expression, .. } => write!(f, "cron({})", expression),
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    /// When reconciliation runs
    pub reconcile: Trigger,

    /// When the heartbeat is logged
    pub heartbeat: Trigger,

    /// Run once immediately on start, before the first trigger fires
    pub run_on_start: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            reconcile: Trigger::Every(Duration::from_secs(300)),
            heartbeat: Trigger::Every(Duration::from_secs(60)),
            run_on_start: true,
        }
    }
}

/// Counters shared between the jobs and the handle
#[derive(Debug, Default)]
struct SchedulerStats {
    runs_started: AtomicU64,
    runs_finished: AtomicU64,
    ticks_skipped: AtomicU64,
}

/// Process-scoped scheduler for the reconciliation engine
pub struct Scheduler {
    engine: Arc<ReconciliationEngine>,
    config: Arc<ReconciliationConfig>,
    settings: ScheduleSettings,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Parameters
    ///
    /// - `engine`: engine to run on every tick
    /// - `config`: input passed to every run
    /// - `settings`: triggers and start behaviour
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        config: Arc<ReconciliationConfig>,
        settings: ScheduleSettings,
    ) -> Self {
        Self {
            engine,
            config,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Start both jobs
    pub fn start(self) -> SchedulerHandle {
        info!(
            reconcile = %self.settings.reconcile,
            heartbeat = %self.settings.heartbeat,
            run_on_start = self.settings.run_on_start,
            "Starting scheduler"
        );

        let stats = Arc::new(SchedulerStats::default());

        let reconcile = tokio::spawn(reconcile_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.config),
            self.settings.reconcile.clone(),
            self.settings.run_on_start,
            self.shutdown.clone(),
            Arc::clone(&stats),
        ));

        let heartbeat = tokio::spawn(heartbeat_loop(
            self.settings.heartbeat.clone(),
            self.shutdown.clone(),
            Arc::clone(&stats),
        ));

        SchedulerHandle {
            shutdown: self.shutdown,
            reconcile,
            heartbeat,
            stats,
        }
    }
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    shutdown: CancellationToken,
    reconcile: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
    stats: Arc<SchedulerStats>,
}

impl SchedulerHandle {
    /// Number of runs started so far
    pub fn runs_started(&self) -> u64 {
        self.stats.runs_started.load(Ordering::SeqCst)
    }

    /// Number of runs finished so far
    pub fn runs_finished(&self) -> u64 {
        self.stats.runs_finished.load(Ordering::SeqCst)
    }

    /// Number of ticks skipped because a run was still in flight
    pub fn ticks_skipped(&self) -> u64 {
        self.stats.ticks_skipped.load(Ordering::SeqCst)
    }

    /// Stop both jobs and wait for them (and any in-flight run) to finish
    pub async fn stop(self) {
        info!("Stopping scheduler");
        self.shutdown.cancel();

        if let Err(e) = self.reconcile.await {
            error!("Reconcile job ended abnormally: {}", e);
        }
        if let Err(e) = self.heartbeat.await {
            error!("Heartbeat job ended abnormally: {}", e);
        }

        info!(
            runs = self.stats.runs_finished.load(Ordering::SeqCst),
            skipped = self.stats.ticks_skipped.load(Ordering::SeqCst),
            "Scheduler stopped"
        );
    }
}

async fn reconcile_loop(
    engine: Arc<ReconciliationEngine>,
    config: Arc<ReconciliationConfig>,
    trigger: Trigger,
    run_on_start: bool,
    shutdown: CancellationToken,
    stats: Arc<SchedulerStats>,
) {
    let mut ticker = Ticker::new(trigger);
    let guard = Arc::new(Mutex::new(()));
    let mut in_flight: Option<JoinHandle<()>> = None;

    if run_on_start {
        in_flight = spawn_run(&engine, &config, &guard, &stats);
    }

    loop {
        let Some(delay) = ticker.next_delay() else {
            warn!(trigger = %ticker.trigger, "Reconcile schedule has no upcoming firing, stopping job");
            break;
        };
        debug!("Next reconciliation in {:?}", delay);

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Reconcile job: shutting down");
                break;
            }
            _ = tokio::time::sleep(delay) => {
                if let Some(handle) = spawn_run(&engine, &config, &guard, &stats) {
                    in_flight = Some(handle);
                }
            }
        }
    }

    if let Some(handle) = in_flight {
        if !handle.is_finished() {
            info!("Waiting for in-flight reconciliation to finish");
        }
        if let Err(e) = handle.await {
            error!("Reconciliation task ended abnormally: {}", e);
        }
    }
}

/// Spawn one run unless the previous one still holds the guard
fn spawn_run(
    engine: &Arc<ReconciliationEngine>,
    config: &Arc<ReconciliationConfig>,
    guard: &Arc<Mutex<()>>,
    stats: &Arc<SchedulerStats>,
) -> Option<JoinHandle<()>> {
    let Ok(permit) = Arc::clone(guard).try_lock_owned() else {
        stats.ticks_skipped.fetch_add(1, Ordering::SeqCst);
        warn!("Previous reconciliation still running, skipping this tick");
        return None;
    };

    let engine = Arc::clone(engine);
    let config = Arc::clone(config);
    let stats = Arc::clone(stats);

    Some(tokio::spawn(async move {
        let _permit = permit;
        stats.runs_started.fetch_add(1, Ordering::SeqCst);

        let report = engine.run(&config).await;
        let elapsed = report.finished_at - report.started_at;

        match &report.outcome {
            RunOutcome::Completed => info!(
                elapsed_ms = elapsed.num_milliseconds(),
                updated = report.updated_count(),
                failed = report.failed_count(),
                "Reconciliation completed"
            ),
            RunOutcome::Aborted { stage, .. } => warn!(
                elapsed_ms = elapsed.num_milliseconds(),
                stage = %stage,
                "Reconciliation aborted"
            ),
        }

        stats.runs_finished.fetch_add(1, Ordering::SeqCst);
    }))
}

async fn heartbeat_loop(trigger: Trigger, shutdown: CancellationToken, stats: Arc<SchedulerStats>) {
    let mut ticker = Ticker::new(trigger);
    let started = tokio::time::Instant::now();

    loop {
        let Some(delay) = ticker.next_delay() else {
            warn!(trigger = %ticker.trigger, "Heartbeat schedule has no upcoming firing, stopping job");
            break;
        };

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Heartbeat job: shutting down");
                break;
            }
            _ = tokio::time::sleep(delay) => {
                info!(
                    uptime_secs = started.elapsed().as_secs(),
                    runs = stats.runs_finished.load(Ordering::SeqCst),
                    "Heartbeat: still alive"
                );
            }
        }
    }
}
