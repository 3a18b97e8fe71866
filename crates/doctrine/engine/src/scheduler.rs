//! Background scan scheduler.

use crate::config::SchedulerConfig;
use crate::engine::GovernanceEngine;
use crate::kill_switch::KillSwitch;
use chrono::{DateTime, Utc};
use doctrine_pde::{HistoryProvider, UserDirectory};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Outcome of one scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub eligible_users: usize,
    pub scanned: Vec<String>,
    pub overlays_created: usize,
    pub failures: usize,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Started,
    SkippedDisabled,
    SkippedBusy,
}

/// Scheduler counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub skipped_disabled: u64,
    pub skipped_busy: u64,
    pub user_failures: u64,
    pub last_cycle: Option<CycleReport>,
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    skipped_disabled: AtomicU64,
    skipped_busy: AtomicU64,
    user_failures: AtomicU64,
}

/// Clears the in-flight flag when a cycle ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Next batch from a rotating cursor over `users`; wraps at the end.
pub(crate) fn select_batch(users: &[String], cursor: &mut usize, batch_size: usize) -> Vec<String> {
    if users.is_empty() || batch_size == 0 {
        *cursor = 0;
        return Vec::new();
    }
    let start = *cursor % users.len();
    let take = batch_size.min(users.len());
    let batch = (0..take)
        .map(|i| users[(start + i) % users.len()].clone())
        .collect();
    *cursor = (start + take) % users.len();
    batch
}

/// Periodically scans a batch of users and feeds their alerts to the
/// overlay gates. At most one cycle runs at a time; a tick that finds a
/// cycle in flight is skipped, never queued.
pub struct ScanScheduler {
    engine: Arc<GovernanceEngine>,
    history: Arc<dyn HistoryProvider>,
    directory: Arc<dyn UserDirectory>,
    config: SchedulerConfig,
    in_flight: Arc<AtomicBool>,
    cursor: Mutex<usize>,
    counters: Counters,
    last_cycle: Mutex<Option<CycleReport>>,
}

impl ScanScheduler {
    pub fn new(
        engine: Arc<GovernanceEngine>,
        history: Arc<dyn HistoryProvider>,
        directory: Arc<dyn UserDirectory>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            history,
            directory,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
            cursor: Mutex::new(0),
            counters: Counters::default(),
            last_cycle: Mutex::new(None),
        })
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            skipped_disabled: self.counters.skipped_disabled.load(Ordering::Relaxed),
            skipped_busy: self.counters.skipped_busy.load(Ordering::Relaxed),
            user_failures: self.counters.user_failures.load(Ordering::Relaxed),
            last_cycle: self
                .last_cycle
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone(),
        }
    }

    pub fn is_running_cycle(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<InFlight, TickOutcome> {
        if !self.engine.is_enabled(KillSwitch::Pde) {
            self.counters.skipped_disabled.fetch_add(1, Ordering::Relaxed);
            debug!("Pattern detection switched off, skipping scan cycle");
            return Err(TickOutcome::SkippedDisabled);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.skipped_busy.fetch_add(1, Ordering::Relaxed);
            debug!("Previous scan cycle still running, skipping tick");
            return Err(TickOutcome::SkippedBusy);
        }
        Ok(InFlight(self.in_flight.clone()))
    }

    /// Start a cycle in the background unless switched off or busy.
    pub fn tick(self: &Arc<Self>) -> TickOutcome {
        let guard = match self.acquire() {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };
        let scheduler = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            scheduler.run_cycle().await;
        });
        TickOutcome::Started
    }

    /// Run a cycle inline, subject to the same switch and overlap guard.
    pub async fn run_once(&self) -> Result<CycleReport, TickOutcome> {
        let _guard = self.acquire()?;
        Ok(self.run_cycle().await)
    }

    async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        let batch_size = self.engine.thresholds().scan_batch_size;
        let user_timeout = Duration::from_secs(self.config.user_timeout_secs);

        let users = match self.directory.eligible_users().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Failed to list eligible users");
                Vec::new()
            }
        };
        let batch = {
            let mut cursor = self.cursor.lock().unwrap_or_else(|p| p.into_inner());
            select_batch(&users, &mut cursor, batch_size)
        };

        let mut overlays_created = 0;
        let mut failures = 0;
        for user_id in &batch {
            match tokio::time::timeout(user_timeout, self.scan_user(user_id)).await {
                Ok(Ok(created)) => overlays_created += created,
                Ok(Err(reason)) => {
                    failures += 1;
                    warn!(user_id = %user_id, error = %reason, "User scan failed");
                }
                Err(_) => {
                    failures += 1;
                    warn!(
                        user_id = %user_id,
                        timeout_secs = user_timeout.as_secs(),
                        "User scan timed out"
                    );
                }
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            eligible_users: users.len(),
            scanned: batch,
            overlays_created,
            failures,
        };
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        self.counters
            .user_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
        info!(
            eligible = report.eligible_users,
            scanned = report.scanned.len(),
            overlays = overlays_created,
            failures,
            "Scan cycle complete"
        );
        *self.last_cycle.lock().unwrap_or_else(|p| p.into_inner()) = Some(report.clone());
        report
    }

    async fn scan_user(&self, user_id: &str) -> Result<usize, String> {
        let history = self
            .history
            .fetch_history(user_id)
            .await
            .map_err(|e| e.to_string())?;
        let created = self
            .engine
            .scan_user(user_id, &history)
            .await
            .map_err(|e| e.to_string())?;
        Ok(created.len())
    }

    /// Tick every `scan_interval_secs` until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.engine.thresholds().scan_interval_secs);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = period.as_secs(), "Scan scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scan scheduler stopped");
    }
}
