//! End-to-end test: background scan cycles from user directory to overlay.

use crate::support::{corrupt_history, drifting_history, harness};
use async_trait::async_trait;
use doctrine_engine::config::SchedulerConfig;
use doctrine_engine::{KillSwitch, ScanScheduler, TickOutcome};
use doctrine_pde::{HistoryProvider, InMemoryHistoryProvider, PdeResult, UserDirectory};
use doctrine_types::{GovernanceThresholds, HistoryEvent, PatternCategory};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct FixedDirectory {
    users: Vec<String>,
    delay: Duration,
}

impl FixedDirectory {
    fn new(users: &[&str]) -> Self {
        Self {
            users: users.iter().map(|u| u.to_string()).collect(),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl UserDirectory for FixedDirectory {
    async fn eligible_users(&self) -> PdeResult<Vec<String>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.users.clone())
    }
}

/// Serves histories from memory but stalls on one user.
struct StallingHistory {
    inner: Arc<InMemoryHistoryProvider>,
    stalled_user: &'static str,
    stall: Duration,
}

#[async_trait]
impl HistoryProvider for StallingHistory {
    async fn fetch_history(&self, user_id: &str) -> PdeResult<Vec<HistoryEvent>> {
        if user_id == self.stalled_user {
            tokio::time::sleep(self.stall).await;
        }
        self.inner.fetch_history(user_id).await
    }
}

fn provider() -> Arc<InMemoryHistoryProvider> {
    let provider = InMemoryHistoryProvider::new();
    provider.set_history("drifter", drifting_history());
    provider.set_history("newcomer", drifting_history()[..5].to_vec());
    provider.set_history("corrupt", corrupt_history());
    Arc::new(provider)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_turns_drift_into_an_overlay() {
    let h = harness();
    let provider = provider();
    let scheduler = ScanScheduler::new(
        h.engine.clone(),
        provider.clone(),
        Arc::new(FixedDirectory::new(&["drifter", "newcomer"])),
        SchedulerConfig::default(),
    );

    let report = scheduler.run_once().await.unwrap();
    assert_eq!(report.scanned, vec!["drifter", "newcomer"]);
    assert_eq!(report.overlays_created, 1);
    assert_eq!(report.failures, 0);

    let active = h.engine.active_overlays().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].user_id, "drifter");
    assert_eq!(active[0].category, PatternCategory::ExecutionDrift);
    assert!(active[0].confidence > 0.5);

    let recent = h.engine.recent_alerts(10);
    assert_eq!(recent[0].user_id, "drifter");
}

#[tokio::test]
async fn user_failures_are_isolated() {
    let h = harness();
    let scheduler = ScanScheduler::new(
        h.engine.clone(),
        provider(),
        Arc::new(FixedDirectory::new(&["ghost", "corrupt", "drifter"])),
        SchedulerConfig::default(),
    );

    let report = scheduler.run_once().await.unwrap();
    assert_eq!(report.failures, 2);
    assert_eq!(report.overlays_created, 1);
    assert_eq!(scheduler.stats().user_failures, 2);
    assert_eq!(h.engine.health().detection.total_failures, 1);
}

#[tokio::test]
async fn pde_switch_skips_cycles() {
    let h = harness();
    let scheduler = ScanScheduler::new(
        h.engine.clone(),
        provider(),
        Arc::new(FixedDirectory::new(&["drifter"])),
        SchedulerConfig::default(),
    );
    h.engine.set_kill_switch("ops", KillSwitch::Pde, false);

    assert_eq!(scheduler.run_once().await.unwrap_err(), TickOutcome::SkippedDisabled);
    assert_eq!(scheduler.tick(), TickOutcome::SkippedDisabled);
    assert_eq!(scheduler.stats().skipped_disabled, 2);
    assert!(h.engine.active_overlays().await.is_empty());
}

#[tokio::test]
async fn batches_rotate_across_cycles() {
    let h = harness();
    h.engine
        .update_thresholds(
            "ops",
            GovernanceThresholds {
                scan_batch_size: 2,
                ..Default::default()
            },
        )
        .unwrap();
    let scheduler = ScanScheduler::new(
        h.engine.clone(),
        provider(),
        Arc::new(FixedDirectory::new(&["a", "b", "c"])),
        SchedulerConfig::default(),
    );

    assert_eq!(scheduler.run_once().await.unwrap().scanned, vec!["a", "b"]);
    assert_eq!(scheduler.run_once().await.unwrap().scanned, vec!["c", "a"]);
    assert_eq!(scheduler.stats().cycles, 2);
}

#[tokio::test]
async fn overlapping_tick_is_skipped_not_queued() {
    let h = harness();
    let directory = FixedDirectory {
        users: vec!["drifter".to_string()],
        delay: Duration::from_millis(50),
    };
    let scheduler = ScanScheduler::new(
        h.engine.clone(),
        provider(),
        Arc::new(directory),
        SchedulerConfig::default(),
    );

    assert_eq!(scheduler.tick(), TickOutcome::Started);
    assert_eq!(scheduler.tick(), TickOutcome::SkippedBusy);
    assert_eq!(scheduler.run_once().await.unwrap_err(), TickOutcome::SkippedBusy);

    for _ in 0..100 {
        if !scheduler.is_running_cycle() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!scheduler.is_running_cycle());
    let stats = scheduler.stats();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.skipped_busy, 2);
}

#[tokio::test]
async fn timed_out_user_counts_as_one_failure() {
    let h = harness();
    let inner = provider();
    inner.set_history("slow", drifting_history());
    inner.set_history("second_drifter", drifting_history());
    let history = StallingHistory {
        inner,
        stalled_user: "slow",
        stall: Duration::from_secs(3),
    };
    let scheduler = ScanScheduler::new(
        h.engine.clone(),
        Arc::new(history),
        Arc::new(FixedDirectory::new(&["drifter", "slow", "second_drifter"])),
        SchedulerConfig {
            user_timeout_secs: 1,
            ..Default::default()
        },
    );

    let report = scheduler.run_once().await.unwrap();
    assert_eq!(report.scanned, vec!["drifter", "slow", "second_drifter"]);
    assert_eq!(report.failures, 1);
    assert_eq!(report.overlays_created, 2);
    assert_eq!(scheduler.stats().user_failures, 1);

    let users: Vec<String> = h
        .engine
        .active_overlays()
        .await
        .into_iter()
        .map(|o| o.user_id)
        .collect();
    assert_eq!(users, vec!["drifter", "second_drifter"]);
}
