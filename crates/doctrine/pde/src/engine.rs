//! Scan orchestration around the detector table.

use crate::detectors::DETECTORS;
use crate::health::{HealthTracker, PdeHealth};
use crate::{PdeError, PdeResult};
use doctrine_types::{HistoryEvent, PatternAlert};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

/// Histories shorter than this are not scanned.
pub const MIN_SAMPLE_SIZE: usize = 10;

/// Alerts retained for observability.
pub const ALERT_BUFFER_CAPACITY: usize = 200;

/// An emitted alert together with the user it was raised for.
#[derive(Debug, Clone, Serialize)]
pub struct RecentAlert {
    pub user_id: String,
    pub alert: PatternAlert,
}

/// Pattern Detection Engine.
pub struct PatternDetectionEngine {
    health: HealthTracker,
    recent: Mutex<VecDeque<RecentAlert>>,
    capacity: usize,
}

impl Default for PatternDetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetectionEngine {
    pub fn new() -> Self {
        Self::with_capacity(ALERT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            health: HealthTracker::new(),
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn health(&self) -> PdeHealth {
        self.health.snapshot()
    }

    pub fn tracker(&self) -> &HealthTracker {
        &self.health
    }

    pub fn is_disabled(&self) -> bool {
        self.health.is_disabled()
    }

    /// Run every detector over `history`.
    ///
    /// Short histories return no alerts and leave health untouched. While
    /// auto-disabled the scan still runs; if it heals the engine its alerts
    /// are returned, otherwise they are dropped.
    pub fn scan(&self, user_id: &str, history: &[HistoryEvent]) -> PdeResult<Vec<PatternAlert>> {
        if history.len() < MIN_SAMPLE_SIZE {
            debug!(user_id, sample = history.len(), "History below minimum sample size");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let result = run_detectors(history);
        let elapsed = started.elapsed();

        match result {
            Ok(alerts) => {
                self.health.record_success(elapsed);
                if self.health.is_disabled() {
                    debug!(user_id, "Pattern detection disabled, dropping scan output");
                    return Ok(Vec::new());
                }
                self.remember(user_id, &alerts);
                debug!(
                    user_id,
                    alerts = alerts.len(),
                    latency_ms = elapsed.as_millis() as u64,
                    "Pattern scan complete"
                );
                Ok(alerts)
            }
            Err(e) => {
                self.health.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    fn remember(&self, user_id: &str, alerts: &[PatternAlert]) {
        if alerts.is_empty() || self.capacity == 0 {
            return;
        }
        let mut recent = self.recent.lock().unwrap_or_else(|p| p.into_inner());
        for alert in alerts {
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(RecentAlert {
                user_id: user_id.to_string(),
                alert: alert.clone(),
            });
        }
    }

    /// Most recent alerts, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<RecentAlert> {
        let recent = self.recent.lock().unwrap_or_else(|p| p.into_inner());
        recent.iter().rev().take(limit).cloned().collect()
    }
}

fn validate(event: &HistoryEvent) -> PdeResult<()> {
    if !event.pnl.is_finite() {
        return Err(PdeError::InvalidEvent {
            event_id: event.event_id.clone(),
            reason: format!("non-finite pnl {}", event.pnl),
        });
    }
    if let Some(score) = event.edge_score {
        if !score.is_finite() {
            return Err(PdeError::InvalidEvent {
                event_id: event.event_id.clone(),
                reason: format!("non-finite edge score {score}"),
            });
        }
    }
    Ok(())
}

fn run_detectors(history: &[HistoryEvent]) -> PdeResult<Vec<PatternAlert>> {
    history.iter().try_for_each(validate)?;

    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.closed_at);

    Ok(DETECTORS
        .iter()
        .filter_map(|(_, detect)| detect(&sorted))
        .collect())
}
