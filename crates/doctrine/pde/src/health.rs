//! Self-monitoring health for the detection engine.
//!
//! Transitions:
//! - success under the latency ceiling: failures reset, engine enabled
//! - success over the ceiling: counted as a failure, engine disabled
//! - failure: consecutive count grows; disabled at the threshold

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;
pub const MAX_SCAN_LATENCY_MS: u64 = 10_000;

pub const REASON_CONSECUTIVE_FAILURES: &str = "consecutive_failures";
pub const REASON_LATENCY_EXCEEDED: &str = "latency_exceeded";

/// Health snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdeHealth {
    pub consecutive_failures: u32,
    pub auto_disabled: bool,
    pub auto_disable_reason: Option<String>,
    pub last_scan_ts: Option<DateTime<Utc>>,
    pub last_scan_latency_ms: u64,
    pub total_scans: u64,
    pub total_failures: u64,
    pub last_error: Option<String>,
}

/// Mutated only around scans.
#[derive(Default)]
pub struct HealthTracker {
    state: Mutex<PdeHealth>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut PdeHealth) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn snapshot(&self) -> PdeHealth {
        self.with_state(|s| s.clone())
    }

    pub fn is_disabled(&self) -> bool {
        self.with_state(|s| s.auto_disabled)
    }

    /// Record a scan that completed without error.
    pub fn record_success(&self, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        self.with_state(|s| {
            s.total_scans += 1;
            s.last_scan_ts = Some(Utc::now());
            s.last_scan_latency_ms = latency_ms;

            if latency_ms > MAX_SCAN_LATENCY_MS {
                s.total_failures += 1;
                s.consecutive_failures += 1;
                s.last_error = Some(format!("scan took {latency_ms}ms"));
                if !s.auto_disabled {
                    warn!(latency_ms, "Pattern detection auto-disabled: scan latency exceeded");
                }
                s.auto_disabled = true;
                s.auto_disable_reason = Some(REASON_LATENCY_EXCEEDED.to_string());
                return;
            }

            s.consecutive_failures = 0;
            if s.auto_disabled {
                info!(
                    latency_ms,
                    previous_reason = ?s.auto_disable_reason,
                    "Pattern detection self-healed"
                );
                s.auto_disabled = false;
                s.auto_disable_reason = None;
            }
        });
    }

    /// Record a scan that failed.
    pub fn record_failure(&self, error: &str) {
        self.with_state(|s| {
            s.total_scans += 1;
            s.total_failures += 1;
            s.consecutive_failures += 1;
            s.last_scan_ts = Some(Utc::now());
            s.last_error = Some(error.to_string());

            if s.consecutive_failures >= MAX_CONSECUTIVE_FAILURES && !s.auto_disabled {
                warn!(
                    failures = s.consecutive_failures,
                    error,
                    "Pattern detection auto-disabled after consecutive failures"
                );
                s.auto_disabled = true;
                s.auto_disable_reason = Some(REASON_CONSECUTIVE_FAILURES.to_string());
            }
        });
    }

    /// Clear the disabled flag and counters.
    pub fn reset(&self) {
        self.with_state(|s| {
            s.consecutive_failures = 0;
            s.auto_disabled = false;
            s.auto_disable_reason = None;
        });
    }
}
