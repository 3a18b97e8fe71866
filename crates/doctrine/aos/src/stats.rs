use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of running one alert through the gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Created,
    BelowConfidence,
    Suppressed,
    CoolingDown,
    BudgetExhausted,
}

impl GateOutcome {
    fn index(self) -> usize {
        match self {
            GateOutcome::Created => 0,
            GateOutcome::BelowConfidence => 1,
            GateOutcome::Suppressed => 2,
            GateOutcome::CoolingDown => 3,
            GateOutcome::BudgetExhausted => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Created => "created",
            GateOutcome::BelowConfidence => "below_confidence",
            GateOutcome::Suppressed => "suppressed",
            GateOutcome::CoolingDown => "cooling_down",
            GateOutcome::BudgetExhausted => "budget_exhausted",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct GateCounters([AtomicU64; 5]);

impl GateCounters {
    pub(crate) fn record(&self, outcome: GateOutcome) {
        self.0[outcome.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get(&self, outcome: GateOutcome) -> u64 {
        self.0[outcome.index()].load(Ordering::Relaxed)
    }
}

/// Counters and cache sizes reported on the admin surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AosStats {
    pub created: u64,
    pub below_confidence: u64,
    pub suppressed: u64,
    pub cooling_down: u64,
    pub budget_exhausted: u64,
    pub active_overlays: usize,
    pub suppressed_users: usize,
    pub live_cooldowns: usize,
}

impl AosStats {
    /// Alerts that went through the gates.
    pub fn evaluated(&self) -> u64 {
        self.created
            + self.below_confidence
            + self.suppressed
            + self.cooling_down
            + self.budget_exhausted
    }
}
