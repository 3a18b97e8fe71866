//! Tunable governance thresholds.

use crate::{ThresholdError, ThresholdResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Length of the rolling overlay budget window.
pub const BUDGET_WINDOW_DAYS: i64 = 7;

/// Upper bound for every duration threshold.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 3600;

/// Thresholds consulted by the overlay gates and the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceThresholds {
    /// Minimum alert confidence for an overlay.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Overlays allowed per user in the rolling budget window.
    #[serde(default = "default_max_per_week")]
    pub max_per_week: usize,

    /// Cooldown between two overlays of one category for one user.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Overlay lifetime.
    #[serde(default = "default_overlay_ttl_secs")]
    pub overlay_ttl_secs: u64,

    /// Interval between scanner cycles.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Users scanned per cycle.
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
}

impl Default for GovernanceThresholds {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_per_week: default_max_per_week(),
            cooldown_secs: default_cooldown_secs(),
            overlay_ttl_secs: default_overlay_ttl_secs(),
            scan_interval_secs: default_scan_interval_secs(),
            scan_batch_size: default_scan_batch_size(),
        }
    }
}

impl GovernanceThresholds {
    pub fn cooldown(&self) -> Duration {
        bounded_seconds(self.cooldown_secs)
    }

    pub fn overlay_ttl(&self) -> Duration {
        bounded_seconds(self.overlay_ttl_secs)
    }

    pub fn budget_window() -> Duration {
        Duration::days(BUDGET_WINDOW_DAYS)
    }

    /// Reject values that would make a gate meaningless.
    pub fn validate(&self) -> ThresholdResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ThresholdError::ConfidenceOutOfRange(self.min_confidence));
        }
        let non_zero = [
            ("max_per_week", self.max_per_week as u64),
            ("cooldown_secs", self.cooldown_secs),
            ("overlay_ttl_secs", self.overlay_ttl_secs),
            ("scan_interval_secs", self.scan_interval_secs),
            ("scan_batch_size", self.scan_batch_size as u64),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ThresholdError::Zero { field });
            }
        }
        let durations = [
            ("cooldown_secs", self.cooldown_secs),
            ("overlay_ttl_secs", self.overlay_ttl_secs),
            ("scan_interval_secs", self.scan_interval_secs),
        ];
        for (field, value) in durations {
            if value > MAX_DURATION_SECS {
                return Err(ThresholdError::TooLarge {
                    field,
                    max: MAX_DURATION_SECS,
                });
            }
        }
        Ok(())
    }
}

/// Seconds as a chrono duration, saturating at [`MAX_DURATION_SECS`] so an
/// unvalidated value can neither wrap negative nor overflow.
fn bounded_seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

fn default_min_confidence() -> f64 {
    0.70
}

fn default_max_per_week() -> usize {
    5
}

fn default_cooldown_secs() -> u64 {
    48 * 3600
}

fn default_overlay_ttl_secs() -> u64 {
    24 * 3600
}

fn default_scan_interval_secs() -> u64 {
    15 * 60
}

fn default_scan_batch_size() -> usize {
    25
}
