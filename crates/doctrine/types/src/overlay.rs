//! Overlay records created by the admin orchestration service.

use crate::PatternCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded-lifetime advisory annotation for one user.
///
/// Appended after the policy consumer's own reasoning, never fed into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRecord {
    pub user_id: String,
    pub category: PatternCategory,
    pub label: String,
    pub summary: String,
    pub confidence: f64,
    pub sample_size: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OverlayRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
