//! Closed historical events supplied by the history provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directional side of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

/// Environment label attached to an event by the upstream scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Ranging,
}

impl Regime {
    /// Whether taking `side` fights this environment.
    pub fn contradicts(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (Regime::TrendingUp, Side::Short) | (Regime::TrendingDown, Side::Long)
        )
    }
}

/// One closed event in a user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: String,
    pub closed_at: DateTime<Utc>,
    /// Signed outcome magnitude; negative values are losses.
    pub pnl: f64,
    pub side: Side,
    /// Setup or signature category.
    pub category: String,
    #[serde(default)]
    pub regime: Option<Regime>,
    /// Quality score assigned at entry.
    #[serde(default)]
    pub edge_score: Option<f64>,
}

impl HistoryEvent {
    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn loss_magnitude(&self) -> f64 {
        if self.is_loss() {
            -self.pnl
        } else {
            0.0
        }
    }
}
