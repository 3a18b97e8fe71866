//! Pattern categories and the alerts detectors emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Behavioural drift pattern a detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    ExecutionDrift,
    BiasInterference,
    RegimeMismatch,
    OvertradingAfterLoss,
    EdgeDecay,
    EntropyCollapse,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 6] = [
        PatternCategory::ExecutionDrift,
        PatternCategory::BiasInterference,
        PatternCategory::RegimeMismatch,
        PatternCategory::OvertradingAfterLoss,
        PatternCategory::EdgeDecay,
        PatternCategory::EntropyCollapse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::ExecutionDrift => "execution_drift",
            PatternCategory::BiasInterference => "bias_interference",
            PatternCategory::RegimeMismatch => "regime_mismatch",
            PatternCategory::OvertradingAfterLoss => "overtrading_after_loss",
            PatternCategory::EdgeDecay => "edge_decay",
            PatternCategory::EntropyCollapse => "entropy_collapse",
        }
    }

    /// Short human-facing label carried on overlays.
    pub fn label(&self) -> &'static str {
        match self {
            PatternCategory::ExecutionDrift => "Execution drift",
            PatternCategory::BiasInterference => "Bias interference cluster",
            PatternCategory::RegimeMismatch => "Regime mismatch",
            PatternCategory::OvertradingAfterLoss => "Overtrading after loss",
            PatternCategory::EdgeDecay => "Edge-score decay",
            PatternCategory::EntropyCollapse => "Signature entropy collapse",
        }
    }

    pub fn parse(name: &str) -> Option<PatternCategory> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confidence-scored detection over a user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAlert {
    pub category: PatternCategory,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub sample_size: usize,
    pub summary: String,
    pub evidence: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl PatternAlert {
    pub fn new(
        category: PatternCategory,
        confidence: f64,
        sample_size: usize,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            sample_size,
            summary: summary.into(),
            evidence: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach one evidence value.
    pub fn with_evidence(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.evidence.insert(key.to_string(), value.into());
        self
    }
}
