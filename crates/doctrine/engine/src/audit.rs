//! In-memory audit trail of administrative actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Entries kept before the oldest are dropped.
pub const AUDIT_LOG_CAPACITY: usize = 1000;

/// Administrative action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    UpdateBundleField,
    RegenerateBundles,
    UpdatePatterns,
    UpdateThresholds,
    SetKillSwitch,
    ClearOverlays,
    SuppressUser,
    UnsuppressUser,
    ResetDetectionHealth,
}

/// Outcome of an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure { reason: String },
}

/// An audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    /// Resource affected, e.g. a domain, user id or switch name.
    pub resource: String,
    pub outcome: AuditOutcome,
    pub context: BTreeMap<String, serde_json::Value>,
}

impl AuditEntry {
    pub fn new(actor: &str, action: AuditAction, resource: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action,
            resource: resource.into(),
            outcome: AuditOutcome::Success,
            context: BTreeMap::new(),
        }
    }

    /// Add context value
    pub fn context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Set the outcome from an operation result.
    pub fn outcome<T, E: std::fmt::Display>(mut self, result: &Result<T, E>) -> Self {
        self.outcome = match result {
            Ok(_) => AuditOutcome::Success,
            Err(e) => AuditOutcome::Failure {
                reason: e.to_string(),
            },
        };
        self
    }
}

/// Bounded, newest-last audit log.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(AUDIT_LOG_CAPACITY)
    }
}

impl AuditLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(AUDIT_LOG_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        info!(
            audit_id = %entry.id,
            actor = %entry.actor,
            action = ?entry.action,
            resource = %entry.resource,
            outcome = ?entry.outcome,
            "Administrative action"
        );
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
