//! Collaborator interfaces supplying users and their history.

use crate::{PdeError, PdeResult};
use async_trait::async_trait;
use doctrine_types::HistoryEvent;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Source of a user's closed events, oldest first.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn fetch_history(&self, user_id: &str) -> PdeResult<Vec<HistoryEvent>>;
}

/// Source of users eligible for background scanning.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn eligible_users(&self) -> PdeResult<Vec<String>>;
}

fn bounded(mut events: Vec<HistoryEvent>, max_events: usize) -> Vec<HistoryEvent> {
    events.sort_by_key(|e| e.closed_at);
    let skip = events.len().saturating_sub(max_events);
    events.drain(..skip);
    events
}

/// One JSON array of events per user, stored as `<dir>/<user_id>.json`.
pub struct FileHistoryProvider {
    dir: PathBuf,
    max_events: usize,
}

impl FileHistoryProvider {
    pub fn new(dir: impl Into<PathBuf>, max_events: usize) -> Self {
        Self {
            dir: dir.into(),
            max_events,
        }
    }

    fn path_for(&self, user_id: &str) -> PdeResult<PathBuf> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PdeError::InvalidUser(user_id.to_string()));
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }
}

#[async_trait]
impl HistoryProvider for FileHistoryProvider {
    async fn fetch_history(&self, user_id: &str) -> PdeResult<Vec<HistoryEvent>> {
        let unavailable = |reason: String| PdeError::HistoryUnavailable {
            user_id: user_id.to_string(),
            reason,
        };
        let path = self.path_for(user_id)?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let events: Vec<HistoryEvent> =
            serde_json::from_str(&raw).map_err(|e| unavailable(e.to_string()))?;
        Ok(bounded(events, self.max_events))
    }
}

#[async_trait]
impl UserDirectory for FileHistoryProvider {
    async fn eligible_users(&self) -> PdeResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| PdeError::DirectoryUnavailable(e.to_string()))?;
        let mut users = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PdeError::DirectoryUnavailable(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                users.push(stem.to_string());
            }
        }
        users.sort();
        Ok(users)
    }
}

/// In-memory provider; users are eligible once they have history.
#[derive(Default)]
pub struct InMemoryHistoryProvider {
    histories: RwLock<BTreeMap<String, Vec<HistoryEvent>>>,
    max_events: Option<usize>,
}

impl InMemoryHistoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            histories: RwLock::new(BTreeMap::new()),
            max_events: Some(max_events),
        }
    }

    pub fn set_history(&self, user_id: &str, events: Vec<HistoryEvent>) {
        let mut guard = self.histories.write().unwrap_or_else(|p| p.into_inner());
        guard.insert(user_id.to_string(), events);
    }
}

#[async_trait]
impl HistoryProvider for InMemoryHistoryProvider {
    async fn fetch_history(&self, user_id: &str) -> PdeResult<Vec<HistoryEvent>> {
        let events = {
            let guard = self.histories.read().unwrap_or_else(|p| p.into_inner());
            guard.get(user_id).cloned()
        };
        let events = events.ok_or_else(|| PdeError::HistoryUnavailable {
            user_id: user_id.to_string(),
            reason: "no history recorded".to_string(),
        })?;
        Ok(bounded(events, self.max_events.unwrap_or(usize::MAX)))
    }
}

#[async_trait]
impl UserDirectory for InMemoryHistoryProvider {
    async fn eligible_users(&self) -> PdeResult<Vec<String>> {
        let guard = self.histories.read().unwrap_or_else(|p| p.into_inner());
        Ok(guard.keys().cloned().collect())
    }
}
