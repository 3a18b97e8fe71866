//! Uniform swallow-and-log wrapper around a [`DurableStore`].

use crate::traits::DurableStore;
use crate::StoreError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Best-effort view of a durable store.
///
/// Every failure is logged and counted, then replaced by the neutral value
/// for the operation (`None`, `false`, empty list). Callers keep serving
/// from their in-memory caches.
#[derive(Clone)]
pub struct BestEffortStore {
    inner: Arc<dyn DurableStore>,
    failures: Arc<AtomicU64>,
    degraded: Arc<AtomicBool>,
}

impl BestEffortStore {
    pub fn new(inner: Arc<dyn DurableStore>) -> Self {
        Self {
            inner,
            failures: Arc::new(AtomicU64::new(0)),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Total swallowed failures.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Whether the most recent operation failed.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn absorb<T>(&self, op: &'static str, key: &str, result: Result<T, StoreError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.degraded.store(false, Ordering::Relaxed);
                Some(value)
            }
            Err(error) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.degraded.store(true, Ordering::Relaxed);
                warn!(op, key, error = %error, "Durable store call failed, continuing in memory");
                None
            }
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let result = self.inner.get(key).await;
        self.absorb("get", key, result).flatten()
    }

    /// Returns whether the write reached the store.
    pub async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> bool {
        let result = self.inner.set(key, value, ttl).await;
        self.absorb("set", key, result).is_some()
    }

    /// `None` when the store could not be reached.
    pub async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Option<bool> {
        let result = self.inner.set_if_absent(key, value, ttl).await;
        self.absorb("set_if_absent", key, result)
    }

    pub async fn delete(&self, key: &str) {
        let result = self.inner.delete(key).await;
        self.absorb("delete", key, result);
    }

    pub async fn scan_prefix(&self, prefix: &str) -> Vec<String> {
        let result = self.inner.scan_prefix(prefix).await;
        self.absorb("scan_prefix", prefix, result)
            .unwrap_or_default()
    }

    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let result = self.inner.ttl(key).await;
        self.absorb("ttl", key, result).flatten()
    }
}
