use crate::StoreResult;
use async_trait::async_trait;
use std::time::Duration;

/// Key/value store with per-key expiry.
///
/// Values are opaque strings; callers serialise their own records.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read a live value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous one. `None` means no expiry.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write only when no live value exists. Returns whether the write happened.
    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Keys of all live entries starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Remaining lifetime of a live key; `None` when missing or persistent.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;
}
