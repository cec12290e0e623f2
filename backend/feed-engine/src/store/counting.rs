//! Per-request store-call instrumentation.
//!
//! Each logical request wraps the shared store in a fresh [`CountingStore`]
//! that implements the same call surface and tallies individual commands
//! versus batched round trips. The totals are logged when the request scope
//! finishes, whichever way the operation exits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::store::{KvStore, WriteOp};

/// Call counters for one logical request
#[derive(Debug)]
pub struct RequestCounter {
    pub request_id: Uuid,
    commands: AtomicU64,
    batches: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            commands: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }

    fn record_command(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

impl Default for RequestCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Store wrapper counting every call it forwards
pub struct CountingStore {
    inner: Arc<dyn KvStore>,
    counter: Arc<RequestCounter>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn KvStore>, counter: Arc<RequestCounter>) -> Self {
        Self { inner, counter }
    }
}

#[async_trait]
impl KvStore for CountingStore {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.counter.record_command();
        self.inner.hash_get_all(key).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        self.counter.record_command();
        self.inner.set_contains(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.counter.record_command();
        self.inner.set_members(key).await
    }

    async fn sorted_range_rev(&self, key: &str, offset: u64, count: u64) -> Result<Vec<String>> {
        self.counter.record_command();
        self.inner.sorted_range_rev(key, offset, count).await
    }

    async fn sorted_members_rev(&self, key: &str) -> Result<Vec<String>> {
        self.counter.record_command();
        self.inner.sorted_members_rev(key).await
    }

    async fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        self.counter.record_command();
        self.inner.sorted_score(key, member).await
    }

    async fn hash_get_all_many(&self, keys: &[String]) -> Result<Vec<HashMap<String, String>>> {
        self.counter.record_batch();
        self.inner.hash_get_all_many(keys).await
    }

    async fn set_contains_many(&self, checks: &[(String, String)]) -> Result<Vec<bool>> {
        self.counter.record_batch();
        self.inner.set_contains_many(checks).await
    }

    async fn sorted_top_many(
        &self,
        keys: &[String],
        count: u64,
    ) -> Result<Vec<Vec<(String, f64)>>> {
        self.counter.record_batch();
        self.inner.sorted_top_many(keys, count).await
    }

    async fn execute(&self, ops: Vec<WriteOp>) -> Result<()> {
        self.counter.record_batch();
        self.inner.execute(ops).await
    }
}

/// One logical request's view of the store plus its counters.
pub struct RequestScope {
    store: Arc<CountingStore>,
    counter: Arc<RequestCounter>,
}

impl RequestScope {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        let counter = Arc::new(RequestCounter::new());
        let store = Arc::new(CountingStore::new(inner, counter.clone()));
        Self { store, counter }
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    pub fn counter(&self) -> &RequestCounter {
        &self.counter
    }

    /// Log the per-request call totals. Call this on every exit path.
    pub fn finish(&self, operation: &str) {
        debug!(
            request_id = %self.counter.request_id,
            operation,
            commands = self.counter.commands(),
            batches = self.counter.batches(),
            "store call totals"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn counts_commands_and_batches_separately() {
        let scope = RequestScope::new(Arc::new(MemoryStore::new()));
        let store = scope.store();

        store.hash_get_all("a").await.unwrap();
        store.set_contains("s", "m").await.unwrap();
        store
            .hash_get_all_many(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        store.execute(vec![]).await.unwrap();

        assert_eq!(scope.counter().commands(), 2);
        assert_eq!(scope.counter().batches(), 2);
    }

    #[tokio::test]
    async fn fresh_scope_starts_at_zero() {
        let scope = RequestScope::new(Arc::new(MemoryStore::new()));
        assert_eq!(scope.counter().commands(), 0);
        assert_eq!(scope.counter().batches(), 0);
    }
}
