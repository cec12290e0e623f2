//! Remote key-value store abstraction.
//!
//! The engine talks to a store exposing hash, set, and sorted-set primitives
//! with two batching shapes: read batches (`*_many`, one pipelined round
//! trip) and atomic write batches ([`execute`](KvStore::execute), one
//! transaction). Multi-step writes that must appear atomic go through a
//! single `execute` call.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

pub mod counting;
pub mod memory;
pub mod redis;

pub use counting::{CountingStore, RequestCounter, RequestScope};
pub use memory::MemoryStore;
pub use redis::RedisKvStore;

/// One entry in an atomic write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    HashIncr {
        key: String,
        field: String,
        delta: i64,
    },
    Delete {
        key: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
    SetRemove {
        key: String,
        member: String,
    },
    SortedAdd {
        key: String,
        member: String,
        score: f64,
    },
    SortedRemove {
        key: String,
        member: String,
    },
    SortedIncr {
        key: String,
        member: String,
        delta: f64,
    },
}

/// Store primitives used by the engine.
///
/// Missing keys read as empty: an absent hash is an empty map, an absent
/// set or sorted set an empty collection.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Members of a sorted set, highest score first, `count` entries starting
    /// at `offset`.
    async fn sorted_range_rev(&self, key: &str, offset: u64, count: u64) -> Result<Vec<String>>;

    /// All members of a sorted set, highest score first.
    async fn sorted_members_rev(&self, key: &str) -> Result<Vec<String>>;

    async fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Fetch several hashes in one pipelined round trip. The result is
    /// positionally aligned with `keys`; an item that is missing or fails to
    /// decode comes back as an empty map rather than failing the batch.
    async fn hash_get_all_many(&self, keys: &[String]) -> Result<Vec<HashMap<String, String>>>;

    /// Run several membership checks in one pipelined round trip,
    /// positionally aligned with `checks`.
    async fn set_contains_many(&self, checks: &[(String, String)]) -> Result<Vec<bool>>;

    /// Read the top `count` `(member, score)` pairs of several sorted sets in
    /// one pipelined round trip, each highest score first, positionally
    /// aligned with `keys`.
    async fn sorted_top_many(
        &self,
        keys: &[String],
        count: u64,
    ) -> Result<Vec<Vec<(String, f64)>>>;

    /// Apply a write batch atomically.
    async fn execute(&self, ops: Vec<WriteOp>) -> Result<()>;
}
