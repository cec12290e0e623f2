//! In-process store backend.
//!
//! Implements the same contract as the Redis backend against plain maps
//! behind one mutex, which makes `execute` trivially atomic. Used by the
//! test suite and for local development without a Redis instance.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::store::{KvStore, WriteOp};

#[derive(Debug, Default)]
struct Tables {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
    sorted: HashMap<String, HashMap<String, f64>>,
}

/// In-memory [`KvStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Store("memory store mutex poisoned".into()))
    }

    /// Sorted-set members ordered like ZREVRANGE: score descending, member
    /// lexicographically descending on ties.
    fn ranked_members(sorted: &HashMap<String, f64>) -> Vec<String> {
        let mut entries: Vec<(&String, f64)> = sorted.iter().map(|(m, s)| (m, *s)).collect();
        entries.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal) {
            Ordering::Equal => b.0.cmp(a.0),
            other => other,
        });
        entries.into_iter().map(|(m, _)| m.clone()).collect()
    }

    fn apply(tables: &mut Tables, op: WriteOp) {
        match op {
            WriteOp::HashSet { key, fields } => {
                let hash = tables.hashes.entry(key).or_default();
                for (field, value) in fields {
                    hash.insert(field, value);
                }
            }
            WriteOp::HashIncr { key, field, delta } => {
                let hash = tables.hashes.entry(key).or_default();
                let current: i64 = hash.get(&field).and_then(|v| v.parse().ok()).unwrap_or(0);
                hash.insert(field, (current + delta).to_string());
            }
            WriteOp::Delete { key } => {
                tables.hashes.remove(&key);
                tables.sets.remove(&key);
                tables.sorted.remove(&key);
            }
            WriteOp::SetAdd { key, member } => {
                tables.sets.entry(key).or_default().insert(member);
            }
            WriteOp::SetRemove { key, member } => {
                if let Some(set) = tables.sets.get_mut(&key) {
                    set.remove(&member);
                    if set.is_empty() {
                        tables.sets.remove(&key);
                    }
                }
            }
            WriteOp::SortedAdd { key, member, score } => {
                tables.sorted.entry(key).or_default().insert(member, score);
            }
            WriteOp::SortedRemove { key, member } => {
                if let Some(sorted) = tables.sorted.get_mut(&key) {
                    sorted.remove(&member);
                    if sorted.is_empty() {
                        tables.sorted.remove(&key);
                    }
                }
            }
            WriteOp::SortedIncr { key, member, delta } => {
                let sorted = tables.sorted.entry(key).or_default();
                let score = sorted.entry(member).or_insert(0.0);
                *score += delta;
            }
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let tables = self.lock()?;
        Ok(tables.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let tables = self.lock()?;
        Ok(tables.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let tables = self.lock()?;
        Ok(tables
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn sorted_range_rev(&self, key: &str, offset: u64, count: u64) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let tables = self.lock()?;
        let Some(sorted) = tables.sorted.get(key) else {
            return Ok(Vec::new());
        };
        Ok(Self::ranked_members(sorted)
            .into_iter()
            .skip(offset as usize)
            .take(count as usize)
            .collect())
    }

    async fn sorted_members_rev(&self, key: &str) -> Result<Vec<String>> {
        let tables = self.lock()?;
        Ok(tables
            .sorted
            .get(key)
            .map(Self::ranked_members)
            .unwrap_or_default())
    }

    async fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let tables = self.lock()?;
        Ok(tables.sorted.get(key).and_then(|s| s.get(member).copied()))
    }

    async fn hash_get_all_many(&self, keys: &[String]) -> Result<Vec<HashMap<String, String>>> {
        let tables = self.lock()?;
        Ok(keys
            .iter()
            .map(|key| tables.hashes.get(key).cloned().unwrap_or_default())
            .collect())
    }

    async fn set_contains_many(&self, checks: &[(String, String)]) -> Result<Vec<bool>> {
        let tables = self.lock()?;
        Ok(checks
            .iter()
            .map(|(key, member)| tables.sets.get(key).is_some_and(|s| s.contains(member)))
            .collect())
    }

    async fn sorted_top_many(
        &self,
        keys: &[String],
        count: u64,
    ) -> Result<Vec<Vec<(String, f64)>>> {
        let tables = self.lock()?;
        Ok(keys
            .iter()
            .map(|key| {
                let Some(sorted) = tables.sorted.get(key) else {
                    return Vec::new();
                };
                Self::ranked_members(sorted)
                    .into_iter()
                    .take(count as usize)
                    .map(|member| {
                        let score = sorted.get(&member).copied().unwrap_or(0.0);
                        (member, score)
                    })
                    .collect()
            })
            .collect())
    }

    async fn execute(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut tables = self.lock()?;
        for op in ops {
            Self::apply(&mut tables, op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_incr_and_get() {
        let store = MemoryStore::new();
        store
            .execute(vec![
                WriteOp::HashSet {
                    key: "h".into(),
                    fields: vec![("likes".into(), "2".into())],
                },
                WriteOp::HashIncr {
                    key: "h".into(),
                    field: "likes".into(),
                    delta: 3,
                },
            ])
            .await
            .unwrap();
        let hash = store.hash_get_all("h").await.unwrap();
        assert_eq!(hash.get("likes").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn sorted_range_orders_by_score_desc() {
        let store = MemoryStore::new();
        store
            .execute(vec![
                WriteOp::SortedAdd {
                    key: "z".into(),
                    member: "low".into(),
                    score: 1.0,
                },
                WriteOp::SortedAdd {
                    key: "z".into(),
                    member: "high".into(),
                    score: 9.0,
                },
                WriteOp::SortedAdd {
                    key: "z".into(),
                    member: "mid".into(),
                    score: 5.0,
                },
            ])
            .await
            .unwrap();

        let all = store.sorted_members_rev("z").await.unwrap();
        assert_eq!(all, vec!["high", "mid", "low"]);

        let page = store.sorted_range_rev("z", 1, 1).await.unwrap();
        assert_eq!(page, vec!["mid"]);

        assert_eq!(store.sorted_range_rev("z", 0, 0).await.unwrap().len(), 0);
        assert_eq!(store.sorted_range_rev("missing", 0, 5).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn sorted_incr_accumulates() {
        let store = MemoryStore::new();
        store
            .execute(vec![WriteOp::SortedIncr {
                key: "z".into(),
                member: "m".into(),
                delta: 3.0,
            }])
            .await
            .unwrap();
        store
            .execute(vec![WriteOp::SortedIncr {
                key: "z".into(),
                member: "m".into(),
                delta: -1.0,
            }])
            .await
            .unwrap();
        assert_eq!(store.sorted_score("z", "m").await.unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn missing_keys_read_as_empty() {
        let store = MemoryStore::new();
        assert!(store.hash_get_all("nope").await.unwrap().is_empty());
        assert!(!store.set_contains("nope", "m").await.unwrap());
        let many = store
            .hash_get_all_many(&["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert!(many.iter().all(HashMap::is_empty));
    }
}
