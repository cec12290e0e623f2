//! Redis store backend.
//!
//! Read batches go out as one pipeline; write batches as one MULTI/EXEC
//! transaction. Per-item decode failures inside a read pipeline degrade to
//! an empty map for that position so one broken entity never fails the
//! whole batch.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::store::{KvStore, WriteOp};

/// Redis-backed [`KvStore`]
#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    /// Connect and build the shared connection manager.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Store(format!("failed to create Redis client: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Store(format!("failed to create Redis connection: {e}")))?;
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn add_op(pipe: &mut redis::Pipeline, op: WriteOp) {
        match op {
            WriteOp::HashSet { key, fields } => {
                let cmd = pipe.cmd("HSET").arg(key);
                for (field, value) in fields {
                    cmd.arg(field).arg(value);
                }
                cmd.ignore();
            }
            WriteOp::HashIncr { key, field, delta } => {
                pipe.cmd("HINCRBY").arg(key).arg(field).arg(delta).ignore();
            }
            WriteOp::Delete { key } => {
                pipe.cmd("DEL").arg(key).ignore();
            }
            WriteOp::SetAdd { key, member } => {
                pipe.cmd("SADD").arg(key).arg(member).ignore();
            }
            WriteOp::SetRemove { key, member } => {
                pipe.cmd("SREM").arg(key).arg(member).ignore();
            }
            WriteOp::SortedAdd { key, member, score } => {
                pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore();
            }
            WriteOp::SortedRemove { key, member } => {
                pipe.cmd("ZREM").arg(key).arg(member).ignore();
            }
            WriteOp::SortedIncr { key, member, delta } => {
                pipe.cmd("ZINCRBY").arg(key).arg(delta).arg(member).ignore();
            }
        }
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| {
                warn!("Redis HGETALL failed for {}: {}", key, e);
                AppError::from(e)
            })?;
        Ok(fields)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let found: bool = redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(found)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(members)
    }

    async fn sorted_range_rev(&self, key: &str, offset: u64, count: u64) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stop = offset as i64 + count as i64 - 1;
        let members: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(offset as i64)
            .arg(stop)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(members)
    }

    async fn sorted_members_rev(&self, key: &str) -> Result<Vec<String>> {
        let members: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(members)
    }

    async fn sorted_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let score: Option<f64> = redis::cmd("ZSCORE")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn.clone())
            .await?;
        Ok(score)
    }

    async fn hash_get_all_many(&self, keys: &[String]) -> Result<Vec<HashMap<String, String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("HGETALL").arg(key);
        }
        let raw: Vec<redis::Value> = pipe
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| {
                warn!("Redis pipelined HGETALL failed ({} keys): {}", keys.len(), e);
                AppError::from(e)
            })?;
        Ok(raw
            .into_iter()
            .map(|value| redis::from_redis_value(&value).unwrap_or_default())
            .collect())
    }

    async fn set_contains_many(&self, checks: &[(String, String)]) -> Result<Vec<bool>> {
        if checks.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for (key, member) in checks {
            pipe.cmd("SISMEMBER").arg(key).arg(member);
        }
        let flags: Vec<bool> = pipe.query_async(&mut self.conn.clone()).await?;
        Ok(flags)
    }

    async fn sorted_top_many(
        &self,
        keys: &[String],
        count: u64,
    ) -> Result<Vec<Vec<(String, f64)>>> {
        if keys.is_empty() || count == 0 {
            return Ok(keys.iter().map(|_| Vec::new()).collect());
        }
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("ZREVRANGE")
                .arg(key)
                .arg(0)
                .arg(count as i64 - 1)
                .arg("WITHSCORES");
        }
        let ranges: Vec<Vec<(String, f64)>> = pipe.query_async(&mut self.conn.clone()).await?;
        Ok(ranges)
    }

    async fn execute(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        let op_count = ops.len();
        for op in ops {
            Self::add_op(&mut pipe, op);
        }
        pipe.query_async::<_, ()>(&mut self.conn.clone())
            .await
            .map_err(|e| {
                warn!("Redis transaction failed ({} ops): {}", op_count, e);
                AppError::from(e)
            })?;
        Ok(())
    }
}
