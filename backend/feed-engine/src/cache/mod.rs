//! In-process multi-tier cache.
//!
//! Three independent TTL namespaces, each with lazy expiry on read:
//! - responses: full computed listing payloads - TTL: 30 seconds
//! - users: materialized user entities - TTL: 5 minutes
//! - posts: materialized post entities - TTL: 10 minutes
//!
//! There is no size-based eviction; entries only leave via expiry or
//! invalidation. The service is an injectable object so tests construct
//! isolated instances per case instead of sharing process globals.

pub mod invalidation;

pub use invalidation::CacheInvalidator;

use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::models::{Post, User};

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at_ms: i64,
}

/// One TTL-keyed cache namespace
pub struct TtlCache<T: Clone> {
    entries: DashMap<String, CacheEntry<T>>,
    clock: Arc<dyn Clock>,
    default_ttl_secs: u64,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(clock: Arc<dyn Clock>, default_ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            default_ttl_secs,
        }
    }

    /// Read an entry. An entry past its expiry is deleted and reported as a
    /// miss; no read ever returns expired data.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            Some(entry) if now < entry.expires_at_ms => Some(entry.value.clone()),
            Some(entry) => {
                drop(entry);
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: T) {
        self.set_with_ttl(key, value, self.default_ttl_secs);
    }

    pub fn set_with_ttl(&self, key: &str, value: T, ttl_secs: u64) {
        let expires_at_ms = self.clock.now_ms() + (ttl_secs as i64) * 1000;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at_ms,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry whose key starts with `prefix`; returns how many.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let count = doomed.len();
        for key in doomed {
            self.entries.remove(&key);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three cache tiers bundled for injection.
pub struct CacheService {
    pub responses: TtlCache<serde_json::Value>,
    pub users: TtlCache<User>,
    pub posts: TtlCache<Post>,
}

impl CacheService {
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            responses: TtlCache::new(clock.clone(), config.response_ttl_secs),
            users: TtlCache::new(clock.clone(), config.user_ttl_secs),
            posts: TtlCache::new(clock, config.post_ttl_secs),
        }
    }

    /// Typed read of a cached listing payload.
    pub fn get_response<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.responses.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => {
                debug!("response cache hit for {}", key);
                Some(decoded)
            }
            Err(err) => {
                debug!("dropping undecodable response cache entry {}: {}", key, err);
                self.responses.remove(key);
                None
            }
        }
    }

    pub fn put_response<T: Serialize>(&self, key: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.responses.set(key, value),
            Err(err) => debug!("response cache serialization failed for {}: {}", key, err),
        }
    }

    pub fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id.to_string())
    }

    pub fn put_user(&self, user: &User) {
        self.users.set(&user.id.to_string(), user.clone());
    }

    pub fn get_post(&self, id: Uuid) -> Option<Post> {
        self.posts.get(&id.to_string())
    }

    pub fn put_post(&self, post: &Post) {
        self.posts.set(&post.id.to_string(), post.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn expired_entry_reads_as_miss_and_is_deleted() {
        let clock = ManualClock::new(0);
        let cache: TtlCache<u32> = TtlCache::new(clock.clone(), 30);
        cache.set("k", 7);
        assert_eq!(cache.get("k"), Some(7));

        clock.advance_ms(29_999);
        assert_eq!(cache.get("k"), Some(7));

        clock.advance_ms(1);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn remove_prefix_only_touches_matching_keys() {
        let clock = ManualClock::new(0);
        let cache: TtlCache<u32> = TtlCache::new(clock, 30);
        cache.set("explore:a", 1);
        cache.set("explore:b", 2);
        cache.set("bookmarks:a", 3);

        assert_eq!(cache.remove_prefix("explore:"), 2);
        assert_eq!(cache.get("explore:a"), None);
        assert_eq!(cache.get("bookmarks:a"), Some(3));
    }

    #[test]
    fn tiers_have_independent_ttls() {
        let clock = ManualClock::new(0);
        let service = CacheService::new(&EngineConfig::default(), clock.clone());

        service.put_response("explore:x", &vec![1u32, 2, 3]);
        let user = crate::models::User {
            id: Uuid::new_v4(),
            username: "u".into(),
            display_name: "U".into(),
            avatar_url: None,
            bio: None,
            role: crate::models::Role::User,
            created_at: 0,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            legal_name: None,
            email: None,
            phone: None,
            password_hash: None,
            birth_date: None,
            address: None,
            ip_address: None,
            device_id: None,
            billing_ref: None,
        };
        service.put_user(&user);

        // 31s: response tier expired, user tier still warm
        clock.advance_ms(31_000);
        assert!(service.get_response::<Vec<u32>>("explore:x").is_none());
        assert!(service.get_user(user.id).is_some());

        // 301s: user tier expired too
        clock.advance_ms(270_000);
        assert!(service.get_user(user.id).is_none());
    }
}
