//! Search listings: newest users by role, top posts per hashtag, top models.
//!
//! All search results are anonymous-viewer payloads: embedded profiles are
//! always redacted and no interaction flags are attached, so the cache keys
//! carry no viewer component.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::keys;
use crate::models::{FeedItem, Role, User};
use crate::services::fetcher::BatchFetcher;
use crate::services::hashtags::normalize_tag;
use crate::services::privacy::redact;
use crate::services::EngineContext;
use crate::store::KvStore;

/// Top posts for one requested hashtag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagTopPosts {
    pub tag: String,
    pub posts: Vec<FeedItem>,
}

pub struct SearchService {
    ctx: EngineContext,
}

impl SearchService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    fn clamp(&self, limit: u64) -> u64 {
        limit.min(self.ctx.config.max_page_size)
    }

    /// Most recently created users of a given role.
    pub async fn search_newest_users(&self, role: Role, limit: u64) -> Result<Vec<User>> {
        let scope = self.ctx.begin_request();
        let limit = self.clamp(limit);
        let key = keys::newest_users_response(role, limit);
        if let Some(users) = self.ctx.cache.get_response::<Vec<User>>(&key) {
            scope.finish("search_newest_users");
            return Ok(users);
        }

        let store = scope.store();
        let result = async {
            let ids = store
                .sorted_range_rev(&keys::newest_users(role), 0, limit)
                .await?;
            self.resolve_users(store.as_ref(), &ids).await
        }
        .await;
        scope.finish("search_newest_users");

        let users = result?;
        self.ctx.cache.put_response(&key, &users);
        Ok(users)
    }

    /// Top engagement-ranked posts for each requested hashtag.
    pub async fn search_hashtag_top_posts(
        &self,
        tags: &[String],
        per_tag: u64,
    ) -> Result<Vec<HashtagTopPosts>> {
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags {
            let tag = normalize_tag(tag);
            if !tag.is_empty() && !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }
        let per_tag = self.clamp(per_tag);
        if normalized.is_empty() || per_tag == 0 {
            return Ok(Vec::new());
        }

        let scope = self.ctx.begin_request();
        let key = keys::hashtag_top_response(&normalized, per_tag);
        if let Some(result) = self.ctx.cache.get_response::<Vec<HashtagTopPosts>>(&key) {
            scope.finish("search_hashtag_top_posts");
            return Ok(result);
        }

        let store = scope.store();
        let result = self
            .hashtag_top_inner(store.as_ref(), &normalized, per_tag)
            .await;
        scope.finish("search_hashtag_top_posts");

        let payload = result?;
        self.ctx.cache.put_response(&key, &payload);
        Ok(payload)
    }

    async fn hashtag_top_inner(
        &self,
        store: &dyn KvStore,
        tags: &[String],
        per_tag: u64,
    ) -> Result<Vec<HashtagTopPosts>> {
        // Over-fetch per tag so ids whose posts have vanished do not thin
        // out the result below per_tag.
        let take = per_tag * self.ctx.config.page_window_multiplier;
        let index_keys: Vec<String> = tags.iter().map(|tag| keys::hashtag_ranked(tag)).collect();
        let ranges = store.sorted_top_many(&index_keys, take).await?;

        let fetcher = BatchFetcher::new(store, &self.ctx.cache);
        let mut result = Vec::with_capacity(tags.len());
        for (tag, range) in tags.iter().zip(ranges) {
            let ids: Vec<String> = range.into_iter().map(|(id, _)| id).collect();
            let mut posts = fetcher.fetch_posts(&ids, true, None).await?;
            posts.truncate(per_tag as usize);
            result.push(HashtagTopPosts {
                tag: tag.clone(),
                posts,
            });
        }
        Ok(result)
    }

    /// Models ranked by accumulated interaction weight.
    pub async fn search_top_models(&self, limit: u64) -> Result<Vec<User>> {
        let scope = self.ctx.begin_request();
        let limit = self.clamp(limit);
        let key = keys::top_models_response(limit);
        if let Some(users) = self.ctx.cache.get_response::<Vec<User>>(&key) {
            scope.finish("search_top_models");
            return Ok(users);
        }

        let store = scope.store();
        let result: Result<Vec<User>> = async {
            let ids = store
                .sorted_range_rev(&keys::model_engagement(), 0, limit)
                .await?;
            let users = self.resolve_users(store.as_ref(), &ids).await?;
            // The engagement index can lag a role change; drop non-models.
            Ok(users
                .into_iter()
                .filter(|u| u.role == Role::Model)
                .collect())
        }
        .await;
        scope.finish("search_top_models");

        let users = result?;
        self.ctx.cache.put_response(&key, &users);
        Ok(users)
    }

    /// Cache-partitioned batched user hydration preserving input order,
    /// dropping unresolvable ids, redacting for the anonymous viewer.
    async fn resolve_users(&self, store: &dyn KvStore, ids: &[String]) -> Result<Vec<User>> {
        let mut parsed: Vec<Uuid> = Vec::new();
        for raw in ids {
            if let Ok(id) = Uuid::parse_str(raw) {
                if !parsed.contains(&id) {
                    parsed.push(id);
                }
            }
        }
        if parsed.is_empty() {
            return Ok(Vec::new());
        }

        let mut resolved: HashMap<Uuid, User> = HashMap::new();
        let mut misses: Vec<Uuid> = Vec::new();
        for id in &parsed {
            match self.ctx.cache.get_user(*id) {
                Some(user) => {
                    resolved.insert(*id, user);
                }
                None => misses.push(*id),
            }
        }
        if !misses.is_empty() {
            let miss_keys: Vec<String> = misses.iter().map(|id| keys::user(*id)).collect();
            let fetched = store.hash_get_all_many(&miss_keys).await?;
            for (id, fields) in misses.iter().zip(fetched) {
                if fields.is_empty() {
                    continue;
                }
                if let Some(user) = User::from_fields(&fields) {
                    self.ctx.cache.put_user(&user);
                    resolved.insert(*id, user);
                }
            }
        }

        Ok(parsed
            .into_iter()
            .filter_map(|id| resolved.remove(&id))
            .map(|user| redact(&user, user.id, None))
            .collect())
    }
}
