//! Listing reads: explore, following, hashtag, and bookmark feeds.
//!
//! Every listing consults the response cache first; a miss drives the
//! pagination engine and the computed payload is cached for the response
//! TTL. Cache keys carry every argument that shapes the payload, the viewer
//! included, since interaction flags and redaction are viewer-specific.

use std::cmp::Ordering;
use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::keys;
use crate::models::{FeedItem, HashtagFeedMode};
use crate::services::hashtags::normalize_tag;
use crate::services::pagination::{PageRequest, Paginator};
use crate::services::EngineContext;
use crate::store::KvStore;

pub struct FeedQueryService {
    ctx: EngineContext,
}

impl FeedQueryService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    fn clamp(&self, limit: u64) -> u64 {
        limit.min(self.ctx.config.max_page_size)
    }

    /// Global chronological feed.
    pub async fn list_explore_feed(
        &self,
        viewer: Option<Uuid>,
        offset: u64,
        limit: u64,
        include_author: bool,
    ) -> Result<Vec<FeedItem>> {
        let scope = self.ctx.begin_request();
        let limit = self.clamp(limit);
        let key = keys::explore_response(viewer, offset, limit, include_author);
        if let Some(items) = self.ctx.cache.get_response::<Vec<FeedItem>>(&key) {
            scope.finish("list_explore_feed");
            return Ok(items);
        }

        let store = scope.store();
        let paginator = Paginator::new(store.as_ref(), &self.ctx.cache, &self.ctx.config);
        let req = PageRequest {
            offset,
            limit,
            include_author,
            viewer,
        };
        let result = paginator.paginate_index(&keys::global_feed(), &req).await;
        scope.finish("list_explore_feed");

        let items = result?;
        self.ctx.cache.put_response(&key, &items);
        Ok(items)
    }

    /// Posts authored by users the viewer follows, newest first.
    ///
    /// Steady-state data carries per-author indexes (a write-time invariant
    /// marked in the schema capability set); those are merged in one
    /// pipelined read. Absent the marker the engine falls back to scanning
    /// the global index filtered by the following set, bounded by the scan
    /// ceiling.
    pub async fn list_following_feed(
        &self,
        viewer: Uuid,
        offset: u64,
        limit: u64,
        include_author: bool,
    ) -> Result<Vec<FeedItem>> {
        let scope = self.ctx.begin_request();
        let limit = self.clamp(limit);
        let key = keys::following_response(viewer, offset, limit, include_author);
        if let Some(items) = self.ctx.cache.get_response::<Vec<FeedItem>>(&key) {
            scope.finish("list_following_feed");
            return Ok(items);
        }

        let store = scope.store();
        let result = self
            .following_inner(store.as_ref(), viewer, offset, limit, include_author)
            .await;
        scope.finish("list_following_feed");

        let items = result?;
        self.ctx.cache.put_response(&key, &items);
        Ok(items)
    }

    async fn following_inner(
        &self,
        store: &dyn KvStore,
        viewer: Uuid,
        offset: u64,
        limit: u64,
        include_author: bool,
    ) -> Result<Vec<FeedItem>> {
        let followed: Vec<Uuid> = store
            .set_members(&keys::following(viewer))
            .await?
            .iter()
            .filter_map(|raw| Uuid::parse_str(raw).ok())
            .collect();
        if followed.is_empty() {
            return Ok(Vec::new());
        }

        let req = PageRequest {
            offset,
            limit,
            include_author,
            viewer: Some(viewer),
        };
        let paginator = Paginator::new(store, &self.ctx.cache, &self.ctx.config);

        let has_author_indexes = store
            .set_contains(&keys::schema_capabilities(), keys::AUTHOR_INDEX_CAPABILITY)
            .await?;
        if !has_author_indexes {
            let allowed: HashSet<Uuid> = followed.into_iter().collect();
            return paginator
                .paginate_index_filtered(&keys::global_feed(), &req, &allowed)
                .await;
        }

        // Enough entries from each author to cover the requested page even
        // if one author wrote everything on it.
        let per_author = offset + limit * self.ctx.config.page_window_multiplier;
        let index_keys: Vec<String> = followed.iter().map(|id| keys::author_posts(*id)).collect();
        let ranges = store.sorted_top_many(&index_keys, per_author).await?;

        let mut merged: Vec<(String, f64)> = ranges.into_iter().flatten().collect();
        merged.sort_by(|a, b| match b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal) {
            Ordering::Equal => b.0.cmp(&a.0),
            other => other,
        });
        let ids: Vec<String> = merged.into_iter().map(|(id, _)| id).collect();

        paginator.paginate_ids(&ids, &req).await
    }

    /// Per-hashtag feed, chronological or engagement-ranked.
    pub async fn list_hashtag_feed(
        &self,
        viewer: Option<Uuid>,
        tag: &str,
        mode: HashtagFeedMode,
        offset: u64,
        limit: u64,
        include_author: bool,
    ) -> Result<Vec<FeedItem>> {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return Err(AppError::Validation("hashtag must not be empty".into()));
        }

        let scope = self.ctx.begin_request();
        let limit = self.clamp(limit);
        let key = keys::hashtag_response(viewer, &tag, mode.as_str(), offset, limit, include_author);
        if let Some(items) = self.ctx.cache.get_response::<Vec<FeedItem>>(&key) {
            scope.finish("list_hashtag_feed");
            return Ok(items);
        }

        let index_key = match mode {
            HashtagFeedMode::Chronological => keys::hashtag_posts(&tag),
            HashtagFeedMode::Ranked => keys::hashtag_ranked(&tag),
        };
        let store = scope.store();
        let paginator = Paginator::new(store.as_ref(), &self.ctx.cache, &self.ctx.config);
        let req = PageRequest {
            offset,
            limit,
            include_author,
            viewer,
        };
        let result = paginator.paginate_index(&index_key, &req).await;
        scope.finish("list_hashtag_feed");

        let items = result?;
        self.ctx.cache.put_response(&key, &items);
        Ok(items)
    }

    /// The viewer's bookmarks, most recently bookmarked first.
    pub async fn list_bookmarks(
        &self,
        viewer: Uuid,
        offset: u64,
        limit: u64,
        include_author: bool,
    ) -> Result<Vec<FeedItem>> {
        let scope = self.ctx.begin_request();
        let limit = self.clamp(limit);
        let key = keys::bookmarks_response(viewer, offset, limit, include_author);
        if let Some(items) = self.ctx.cache.get_response::<Vec<FeedItem>>(&key) {
            scope.finish("list_bookmarks");
            return Ok(items);
        }

        let store = scope.store();
        let paginator = Paginator::new(store.as_ref(), &self.ctx.cache, &self.ctx.config);
        let req = PageRequest {
            offset,
            limit,
            include_author,
            viewer: Some(viewer),
        };
        let result = paginator.paginate_index(&keys::bookmarks(viewer), &req).await;
        scope.finish("list_bookmarks");

        let items = result?;
        self.ctx.cache.put_response(&key, &items);
        Ok(items)
    }
}
