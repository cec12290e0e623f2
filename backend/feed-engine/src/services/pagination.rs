//! Buffered, retrying pagination over ordered indexes.
//!
//! Index entries can reference posts that were deleted or banned after the
//! entry was written. Each round therefore pulls a window of `limit * 2` raw
//! ids, hydrates them through the batch fetcher, and keeps going until the
//! requested count is met or the index is exhausted, so callers never see
//! the entity loss rate.

use std::collections::HashSet;

use uuid::Uuid;

use crate::cache::CacheService;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::FeedItem;
use crate::services::fetcher::BatchFetcher;
use crate::store::KvStore;

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
    pub include_author: bool,
    pub viewer: Option<Uuid>,
}

pub struct Paginator<'a> {
    store: &'a dyn KvStore,
    cache: &'a CacheService,
    config: &'a EngineConfig,
}

impl<'a> Paginator<'a> {
    pub fn new(store: &'a dyn KvStore, cache: &'a CacheService, config: &'a EngineConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    fn clamped_limit(&self, limit: u64) -> u64 {
        limit.min(self.config.max_page_size)
    }

    /// Page through a source index until `limit` surviving results are
    /// buffered or the index runs out.
    pub async fn paginate_index(&self, index_key: &str, req: &PageRequest) -> Result<Vec<FeedItem>> {
        self.paginate_index_inner(index_key, req, None, u64::MAX)
            .await
    }

    /// Fallback path scanning a global index while keeping only posts whose
    /// author is in `allowed_authors`. The running offset is hard-capped so
    /// a sparse match rate yields an incomplete page instead of an unbounded
    /// scan.
    pub async fn paginate_index_filtered(
        &self,
        index_key: &str,
        req: &PageRequest,
        allowed_authors: &HashSet<Uuid>,
    ) -> Result<Vec<FeedItem>> {
        self.paginate_index_inner(
            index_key,
            req,
            Some(allowed_authors),
            self.config.fallback_scan_ceiling,
        )
        .await
    }

    async fn paginate_index_inner(
        &self,
        index_key: &str,
        req: &PageRequest,
        allowed_authors: Option<&HashSet<Uuid>>,
        offset_ceiling: u64,
    ) -> Result<Vec<FeedItem>> {
        let limit = self.clamped_limit(req.limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let window = limit * self.config.page_window_multiplier;
        let fetcher = BatchFetcher::new(self.store, self.cache);

        let mut results: Vec<FeedItem> = Vec::new();
        let mut cursor = req.offset;
        loop {
            if cursor >= offset_ceiling {
                break;
            }
            let raw = self.store.sorted_range_rev(index_key, cursor, window).await?;
            if raw.is_empty() {
                break;
            }
            cursor += raw.len() as u64;

            let mut items = fetcher
                .fetch_posts(&raw, req.include_author, req.viewer)
                .await?;
            if let Some(allowed) = allowed_authors {
                items.retain(|item| allowed.contains(&item.post.author_id));
            }
            results.extend(items);

            if results.len() as u64 >= limit {
                break;
            }
        }

        results.truncate(limit as usize);
        Ok(results)
    }

    /// Same buffering loop over an id list already merged in memory (the
    /// following feed's per-author merge).
    pub async fn paginate_ids(&self, ids: &[String], req: &PageRequest) -> Result<Vec<FeedItem>> {
        let limit = self.clamped_limit(req.limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let window = (limit * self.config.page_window_multiplier) as usize;
        let fetcher = BatchFetcher::new(self.store, self.cache);

        let mut results: Vec<FeedItem> = Vec::new();
        let mut cursor = req.offset as usize;
        while cursor < ids.len() {
            let end = (cursor + window).min(ids.len());
            let raw = &ids[cursor..end];
            cursor = end;

            let items = fetcher
                .fetch_posts(raw, req.include_author, req.viewer)
                .await?;
            results.extend(items);

            if results.len() as u64 >= limit {
                break;
            }
        }

        results.truncate(limit as usize);
        Ok(results)
    }
}
