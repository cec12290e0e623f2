//! Batch fetcher / deduplicator.
//!
//! Resolves an ordered list of post ids into materialized feed items with
//! the minimum number of store round trips: one batched fetch for post-cache
//! misses, at most one for author-cache misses, and at most one for the
//! viewer's like/bookmark membership flags. Ids whose backing data has
//! vanished (missing, undecodable, or banned) are dropped, never an error.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::CacheService;
use crate::error::Result;
use crate::keys;
use crate::models::{FeedItem, Post, User};
use crate::services::privacy::redact;
use crate::store::KvStore;

pub struct BatchFetcher<'a> {
    store: &'a dyn KvStore,
    cache: &'a CacheService,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(store: &'a dyn KvStore, cache: &'a CacheService) -> Self {
        Self { store, cache }
    }

    /// Materialize `ids` in order. See the module docs for the round-trip
    /// contract; an empty input returns empty without touching the store.
    pub async fn fetch_posts(
        &self,
        ids: &[String],
        include_author: bool,
        viewer: Option<Uuid>,
    ) -> Result<Vec<FeedItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let posts = self.resolve_posts(ids).await?;
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let authors = if include_author {
            self.resolve_authors(&posts, viewer).await?
        } else {
            HashMap::new()
        };

        let flags = match viewer {
            Some(viewer_id) => self.resolve_viewer_flags(&posts, viewer_id).await,
            None => vec![(false, false); posts.len()],
        };

        Ok(posts
            .into_iter()
            .zip(flags)
            .map(|(post, (is_liked, is_bookmarked))| {
                let author = authors.get(&post.author_id).cloned();
                FeedItem {
                    post,
                    author,
                    is_liked,
                    is_bookmarked,
                }
            })
            .collect())
    }

    /// Cache-partitioned post resolution preserving input order; drops
    /// duplicates, unresolvable ids, and banned posts.
    async fn resolve_posts(&self, ids: &[String]) -> Result<Vec<Post>> {
        let mut parsed: Vec<Uuid> = Vec::with_capacity(ids.len());
        for raw in ids {
            match Uuid::parse_str(raw) {
                Ok(id) if !parsed.contains(&id) => parsed.push(id),
                Ok(_) => {}
                Err(_) => debug!("dropping malformed post id {} from index window", raw),
            }
        }

        let mut resolved: HashMap<Uuid, Post> = HashMap::new();
        let mut misses: Vec<Uuid> = Vec::new();
        for id in &parsed {
            match self.cache.get_post(*id) {
                Some(post) => {
                    resolved.insert(*id, post);
                }
                None => misses.push(*id),
            }
        }

        if !misses.is_empty() {
            let miss_keys: Vec<String> = misses.iter().map(|id| keys::post(*id)).collect();
            let fetched = self.store.hash_get_all_many(&miss_keys).await?;
            for (id, fields) in misses.iter().zip(fetched) {
                if fields.is_empty() {
                    continue;
                }
                let Some(post) = Post::from_fields(&fields) else {
                    debug!("dropping undecodable post {}", id);
                    continue;
                };
                self.cache.put_post(&post);
                resolved.insert(*id, post);
            }
        }

        Ok(parsed
            .into_iter()
            .filter_map(|id| resolved.remove(&id))
            .filter(|post| !post.banned)
            .collect())
    }

    /// One batched fetch for authors not already warm in the user cache,
    /// then redaction against the viewer.
    async fn resolve_authors(
        &self,
        posts: &[Post],
        viewer: Option<Uuid>,
    ) -> Result<HashMap<Uuid, User>> {
        let mut author_ids: Vec<Uuid> = Vec::new();
        for post in posts {
            if !author_ids.contains(&post.author_id) {
                author_ids.push(post.author_id);
            }
        }

        let mut authors: HashMap<Uuid, User> = HashMap::new();
        let mut misses: Vec<Uuid> = Vec::new();
        for id in &author_ids {
            match self.cache.get_user(*id) {
                Some(user) => {
                    authors.insert(*id, user);
                }
                None => misses.push(*id),
            }
        }

        if !misses.is_empty() {
            let miss_keys: Vec<String> = misses.iter().map(|id| keys::user(*id)).collect();
            let fetched = self.store.hash_get_all_many(&miss_keys).await?;
            for (id, fields) in misses.iter().zip(fetched) {
                if fields.is_empty() {
                    continue;
                }
                if let Some(user) = User::from_fields(&fields) {
                    self.cache.put_user(&user);
                    authors.insert(*id, user);
                }
            }
        }

        Ok(authors
            .into_iter()
            .map(|(id, user)| {
                let redacted = redact(&user, id, viewer);
                (id, redacted)
            })
            .collect())
    }

    /// One batched round trip checking like and bookmark membership for every
    /// surviving post (two checks per post). Any failure degrades to
    /// all-false flags rather than failing the listing.
    async fn resolve_viewer_flags(&self, posts: &[Post], viewer: Uuid) -> Vec<(bool, bool)> {
        let member = viewer.to_string();
        let checks: Vec<(String, String)> = posts
            .iter()
            .flat_map(|post| {
                [
                    (keys::post_likers(post.id), member.clone()),
                    (keys::post_bookmarkers(post.id), member.clone()),
                ]
            })
            .collect();

        match self.store.set_contains_many(&checks).await {
            Ok(flags) if flags.len() == checks.len() => flags
                .chunks(2)
                .map(|pair| (pair[0], pair[1]))
                .collect(),
            Ok(_) => {
                warn!("viewer flag batch returned wrong arity; defaulting to false");
                vec![(false, false); posts.len()]
            }
            Err(err) => {
                warn!("viewer flag batch failed: {}; defaulting to false", err);
                vec![(false, false); posts.len()]
            }
        }
    }
}
