//! Cache invalidation fan-out.
//!
//! Mutations that touch feed composition or profile visibility purge every
//! response-cache entry under the fixed listing prefixes. This is
//! deliberately coarse: one mutation invalidates all cached listings of
//! every affected kind. Entity caches are purged precisely by id.
//!
//! Invalidation runs synchronously right after the mutation's store
//! transaction commits and before the response is returned, so the stale
//! window is the invalidation call itself.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::cache::CacheService;
use crate::keys;

#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<CacheService>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Purge every cached listing payload across all listing-key families.
    pub fn purge_listings(&self) {
        let mut purged = 0;
        for prefix in keys::LISTING_PREFIXES {
            purged += self.cache.responses.remove_prefix(prefix);
        }
        if purged > 0 {
            debug!("invalidated {} cached listing responses", purged);
        }
    }

    /// Drop one post from the post-entity cache.
    pub fn purge_post(&self, post_id: Uuid) {
        self.cache.posts.remove(&post_id.to_string());
    }

    pub fn purge_posts<I: IntoIterator<Item = Uuid>>(&self, post_ids: I) {
        for id in post_ids {
            self.purge_post(id);
        }
    }

    /// Drop one user from the user-entity cache.
    pub fn purge_user(&self, user_id: Uuid) {
        self.cache.users.remove(&user_id.to_string());
    }
}
