//! Business logic layer.
//!
//! Each service owns one slice of the exposed surface and shares the
//! injected engine context: the remote store, the three-tier cache, the
//! invalidator, the clock, and configuration. Callers arrive with an
//! already-verified [`AuthContext`](crate::models::AuthContext); nothing
//! here parses tokens or routes requests.

pub mod feeds;
pub mod fetcher;
pub mod hashtags;
pub mod interactions;
pub mod pagination;
pub mod posts;
pub mod privacy;
pub mod profiles;
pub mod ranking;
pub mod search;
pub mod social;

pub use feeds::FeedQueryService;
pub use fetcher::BatchFetcher;
pub use interactions::InteractionService;
pub use pagination::{PageRequest, Paginator};
pub use posts::{CreatePostInput, PostService};
pub use profiles::{ProfileService, UpdateProfileInput};
pub use search::{HashtagTopPosts, SearchService};
pub use social::SocialGraphService;

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::{CacheInvalidator, CacheService};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::keys;
use crate::models::{AuthContext, Post, ResourceRef, User};
use crate::store::{KvStore, RequestScope};

/// Shared engine wiring injected into every service.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn KvStore>,
    pub cache: Arc<CacheService>,
    pub invalidator: CacheInvalidator,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
}

impl EngineContext {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let cache = Arc::new(CacheService::new(&config, clock.clone()));
        let invalidator = CacheInvalidator::new(cache.clone());
        Self {
            store,
            cache,
            invalidator,
            clock,
            config,
        }
    }

    /// Start a counted request scope over the shared store.
    pub fn begin_request(&self) -> RequestScope {
        RequestScope::new(self.store.clone())
    }
}

/// Load a post directly from the store; absent or undecodable is NotFound.
pub(crate) async fn load_post(store: &dyn KvStore, post_id: Uuid) -> Result<Post> {
    let fields = store.hash_get_all(&keys::post(post_id)).await?;
    if fields.is_empty() {
        return Err(AppError::NotFound(format!("post {post_id}")));
    }
    Post::from_fields(&fields).ok_or_else(|| AppError::NotFound(format!("post {post_id}")))
}

/// Load a post for an interaction mutation; banned posts read as absent.
pub(crate) async fn load_interactable_post(store: &dyn KvStore, post_id: Uuid) -> Result<Post> {
    let post = load_post(store, post_id).await?;
    if post.banned {
        return Err(AppError::NotFound(format!("post {post_id}")));
    }
    Ok(post)
}

/// Load a user directly from the store; absent or undecodable is NotFound.
pub(crate) async fn load_user(store: &dyn KvStore, user_id: Uuid) -> Result<User> {
    let fields = store.hash_get_all(&keys::user(user_id)).await?;
    if fields.is_empty() {
        return Err(AppError::NotFound(format!("user {user_id}")));
    }
    User::from_fields(&fields).ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
}

/// Ownership gate: owner or admin passes, everyone else is Forbidden.
pub(crate) fn ensure_can_modify(
    auth: &AuthContext,
    resource: ResourceRef,
    what: &str,
) -> Result<()> {
    if auth.can_modify(&resource) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{} may only be modified by its owner or an admin",
            what
        )))
    }
}
