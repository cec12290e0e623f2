/// Feed Engine Library
///
/// Turns ordered indexes of post ids into fully materialized,
/// privacy-redacted, engagement-ranked, paginated listings while minimizing
/// round trips to the remote key-value store through layered caching.
///
/// # Modules
///
/// - `cache`: three-tier in-process TTL cache and the invalidation fan-out
/// - `clock`: injectable millisecond wall-clock
/// - `config`: engine configuration
/// - `error`: error types and handling
/// - `keys`: store and cache key formats
/// - `models`: posts, users, listing items, auth context
/// - `services`: business logic layer (listings, mutations, search)
/// - `store`: remote key-value store trait with Redis, in-memory, and
///   call-counting backends
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod services;
pub mod store;

pub use cache::{CacheInvalidator, CacheService};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{AppError, Result};
pub use models::{AuthContext, FeedItem, HashtagFeedMode, Post, Role, User};
pub use services::{
    CreatePostInput, EngineContext, FeedQueryService, InteractionService, PostService,
    ProfileService, SearchService, SocialGraphService, UpdateProfileInput,
};
pub use store::{KvStore, MemoryStore, RedisKvStore};
