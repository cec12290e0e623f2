#![allow(dead_code)]

use std::sync::Arc;

use feed_engine::models::{AuthContext, AuthorSnapshot, Post, Role, User};
use feed_engine::store::{KvStore, MemoryStore, WriteOp};
use feed_engine::{keys, Clock, EngineConfig, EngineContext, ManualClock};
use uuid::Uuid;

pub const T0: i64 = 1_700_000_000_000;

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub ctx: EngineContext,
}

pub fn setup() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(T0);
    let ctx = EngineContext::new(store.clone(), clock.clone(), EngineConfig::default());
    TestEnv { store, clock, ctx }
}

pub fn auth(user: &User) -> AuthContext {
    AuthContext::new(user.id, user.role)
}

/// Seed a user the way the external account system would: profile hash plus
/// the per-role newest-users index entry.
pub async fn seed_user(env: &TestEnv, username: &str, role: Role) -> User {
    let user = User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        display_name: format!("{username} display"),
        avatar_url: Some(format!("https://cdn/{username}.png")),
        bio: None,
        role,
        created_at: env.clock.now_ms(),
        followers_count: 0,
        following_count: 0,
        posts_count: 0,
        legal_name: Some(format!("{username} legal")),
        email: Some(format!("{username}@example.com")),
        phone: None,
        password_hash: Some("argon2id$stub".into()),
        birth_date: None,
        address: None,
        ip_address: Some("198.51.100.7".into()),
        device_id: None,
        billing_ref: None,
    };
    env.store
        .execute(vec![
            WriteOp::HashSet {
                key: keys::user(user.id),
                fields: user.to_fields(),
            },
            WriteOp::SortedAdd {
                key: keys::newest_users(role),
                member: user.id.to_string(),
                score: user.created_at as f64,
            },
        ])
        .await
        .unwrap();
    user
}

/// Seed a post as legacy data: hash plus global index entry only, with no
/// per-author index and no schema capability marker.
pub async fn seed_legacy_post(env: &TestEnv, author: &User, content: &str) -> Post {
    let post = Post {
        id: Uuid::new_v4(),
        author_id: author.id,
        author: AuthorSnapshot {
            username: author.username.clone(),
            display_name: author.display_name.clone(),
            avatar_url: author.avatar_url.clone(),
            role: author.role,
        },
        content: content.to_string(),
        media_url: None,
        created_at: env.clock.now_ms(),
        likes_count: 0,
        comments_count: 0,
        bookmarks_count: 0,
        banned: false,
        banned_by: None,
        banned_at: None,
    };
    env.store
        .execute(vec![
            WriteOp::HashSet {
                key: keys::post(post.id),
                fields: post.to_fields(),
            },
            WriteOp::SortedAdd {
                key: keys::global_feed(),
                member: post.id.to_string(),
                score: post.created_at as f64,
            },
        ])
        .await
        .unwrap();
    post
}

pub async fn likes_count(env: &TestEnv, post_id: Uuid) -> u64 {
    let fields = env.store.hash_get_all(&keys::post(post_id)).await.unwrap();
    fields
        .get("likes_count")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

pub async fn bookmarks_count(env: &TestEnv, post_id: Uuid) -> u64 {
    let fields = env.store.hash_get_all(&keys::post(post_id)).await.unwrap();
    fields
        .get("bookmarks_count")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
