//! Profile reads, profile edits, and the account-deletion cascade.

use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::keys;
use crate::models::{AuthContext, Post, ResourceRef, User};
use crate::services::posts::removal_ops;
use crate::services::privacy::redact;
use crate::services::ranking::{model_engagement_op, rerank_ops, BOOKMARK_WEIGHT};
use crate::services::{ensure_can_modify, load_user, EngineContext};
use crate::store::{KvStore, WriteOp};

#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

pub struct ProfileService {
    ctx: EngineContext,
}

impl ProfileService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Fetch a profile through the user-entity cache and redact it for the
    /// viewer.
    pub async fn get_user_profile(&self, user_id: Uuid, viewer: Option<Uuid>) -> Result<User> {
        let scope = self.ctx.begin_request();
        let result = self.get_profile_inner(scope.store().as_ref(), user_id, viewer).await;
        scope.finish("get_user_profile");
        result
    }

    async fn get_profile_inner(
        &self,
        store: &dyn KvStore,
        user_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<User> {
        let user = match self.ctx.cache.get_user(user_id) {
            Some(user) => user,
            None => {
                let user = load_user(store, user_id).await?;
                self.ctx.cache.put_user(&user);
                user
            }
        };
        Ok(redact(&user, user_id, viewer))
    }

    /// Update the caller's own profile. Edits touching the denormalized
    /// author fields (username, display name, avatar) are re-propagated onto
    /// every post the caller authored, in the same write batch.
    pub async fn update_profile(&self, auth: AuthContext, input: UpdateProfileInput) -> Result<User> {
        let scope = self.ctx.begin_request();
        let result = self.update_profile_inner(scope.store().as_ref(), auth, input).await;
        scope.finish("update_profile");
        result
    }

    async fn update_profile_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        input: UpdateProfileInput,
    ) -> Result<User> {
        if input.username.is_none()
            && input.display_name.is_none()
            && input.avatar_url.is_none()
            && input.bio.is_none()
        {
            return Err(AppError::Validation("no profile fields to update".into()));
        }
        if let Some(username) = &input.username {
            if username.trim().is_empty() {
                return Err(AppError::Validation("username must not be empty".into()));
            }
        }

        let mut user = load_user(store, auth.subject_id).await?;
        let snapshot_changed = input.username.is_some()
            || input.display_name.is_some()
            || input.avatar_url.is_some();

        if let Some(username) = input.username {
            user.username = username.trim().to_string();
        }
        if let Some(display_name) = input.display_name {
            user.display_name = display_name;
        }
        if let Some(avatar_url) = input.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(bio) = input.bio {
            user.bio = Some(bio);
        }

        let mut ops = vec![WriteOp::HashSet {
            key: keys::user(user.id),
            fields: user.to_fields(),
        }];

        let mut touched_posts: Vec<Uuid> = Vec::new();
        if snapshot_changed {
            for post_id in self.authored_post_ids(store, user.id).await? {
                let mut fields = vec![
                    ("author_username".into(), user.username.clone()),
                    ("author_display_name".into(), user.display_name.clone()),
                ];
                if let Some(avatar) = &user.avatar_url {
                    fields.push(("author_avatar_url".into(), avatar.clone()));
                }
                ops.push(WriteOp::HashSet {
                    key: keys::post(post_id),
                    fields,
                });
                touched_posts.push(post_id);
            }
        }
        store.execute(ops).await?;

        self.ctx.invalidator.purge_listings();
        self.ctx.invalidator.purge_user(user.id);
        self.ctx.invalidator.purge_posts(touched_posts);
        info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    /// Delete an account (self or admin) and cascade: every authored post,
    /// both sides of the follow graph, the bookmark index, and the search
    /// indexes the user appears in.
    pub async fn delete_user(&self, auth: AuthContext, user_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.delete_user_inner(scope.store().as_ref(), auth, user_id).await;
        scope.finish("delete_user");
        result
    }

    async fn delete_user_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        user_id: Uuid,
    ) -> Result<()> {
        ensure_can_modify(&auth, ResourceRef::user(user_id), "an account")?;
        let user = load_user(store, user_id).await?;
        let now = self.ctx.clock.now_ms();
        let member = user_id.to_string();
        let mut ops: Vec<WriteOp> = Vec::new();

        // Authored posts: full removal, index entries and interaction sets
        // included.
        let own_ids = self.authored_post_ids(store, user_id).await?;
        let own_posts = self.hydrate_posts(store, &own_ids).await?;
        let own_set: HashSet<Uuid> = own_posts.iter().map(|p| p.id).collect();
        for post in &own_posts {
            let bookmarkers = store.set_members(&keys::post_bookmarkers(post.id)).await?;
            ops.extend(removal_ops(post, &bookmarkers));
            ops.push(WriteOp::Delete {
                key: keys::post(post.id),
            });
        }

        // Bookmarks this user placed on other people's posts: membership,
        // counter, and ranked scores move together.
        let bookmarked_ids: Vec<Uuid> = self
            .hydrate_ids(store, &keys::bookmarks(user_id))
            .await?
            .into_iter()
            .filter(|id| !own_set.contains(id))
            .collect();
        let bookmarked_posts = self.hydrate_posts(store, &bookmarked_ids).await?;
        for post in &bookmarked_posts {
            ops.push(WriteOp::SetRemove {
                key: keys::post_bookmarkers(post.id),
                member: member.clone(),
            });
            ops.push(WriteOp::HashIncr {
                key: keys::post(post.id),
                field: "bookmarks_count".into(),
                delta: -1,
            });
            ops.extend(rerank_ops(
                post,
                post.likes_count,
                post.comments_count,
                post.bookmarks_count.saturating_sub(1),
                now,
            ));
            ops.extend(model_engagement_op(post, -BOOKMARK_WEIGHT));
        }

        // Both sides of the follow graph.
        let mut touched_users: Vec<Uuid> = Vec::new();
        for follower in store.set_members(&keys::followers(user_id)).await? {
            if let Ok(follower_id) = Uuid::parse_str(&follower) {
                ops.push(WriteOp::SetRemove {
                    key: keys::following(follower_id),
                    member: member.clone(),
                });
                ops.push(WriteOp::HashIncr {
                    key: keys::user(follower_id),
                    field: "following_count".into(),
                    delta: -1,
                });
                touched_users.push(follower_id);
            }
        }
        for followee in store.set_members(&keys::following(user_id)).await? {
            if let Ok(followee_id) = Uuid::parse_str(&followee) {
                ops.push(WriteOp::SetRemove {
                    key: keys::followers(followee_id),
                    member: member.clone(),
                });
                ops.push(WriteOp::HashIncr {
                    key: keys::user(followee_id),
                    field: "followers_count".into(),
                    delta: -1,
                });
                touched_users.push(followee_id);
            }
        }

        ops.push(WriteOp::Delete {
            key: keys::followers(user_id),
        });
        ops.push(WriteOp::Delete {
            key: keys::following(user_id),
        });
        ops.push(WriteOp::Delete {
            key: keys::bookmarks(user_id),
        });
        ops.push(WriteOp::Delete {
            key: keys::author_posts(user_id),
        });
        ops.push(WriteOp::SortedRemove {
            key: keys::newest_users(user.role),
            member: member.clone(),
        });
        ops.push(WriteOp::SortedRemove {
            key: keys::model_engagement(),
            member: member.clone(),
        });
        ops.push(WriteOp::Delete {
            key: keys::user(user_id),
        });
        store.execute(ops).await?;

        self.ctx.invalidator.purge_listings();
        self.ctx.invalidator.purge_user(user_id);
        for touched in touched_users {
            self.ctx.invalidator.purge_user(touched);
        }
        self.ctx.invalidator.purge_posts(own_set.into_iter());
        self.ctx.invalidator.purge_posts(bookmarked_ids);
        info!(user_id = %user_id, deleted_by = %auth.subject_id, "account deleted");
        Ok(())
    }

    /// Every post id authored by `author_id`. With the per-author-index
    /// capability present this is one index read; legacy data predating the
    /// indexes is found through a bounded scan of the global index filtered
    /// by author, capped at the same ceiling as the following-feed fallback.
    async fn authored_post_ids(&self, store: &dyn KvStore, author_id: Uuid) -> Result<Vec<Uuid>> {
        let has_author_indexes = store
            .set_contains(&keys::schema_capabilities(), keys::AUTHOR_INDEX_CAPABILITY)
            .await?;
        if has_author_indexes {
            return self.hydrate_ids(store, &keys::author_posts(author_id)).await;
        }

        let window = self.ctx.config.max_page_size * self.ctx.config.page_window_multiplier;
        let mut ids: Vec<Uuid> = Vec::new();
        let mut cursor = 0u64;
        while cursor < self.ctx.config.fallback_scan_ceiling {
            let raw = store
                .sorted_range_rev(&keys::global_feed(), cursor, window)
                .await?;
            if raw.is_empty() {
                break;
            }
            cursor += raw.len() as u64;
            let parsed: Vec<Uuid> = raw
                .iter()
                .filter_map(|r| Uuid::parse_str(r).ok())
                .collect();
            let posts = self.hydrate_posts(store, &parsed).await?;
            ids.extend(
                posts
                    .into_iter()
                    .filter(|p| p.author_id == author_id)
                    .map(|p| p.id),
            );
        }
        Ok(ids)
    }

    async fn hydrate_ids(&self, store: &dyn KvStore, index_key: &str) -> Result<Vec<Uuid>> {
        Ok(store
            .sorted_members_rev(index_key)
            .await?
            .iter()
            .filter_map(|raw| Uuid::parse_str(raw).ok())
            .collect())
    }

    async fn hydrate_posts(&self, store: &dyn KvStore, ids: &[Uuid]) -> Result<Vec<Post>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let post_keys: Vec<String> = ids.iter().map(|id| keys::post(*id)).collect();
        let fetched = store.hash_get_all_many(&post_keys).await?;
        Ok(fetched
            .iter()
            .filter(|fields| !fields.is_empty())
            .filter_map(|fields| Post::from_fields(fields))
            .collect())
    }
}
