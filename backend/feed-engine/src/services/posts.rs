//! Post lifecycle: creation, deletion, moderation ban.

use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::keys;
use crate::models::{AuthContext, AuthorSnapshot, Post};
use crate::services::hashtags::extract_hashtags;
use crate::services::ranking::engagement_score;
use crate::services::{ensure_can_modify, load_post, load_user, EngineContext};
use crate::store::{KvStore, WriteOp};

const MAX_CONTENT_LEN: usize = 5_000;

#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub content: String,
    pub media_url: Option<String>,
}

pub struct PostService {
    ctx: EngineContext,
}

impl PostService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Create a post under the caller's identity.
    ///
    /// The author snapshot, the global index, the author's own index, and
    /// every hashtag index move in one atomic write batch.
    pub async fn create_post(&self, auth: AuthContext, input: CreatePostInput) -> Result<Post> {
        let scope = self.ctx.begin_request();
        let result = self.create_post_inner(scope.store().as_ref(), auth, input).await;
        scope.finish("create_post");
        result
    }

    async fn create_post_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        input: CreatePostInput,
    ) -> Result<Post> {
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Validation("post content must not be empty".into()));
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(AppError::Validation(format!(
                "post content exceeds {MAX_CONTENT_LEN} characters"
            )));
        }

        let author = load_user(store, auth.subject_id).await?;
        let now = self.ctx.clock.now_ms();
        let post = Post {
            id: Uuid::new_v4(),
            author_id: author.id,
            author: AuthorSnapshot::of(&author),
            content,
            media_url: input.media_url,
            created_at: now,
            likes_count: 0,
            comments_count: 0,
            bookmarks_count: 0,
            banned: false,
            banned_by: None,
            banned_at: None,
        };

        let member = post.id.to_string();
        let created = post.created_at as f64;
        let mut ops = vec![
            WriteOp::HashSet {
                key: keys::post(post.id),
                fields: post.to_fields(),
            },
            WriteOp::SortedAdd {
                key: keys::global_feed(),
                member: member.clone(),
                score: created,
            },
            WriteOp::SortedAdd {
                key: keys::author_posts(author.id),
                member: member.clone(),
                score: created,
            },
            // Write-time invariant: data written by this engine always has
            // per-author indexes, and the marker says so.
            WriteOp::SetAdd {
                key: keys::schema_capabilities(),
                member: keys::AUTHOR_INDEX_CAPABILITY.into(),
            },
            WriteOp::HashIncr {
                key: keys::user(author.id),
                field: "posts_count".into(),
                delta: 1,
            },
        ];
        let initial_score = engagement_score(0, 0, 0, post.created_at, now);
        for tag in extract_hashtags(&post.content) {
            ops.push(WriteOp::SortedAdd {
                key: keys::hashtag_posts(&tag),
                member: member.clone(),
                score: created,
            });
            ops.push(WriteOp::SortedAdd {
                key: keys::hashtag_ranked(&tag),
                member: member.clone(),
                score: initial_score,
            });
        }
        store.execute(ops).await?;

        self.ctx.invalidator.purge_listings();
        self.ctx.invalidator.purge_user(author.id);
        info!(post_id = %post.id, author_id = %author.id, "post created");
        Ok(post)
    }

    /// Hard-delete a post. Author or admin only.
    pub async fn delete_post(&self, auth: AuthContext, post_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.delete_post_inner(scope.store().as_ref(), auth, post_id).await;
        scope.finish("delete_post");
        result
    }

    async fn delete_post_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        post_id: Uuid,
    ) -> Result<()> {
        let post = load_post(store, post_id).await?;
        ensure_can_modify(&auth, post.resource(), "a post")?;

        let bookmarkers = store.set_members(&keys::post_bookmarkers(post.id)).await?;
        let mut ops = removal_ops(&post, &bookmarkers);
        ops.push(WriteOp::Delete {
            key: keys::post(post.id),
        });
        ops.push(WriteOp::HashIncr {
            key: keys::user(post.author_id),
            field: "posts_count".into(),
            delta: -1,
        });
        store.execute(ops).await?;

        self.ctx.invalidator.purge_listings();
        self.ctx.invalidator.purge_post(post.id);
        self.ctx.invalidator.purge_user(post.author_id);
        info!(post_id = %post.id, deleted_by = %auth.subject_id, "post deleted");
        Ok(())
    }

    /// Moderation ban. Admin only: strips interaction sets and every index
    /// membership but retains the post hash with audit fields.
    pub async fn ban_post(&self, auth: AuthContext, post_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.ban_post_inner(scope.store().as_ref(), auth, post_id).await;
        scope.finish("ban_post");
        result
    }

    async fn ban_post_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        post_id: Uuid,
    ) -> Result<()> {
        if !auth.is_admin() {
            return Err(AppError::Forbidden("only admins may ban posts".into()));
        }
        let post = load_post(store, post_id).await?;
        if post.banned {
            return Err(AppError::Conflict(format!("post {post_id} is already banned")));
        }

        let bookmarkers = store.set_members(&keys::post_bookmarkers(post.id)).await?;
        let mut ops = removal_ops(&post, &bookmarkers);
        ops.push(WriteOp::HashSet {
            key: keys::post(post.id),
            fields: vec![
                ("banned".into(), "1".into()),
                ("banned_by".into(), auth.subject_id.to_string()),
                ("banned_at".into(), self.ctx.clock.now_ms().to_string()),
            ],
        });
        store.execute(ops).await?;

        self.ctx.invalidator.purge_listings();
        self.ctx.invalidator.purge_post(post.id);
        info!(post_id = %post.id, banned_by = %auth.subject_id, "post banned");
        Ok(())
    }
}

/// Ops removing a post from every surface it appears on: its interaction
/// sets, the global and author indexes, each hashtag index, and each
/// bookmarker's bookmark index. Does not touch the post hash itself so the
/// delete and ban paths can share it.
pub(crate) fn removal_ops(post: &Post, bookmarkers: &[String]) -> Vec<WriteOp> {
    let member = post.id.to_string();
    let mut ops = vec![
        WriteOp::Delete {
            key: keys::post_likers(post.id),
        },
        WriteOp::Delete {
            key: keys::post_bookmarkers(post.id),
        },
        WriteOp::SortedRemove {
            key: keys::global_feed(),
            member: member.clone(),
        },
        WriteOp::SortedRemove {
            key: keys::author_posts(post.author_id),
            member: member.clone(),
        },
    ];
    for tag in extract_hashtags(&post.content) {
        ops.push(WriteOp::SortedRemove {
            key: keys::hashtag_posts(&tag),
            member: member.clone(),
        });
        ops.push(WriteOp::SortedRemove {
            key: keys::hashtag_ranked(&tag),
            member: member.clone(),
        });
    }
    for bookmarker in bookmarkers {
        if let Ok(user_id) = Uuid::parse_str(bookmarker) {
            ops.push(WriteOp::SortedRemove {
                key: keys::bookmarks(user_id),
                member: member.clone(),
            });
        }
    }
    ops
}
