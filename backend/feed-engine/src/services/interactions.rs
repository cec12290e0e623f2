//! Like and bookmark mutations.
//!
//! Each mutation moves the membership set, the denormalized counter, the
//! affected hashtag ranked scores, and (for model authors) the global
//! model-engagement index in one atomic write batch, then runs the cache
//! invalidation fan-out.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::keys;
use crate::models::AuthContext;
use crate::services::ranking::{model_engagement_op, rerank_ops, BOOKMARK_WEIGHT, LIKE_WEIGHT};
use crate::services::{load_interactable_post, EngineContext};
use crate::store::{KvStore, WriteOp};

pub struct InteractionService {
    ctx: EngineContext,
}

impl InteractionService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn like_post(&self, auth: AuthContext, post_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.like_inner(scope.store().as_ref(), auth, post_id).await;
        scope.finish("like_post");
        result
    }

    async fn like_inner(&self, store: &dyn KvStore, auth: AuthContext, post_id: Uuid) -> Result<()> {
        let post = load_interactable_post(store, post_id).await?;
        let member = auth.subject_id.to_string();
        if store.set_contains(&keys::post_likers(post.id), &member).await? {
            return Err(AppError::Conflict(format!("post {post_id} already liked")));
        }

        let now = self.ctx.clock.now_ms();
        let mut ops = vec![
            WriteOp::SetAdd {
                key: keys::post_likers(post.id),
                member,
            },
            WriteOp::HashIncr {
                key: keys::post(post.id),
                field: "likes_count".into(),
                delta: 1,
            },
        ];
        ops.extend(rerank_ops(
            &post,
            post.likes_count + 1,
            post.comments_count,
            post.bookmarks_count,
            now,
        ));
        ops.extend(model_engagement_op(&post, LIKE_WEIGHT));
        store.execute(ops).await?;

        self.finish_interaction(post.id);
        Ok(())
    }

    pub async fn unlike_post(&self, auth: AuthContext, post_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.unlike_inner(scope.store().as_ref(), auth, post_id).await;
        scope.finish("unlike_post");
        result
    }

    async fn unlike_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        post_id: Uuid,
    ) -> Result<()> {
        let post = load_interactable_post(store, post_id).await?;
        let member = auth.subject_id.to_string();
        if !store.set_contains(&keys::post_likers(post.id), &member).await? {
            return Err(AppError::Conflict(format!("post {post_id} is not liked")));
        }

        let now = self.ctx.clock.now_ms();
        let mut ops = vec![
            WriteOp::SetRemove {
                key: keys::post_likers(post.id),
                member,
            },
            WriteOp::HashIncr {
                key: keys::post(post.id),
                field: "likes_count".into(),
                delta: -1,
            },
        ];
        ops.extend(rerank_ops(
            &post,
            post.likes_count.saturating_sub(1),
            post.comments_count,
            post.bookmarks_count,
            now,
        ));
        ops.extend(model_engagement_op(&post, -LIKE_WEIGHT));
        store.execute(ops).await?;

        self.finish_interaction(post.id);
        Ok(())
    }

    pub async fn bookmark_post(&self, auth: AuthContext, post_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.bookmark_inner(scope.store().as_ref(), auth, post_id).await;
        scope.finish("bookmark_post");
        result
    }

    async fn bookmark_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        post_id: Uuid,
    ) -> Result<()> {
        let post = load_interactable_post(store, post_id).await?;
        let member = auth.subject_id.to_string();
        if store
            .set_contains(&keys::post_bookmarkers(post.id), &member)
            .await?
        {
            return Err(AppError::Conflict(format!("post {post_id} already bookmarked")));
        }

        let now = self.ctx.clock.now_ms();
        let mut ops = vec![
            WriteOp::SetAdd {
                key: keys::post_bookmarkers(post.id),
                member,
            },
            WriteOp::HashIncr {
                key: keys::post(post.id),
                field: "bookmarks_count".into(),
                delta: 1,
            },
            WriteOp::SortedAdd {
                key: keys::bookmarks(auth.subject_id),
                member: post.id.to_string(),
                score: now as f64,
            },
        ];
        ops.extend(rerank_ops(
            &post,
            post.likes_count,
            post.comments_count,
            post.bookmarks_count + 1,
            now,
        ));
        ops.extend(model_engagement_op(&post, BOOKMARK_WEIGHT));
        store.execute(ops).await?;

        self.finish_interaction(post.id);
        Ok(())
    }

    pub async fn unbookmark_post(&self, auth: AuthContext, post_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.unbookmark_inner(scope.store().as_ref(), auth, post_id).await;
        scope.finish("unbookmark_post");
        result
    }

    async fn unbookmark_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        post_id: Uuid,
    ) -> Result<()> {
        let post = load_interactable_post(store, post_id).await?;
        let member = auth.subject_id.to_string();
        if !store
            .set_contains(&keys::post_bookmarkers(post.id), &member)
            .await?
        {
            return Err(AppError::Conflict(format!("post {post_id} is not bookmarked")));
        }

        let now = self.ctx.clock.now_ms();
        let mut ops = vec![
            WriteOp::SetRemove {
                key: keys::post_bookmarkers(post.id),
                member,
            },
            WriteOp::HashIncr {
                key: keys::post(post.id),
                field: "bookmarks_count".into(),
                delta: -1,
            },
            WriteOp::SortedRemove {
                key: keys::bookmarks(auth.subject_id),
                member: post.id.to_string(),
            },
        ];
        ops.extend(rerank_ops(
            &post,
            post.likes_count,
            post.comments_count,
            post.bookmarks_count.saturating_sub(1),
            now,
        ));
        ops.extend(model_engagement_op(&post, -BOOKMARK_WEIGHT));
        store.execute(ops).await?;

        self.finish_interaction(post.id);
        Ok(())
    }

    fn finish_interaction(&self, post_id: Uuid) {
        self.ctx.invalidator.purge_listings();
        self.ctx.invalidator.purge_post(post_id);
    }
}
