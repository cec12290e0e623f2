//! Follow graph mutations.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::keys;
use crate::models::AuthContext;
use crate::services::{load_user, EngineContext};
use crate::store::{KvStore, WriteOp};

pub struct SocialGraphService {
    ctx: EngineContext,
}

impl SocialGraphService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn follow_user(&self, auth: AuthContext, target_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.follow_inner(scope.store().as_ref(), auth, target_id).await;
        scope.finish("follow_user");
        result
    }

    async fn follow_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        target_id: Uuid,
    ) -> Result<()> {
        if auth.subject_id == target_id {
            return Err(AppError::Validation("cannot follow yourself".into()));
        }
        load_user(store, target_id).await?;

        let member = target_id.to_string();
        if store
            .set_contains(&keys::following(auth.subject_id), &member)
            .await?
        {
            return Err(AppError::Conflict(format!("already following {target_id}")));
        }

        store
            .execute(vec![
                WriteOp::SetAdd {
                    key: keys::following(auth.subject_id),
                    member,
                },
                WriteOp::SetAdd {
                    key: keys::followers(target_id),
                    member: auth.subject_id.to_string(),
                },
                WriteOp::HashIncr {
                    key: keys::user(auth.subject_id),
                    field: "following_count".into(),
                    delta: 1,
                },
                WriteOp::HashIncr {
                    key: keys::user(target_id),
                    field: "followers_count".into(),
                    delta: 1,
                },
            ])
            .await?;

        self.finish_mutation(auth.subject_id, target_id);
        Ok(())
    }

    pub async fn unfollow_user(&self, auth: AuthContext, target_id: Uuid) -> Result<()> {
        let scope = self.ctx.begin_request();
        let result = self.unfollow_inner(scope.store().as_ref(), auth, target_id).await;
        scope.finish("unfollow_user");
        result
    }

    async fn unfollow_inner(
        &self,
        store: &dyn KvStore,
        auth: AuthContext,
        target_id: Uuid,
    ) -> Result<()> {
        if auth.subject_id == target_id {
            return Err(AppError::Validation("cannot unfollow yourself".into()));
        }
        load_user(store, target_id).await?;

        let member = target_id.to_string();
        if !store
            .set_contains(&keys::following(auth.subject_id), &member)
            .await?
        {
            return Err(AppError::Conflict(format!("not following {target_id}")));
        }

        store
            .execute(vec![
                WriteOp::SetRemove {
                    key: keys::following(auth.subject_id),
                    member,
                },
                WriteOp::SetRemove {
                    key: keys::followers(target_id),
                    member: auth.subject_id.to_string(),
                },
                WriteOp::HashIncr {
                    key: keys::user(auth.subject_id),
                    field: "following_count".into(),
                    delta: -1,
                },
                WriteOp::HashIncr {
                    key: keys::user(target_id),
                    field: "followers_count".into(),
                    delta: -1,
                },
            ])
            .await?;

        self.finish_mutation(auth.subject_id, target_id);
        Ok(())
    }

    fn finish_mutation(&self, subject_id: Uuid, target_id: Uuid) {
        self.ctx.invalidator.purge_listings();
        self.ctx.invalidator.purge_user(subject_id);
        self.ctx.invalidator.purge_user(target_id);
    }
}
