//! Follow-edge repository (spec §3, §4.1).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tootik_common::AppResult;

use crate::entities::follow_edge::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone, Copy, Default)]
pub struct FollowRepository;

impl FollowRepository {
    /// At most one row per (follower, followed) — spec §3 invariant.
    pub async fn find<C: ConnectionTrait>(&self, db: &C, follower_id: &str, followed_id: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find()
            .filter(Column::FollowerId.eq(follower_id))
            .filter(Column::FollowedId.eq(followed_id))
            .one(db)
            .await?)
    }

    pub async fn find_by_follow_activity<C: ConnectionTrait>(&self, db: &C, follow_activity_id: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find()
            .filter(Column::FollowActivityId.eq(follow_activity_id))
            .one(db)
            .await?)
    }

    /// Create the edge optimistically; `accepted` starts `true` for local
    /// targets and `false` for remote ones until an Accept arrives.
    pub async fn create<C: ConnectionTrait>(
        &self,
        db: &C,
        follower_id: &str,
        followed_id: &str,
        follow_activity_id: &str,
        accepted: bool,
    ) -> AppResult<Model> {
        let am = ActiveModel {
            follower_id: Set(follower_id.to_string()),
            followed_id: Set(followed_id.to_string()),
            follow_activity_id: Set(follow_activity_id.to_string()),
            accepted: Set(accepted),
            since: Set(Utc::now()),
            ..Default::default()
        };
        Ok(am.insert(db).await?)
    }

    /// Promote an edge to accepted on receipt of a matching Accept.
    pub async fn accept<C: ConnectionTrait>(&self, db: &C, id: i64) -> AppResult<()> {
        Entity::update_many()
            .col_expr(Column::Accepted, sea_orm::sea_query::Expr::value(true))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn delete<C: ConnectionTrait>(&self, db: &C, follower_id: &str, followed_id: &str) -> AppResult<()> {
        Entity::delete_many()
            .filter(Column::FollowerId.eq(follower_id))
            .filter(Column::FollowedId.eq(followed_id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Accepted followers of `followed_id`, for delivery fan-out and
    /// follower-count display.
    pub async fn list_followers<C: ConnectionTrait>(&self, db: &C, followed_id: &str) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::FollowedId.eq(followed_id))
            .filter(Column::Accepted.eq(true))
            .all(db)
            .await?)
    }

    /// Accounts `follower_id` follows (accepted only).
    pub async fn list_following<C: ConnectionTrait>(&self, db: &C, follower_id: &str) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::FollowerId.eq(follower_id))
            .filter(Column::Accepted.eq(true))
            .all(db)
            .await?)
    }

    /// Every edge pointing at `followed_id`, accepted or not — used by
    /// `Move` handling to find every local follower of a moved identity
    /// before the rewrite, including still-pending requests (spec §4.1).
    pub async fn list_followers_any<C: ConnectionTrait>(&self, db: &C, followed_id: &str) -> AppResult<Vec<Model>> {
        Ok(Entity::find().filter(Column::FollowedId.eq(followed_id)).all(db).await?)
    }

    /// Reset an edge's accepted flag — a follow redirected onto a new
    /// identity by `Move` needs a fresh `Accept` from it (spec §4.1
    /// `Apply`/`Move`).
    pub async fn set_accepted_for_pair<C: ConnectionTrait>(
        &self,
        db: &C,
        follower_id: &str,
        followed_id: &str,
        accepted: bool,
    ) -> AppResult<()> {
        Entity::update_many()
            .col_expr(Column::Accepted, sea_orm::sea_query::Expr::value(accepted))
            .filter(Column::FollowerId.eq(follower_id))
            .filter(Column::FollowedId.eq(followed_id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Rewrite every edge pointing at `old_target` to point at `new_target`
    /// (spec §4.1 `Move`). Both follower-side and followed-side rows move.
    pub async fn rewrite_target<C: ConnectionTrait>(&self, db: &C, old_target: &str, new_target: &str) -> AppResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::FollowedId, sea_orm::sea_query::Expr::value(new_target))
            .filter(Column::FollowedId.eq(old_target))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
