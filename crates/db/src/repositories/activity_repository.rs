//! Activity repository (spec §3): the outbox and the idempotency ledger.

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tootik_common::AppResult;

use crate::entities::activity::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityRepository;

impl ActivityRepository {
    /// Whether an activity with this id has already been recorded —
    /// `Apply`'s duplicate-id idempotency check (spec §3, §4.1, §8).
    pub async fn exists<C: ConnectionTrait>(&self, db: &C, id: &str) -> AppResult<bool> {
        Ok(Entity::find_by_id(id).count(db).await? > 0)
    }

    pub async fn find_by_id<C: ConnectionTrait>(&self, db: &C, id: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find_by_id(id).one(db).await?)
    }

    pub async fn insert<C: ConnectionTrait>(&self, db: &C, model: ActiveModel) -> AppResult<Model> {
        Ok(model.insert(db).await?)
    }

    /// Ids of local `Follow` activities addressed to `target_id`, used to
    /// cancel any still-pending request when that actor moves away (spec
    /// §4.1 `Apply`/`Move`).
    pub async fn find_follow_activity_ids<C: ConnectionTrait>(&self, db: &C, target_id: &str) -> AppResult<Vec<String>> {
        Ok(Entity::find()
            .filter(Column::ActivityType.eq("Follow"))
            .filter(Column::TargetId.eq(target_id))
            .filter(Column::Local.eq(true))
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    /// Activities authored by `actor_id`, newest first, for the local
    /// outbox collection (spec §6 `/outbox/<name>`).
    pub async fn find_outbox_page<C: ConnectionTrait>(
        &self,
        db: &C,
        actor_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<Model>> {
        use sea_orm::QueryOrder;
        Ok(Entity::find()
            .filter(Column::ActorId.eq(actor_id))
            .filter(Column::Local.eq(true))
            .order_by_desc(Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?)
    }
}
