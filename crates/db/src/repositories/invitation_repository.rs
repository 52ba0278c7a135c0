//! Invitation code repository (spec §4.5 gated registration).

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tootik_common::AppResult;

use crate::entities::invitation::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone, Copy, Default)]
pub struct InvitationRepository;

impl InvitationRepository {
    pub async fn find<C: ConnectionTrait>(&self, db: &C, code: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find_by_id(code).one(db).await?)
    }

    pub async fn create<C: ConnectionTrait>(&self, db: &C, code: &str) -> AppResult<Model> {
        let am = ActiveModel {
            code: Set(code.to_string()),
            used_by_actor_id: Set(None),
            created_at: Set(Utc::now()),
            used_at: Set(None),
        };
        Ok(am.insert(db).await?)
    }

    /// Redeem an unused invitation atomically; returns `false` if it was
    /// already used.
    pub async fn redeem<C: ConnectionTrait>(&self, db: &C, code: &str, actor_id: &str) -> AppResult<bool> {
        let result = Entity::update_many()
            .col_expr(Column::UsedByActorId, Expr::value(actor_id))
            .col_expr(Column::UsedAt, Expr::value(Utc::now()))
            .filter(Column::Code.eq(code))
            .filter(Column::UsedAt.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
