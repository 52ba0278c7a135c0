//! Client certificate binding repository (spec §3, §4.5).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tootik_common::AppResult;

use crate::entities::certificate::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateRepository;

impl CertificateRepository {
    pub async fn find_by_fingerprint<C: ConnectionTrait>(&self, db: &C, fingerprint: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find_by_id(fingerprint).one(db).await?)
    }

    /// The first binding for an actor is auto-approved (spec §3, §4.5).
    pub async fn insert<C: ConnectionTrait>(&self, db: &C, fingerprint: &str, actor_id: &str, approved: bool) -> AppResult<Model> {
        let am = ActiveModel {
            fingerprint: Set(fingerprint.to_string()),
            actor_id: Set(actor_id.to_string()),
            approved: Set(approved),
            created_at: Set(Utc::now()),
        };
        Ok(am.insert(db).await?)
    }

    pub async fn approve<C: ConnectionTrait>(&self, db: &C, fingerprint: &str) -> AppResult<()> {
        Entity::update_many()
            .col_expr(Column::Approved, sea_orm::sea_query::Expr::value(true))
            .filter(Column::Fingerprint.eq(fingerprint))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn revoke<C: ConnectionTrait>(&self, db: &C, fingerprint: &str) -> AppResult<()> {
        Entity::delete_by_id(fingerprint).exec(db).await?;
        Ok(())
    }

    pub async fn list_for_actor<C: ConnectionTrait>(&self, db: &C, actor_id: &str) -> AppResult<Vec<Model>> {
        Ok(Entity::find().filter(Column::ActorId.eq(actor_id)).all(db).await?)
    }

    pub async fn count_for_actor<C: ConnectionTrait>(&self, db: &C, actor_id: &str) -> AppResult<u64> {
        Ok(Entity::find().filter(Column::ActorId.eq(actor_id)).count(db).await?)
    }
}
