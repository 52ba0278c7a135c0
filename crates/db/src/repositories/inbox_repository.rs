//! Inbox queue repository (spec §3, §4.4).

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tootik_common::AppResult;

use crate::entities::inbox_item::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone, Copy, Default)]
pub struct InboxRepository;

impl InboxRepository {
    /// Capture a raw signed body at receipt time, before verification.
    pub async fn enqueue<C: ConnectionTrait>(
        &self,
        db: &C,
        raw_body: Vec<u8>,
        headers_json: &str,
        sender_hint: Option<String>,
        target_actor_id: Option<String>,
    ) -> AppResult<Model> {
        let now = Utc::now();
        let am = ActiveModel {
            raw_body: Set(raw_body),
            headers: Set(headers_json.to_string()),
            sender_hint: Set(sender_hint),
            target_actor_id: Set(target_actor_id),
            received_at: Set(now),
            attempts: Set(0),
            next_attempt_at: Set(now),
            terminal: Set(false),
            terminal_reason: Set(None),
            ..Default::default()
        };
        Ok(am.insert(db).await?)
    }

    pub async fn fetch_due<C: ConnectionTrait>(&self, db: &C, now: DateTime<Utc>, limit: u64) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::Terminal.eq(false))
            .filter(Column::NextAttemptAt.lte(now))
            .order_by_asc(Column::ReceivedAt)
            .limit(limit)
            .all(db)
            .await?)
    }

    pub async fn mark_success<C: ConnectionTrait>(&self, db: &C, id: i64) -> AppResult<()> {
        Entity::delete_by_id(id).exec(db).await?;
        Ok(())
    }

    pub async fn mark_retry<C: ConnectionTrait>(&self, db: &C, id: i64, attempts: i32, next_at: DateTime<Utc>) -> AppResult<()> {
        Entity::update_many()
            .col_expr(Column::Attempts, Expr::value(attempts))
            .col_expr(Column::NextAttemptAt, Expr::value(next_at))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn mark_terminal<C: ConnectionTrait>(&self, db: &C, id: i64, reason: &str) -> AppResult<()> {
        Entity::update_many()
            .col_expr(Column::Terminal, Expr::value(true))
            .col_expr(Column::TerminalReason, Expr::value(reason))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn gc_terminal<C: ConnectionTrait>(&self, db: &C, older_than: DateTime<Utc>) -> AppResult<u64> {
        let result = Entity::delete_many()
            .filter(Column::Terminal.eq(true))
            .filter(Column::ReceivedAt.lt(older_than))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
