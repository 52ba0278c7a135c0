//! Delivery queue repository (spec §3, §4.3): at-least-once outbound
//! delivery with per-(sender, target) FIFO ordering.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tootik_common::AppResult;

use crate::entities::delivery_item::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryRepository;

impl DeliveryRepository {
    /// Enqueue one delivery item. Callers insert one row per distinct
    /// target inbox in the same transaction that persists the activity
    /// (spec §4.3 "at-least-once semantics").
    pub async fn enqueue<C: ConnectionTrait>(
        &self,
        db: &C,
        activity_id: &str,
        sender_actor_id: &str,
        target_inbox: &str,
        sequence: i64,
    ) -> AppResult<Model> {
        let now = Utc::now();
        let am = ActiveModel {
            activity_id: Set(activity_id.to_string()),
            sender_actor_id: Set(sender_actor_id.to_string()),
            target_inbox: Set(target_inbox.to_string()),
            attempts: Set(0),
            next_attempt_at: Set(now),
            terminal: Set(false),
            terminal_reason: Set(None),
            created_at: Set(now),
            sequence: Set(sequence),
            ..Default::default()
        };
        Ok(am.insert(db).await?)
    }

    /// Due, non-terminal items, oldest-sequence-first within each
    /// (sender, target) pair so Create/Update/Delete cannot reorder
    /// (spec §4.3).
    pub async fn fetch_due<C: ConnectionTrait>(&self, db: &C, now: DateTime<Utc>, limit: u64) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::Terminal.eq(false))
            .filter(Column::NextAttemptAt.lte(now))
            .order_by_asc(Column::TargetInbox)
            .order_by_asc(Column::Sequence)
            .limit(limit)
            .all(db)
            .await?)
    }

    pub async fn mark_success<C: ConnectionTrait>(&self, db: &C, id: i64) -> AppResult<()> {
        Entity::delete_by_id(id).exec(db).await?;
        Ok(())
    }

    /// Bump attempts and schedule the next retry; callers compute the
    /// backoff (spec §4.3: exponential, capped, jittered).
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

    /// Every remaining item for an actor that has gone 410/404 becomes
    /// terminal in one shot (spec §4.2 failure taxonomy).
    pub async fn mark_all_for_inbox_terminal<C: ConnectionTrait>(&self, db: &C, target_inbox: &str, reason: &str) -> AppResult<u64> {
        let result = Entity::update_many()
            .col_expr(Column::Terminal, Expr::value(true))
            .col_expr(Column::TerminalReason, Expr::value(reason))
            .filter(Column::TargetInbox.eq(target_inbox))
            .filter(Column::Terminal.eq(false))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Drop any still-pending (non-terminal) delivery for `activity_id` —
    /// used when a `Move` makes an outstanding `Follow` moot (spec §4.1
    /// `Apply`/`Move` "cancels pending Follow activities").
    pub async fn cancel_by_activity_id<C: ConnectionTrait>(&self, db: &C, activity_id: &str) -> AppResult<u64> {
        let result = Entity::delete_many()
            .filter(Column::ActivityId.eq(activity_id))
            .filter(Column::Terminal.eq(false))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Purge terminal rows older than the forensic retention window
    /// (spec §9 Open Question, resolved in §B).
    pub async fn gc_terminal<C: ConnectionTrait>(&self, db: &C, older_than: DateTime<Utc>) -> AppResult<u64> {
        let result = Entity::delete_many()
            .filter(Column::Terminal.eq(true))
            .filter(Column::CreatedAt.lt(older_than))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
