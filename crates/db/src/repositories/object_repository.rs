//! Object repository (spec §3, §4.1). Visibility classification is derived
//! at read time from `to`/`cc`/`audience`, never stored (spec §9).

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tootik_common::AppResult;

use crate::entities::object::{ActiveModel, Column, Entity, Model};

/// The `as:Public` addressee, matched against the stringified JSON `to`/`cc`
/// columns (visibility is never stored, spec §9).
const PUBLIC_ADDRESS: &str = "https://www.w3.org/ns/activitystreams#Public";

/// `to`/`cc` LIKE condition matching rows addressed to [`PUBLIC_ADDRESS`].
fn public_condition() -> Condition {
    let pattern = format!("%{PUBLIC_ADDRESS}%");
    Condition::any()
        .add(Column::To.like(pattern.clone()))
        .add(Column::Cc.like(pattern))
}

/// Repository over the `object` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectRepository;

impl ObjectRepository {
    pub async fn insert<C: ConnectionTrait>(&self, db: &C, model: ActiveModel) -> AppResult<Model> {
        Ok(model.insert(db).await?)
    }

    /// Find a non-deleted object by id. Tombstoned objects return `None`
    /// (scenario 1: `40 Post not found` after delete).
    pub async fn find_visible<C: ConnectionTrait>(&self, db: &C, id: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find_by_id(id)
            .filter(Column::DeletedAt.is_null())
            .one(db)
            .await?)
    }

    /// Find by id regardless of tombstone state, used by `Apply` to decide
    /// authority on an incoming Update/Delete.
    pub async fn find_any<C: ConnectionTrait>(&self, db: &C, id: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find_by_id(id).one(db).await?)
    }

    /// Update content and bump `updated`, but only when the caller-supplied
    /// `new_updated` is strictly newer than the stored value (spec §4.1
    /// "if an Update arrives with `updated` <= the stored `updated`, it is
    /// ignored"). Returns `true` if the row changed.
    pub async fn apply_update_if_newer<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
        content: &str,
        to_json: &str,
        cc_json: &str,
        tag_json: Option<&str>,
        new_updated: chrono::DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = Entity::update_many()
            .col_expr(Column::Content, Expr::value(content))
            .col_expr(Column::To, Expr::value(to_json))
            .col_expr(Column::Cc, Expr::value(cc_json))
            .col_expr(Column::Tag, Expr::value(tag_json))
            .col_expr(Column::UpdatedAt, Expr::value(new_updated))
            .filter(Column::Id.eq(id))
            .filter(Column::UpdatedAt.lt(new_updated))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Rewrite an object's creation timestamp. Exercised by tests to
    /// simulate an object aging past a quiet period.
    pub async fn backdate_created_at<C: ConnectionTrait>(&self, db: &C, id: &str, created_at: chrono::DateTime<Utc>) -> AppResult<()> {
        Entity::update_many().col_expr(Column::CreatedAt, Expr::value(created_at)).filter(Column::Id.eq(id)).exec(db).await?;
        Ok(())
    }

    /// Tombstone an object (spec §4.1 `Delete`). Content is cleared so
    /// tombstones never leak the original text.
    pub async fn soft_delete<C: ConnectionTrait>(&self, db: &C, id: &str) -> AppResult<()> {
        let am = ActiveModel {
            id: Set(id.to_string()),
            deleted_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        Entity::update(am).filter(Column::Id.eq(id)).exec(db).await?;
        Ok(())
    }

    /// Visible (non-deleted) direct replies to `parent_id`, oldest first.
    /// A deleted parent does not hide surviving replies (spec §4.1, §8).
    pub async fn find_replies<C: ConnectionTrait>(&self, db: &C, parent_id: &str) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::InReplyTo.eq(parent_id))
            .filter(Column::DeletedAt.is_null())
            .order_by_asc(Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Whether `parent_id` currently has any non-deleted reply, used by
    /// `Delete` to decide whether descendant replies become unreachable
    /// (spec §4.1: replies with no surviving non-deleted ancestor are
    /// removed along with the parent).
    pub async fn has_visible_replies<C: ConnectionTrait>(&self, db: &C, parent_id: &str) -> AppResult<bool> {
        Ok(Entity::find()
            .filter(Column::InReplyTo.eq(parent_id))
            .filter(Column::DeletedAt.is_null())
            .count(db)
            .await?
            > 0)
    }

    /// One page of a local author's own objects, newest first, for feed
    /// views (spec §4.5 `/users`, `/users/local`).
    pub async fn find_by_author_page<C: ConnectionTrait>(
        &self,
        db: &C,
        author_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::AttributedTo.eq(author_id))
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?)
    }

    /// One page of every local object, newest first (`/users/local`).
    pub async fn find_local_page<C: ConnectionTrait>(&self, db: &C, offset: u64, limit: u64) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::Local.eq(true))
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?)
    }

    /// One page of every object received within a single UTC day
    /// (`/users/inbox/<date>`).
    pub async fn find_by_day_page<C: ConnectionTrait>(
        &self,
        db: &C,
        day_start: chrono::DateTime<Utc>,
        day_end: chrono::DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::CreatedAt.gte(day_start))
            .filter(Column::CreatedAt.lt(day_end))
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?)
    }

    /// One page of every public object network-wide, local or remote,
    /// newest first (`/users/firehose`).
    pub async fn find_firehose_page<C: ConnectionTrait>(&self, db: &C, offset: u64, limit: u64) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(public_condition())
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?)
    }

    /// One page of public objects authored on other instances, newest first
    /// (`/users/federated`).
    pub async fn find_federated_page<C: ConnectionTrait>(&self, db: &C, offset: u64, limit: u64) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::Local.eq(false))
            .filter(public_condition())
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?)
    }

    /// One page of objects attributed to any actor in `author_ids` (the
    /// viewer plus whoever they follow), newest first (`/users` home feed).
    /// Returns an empty page without querying when `author_ids` is empty.
    pub async fn find_by_authors_page<C: ConnectionTrait>(
        &self,
        db: &C,
        author_ids: &[String],
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<Model>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Entity::find()
            .filter(Column::AttributedTo.is_in(author_ids.iter().cloned()))
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(db)
            .await?)
    }

    /// Polls that have not yet closed, for the poll-tally loop (spec §5).
    pub async fn find_open_polls<C: ConnectionTrait>(&self, db: &C, now: chrono::DateTime<Utc>) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::IsPoll.eq(true))
            .filter(Column::DeletedAt.is_null())
            .filter(Column::PollClosesAt.gt(now))
            .all(db)
            .await?)
    }

    /// Full-text search over plain-text content using a simple `LIKE`
    /// (spec §4.5 `/users/fts`); the embedded store has no external search
    /// engine, so this is the whole of the search implementation.
    pub async fn search_content<C: ConnectionTrait>(&self, db: &C, query: &str, limit: u64) -> AppResult<Vec<Model>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        Ok(Entity::find()
            .filter(Column::Content.like(pattern))
            .filter(Column::DeletedAt.is_null())
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await?)
    }
}
