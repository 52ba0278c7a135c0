//! Actor repository (spec §3, §4.2, §4.5).

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tootik_common::AppResult;

use crate::entities::actor::{ActiveModel, Column, Entity, Model};

/// Which per-actor throttle column a conditional update targets (spec §4.5:
/// post, edit, boost, bookmark, follow, alias, move, name, avatar).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleKind {
    Post,
    Edit,
    Boost,
    Bookmark,
    Follow,
    Alias,
    Move,
    Name,
    Avatar,
}

impl ThrottleKind {
    const fn column(self) -> Column {
        match self {
            Self::Post => Column::LastPostAt,
            Self::Edit => Column::LastEditAt,
            Self::Boost => Column::LastBoostAt,
            Self::Bookmark => Column::LastBookmarkAt,
            Self::Follow => Column::LastFollowAt,
            Self::Alias => Column::LastAliasAt,
            Self::Move => Column::LastMoveAt,
            Self::Name => Column::LastNameAt,
            Self::Avatar => Column::LastAvatarAt,
        }
    }
}

/// Repository over the `actor` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActorRepository;

impl ActorRepository {
    /// Find an actor (local or cached remote) by its canonical id.
    pub async fn find_by_id<C: ConnectionTrait>(&self, db: &C, id: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find_by_id(id).one(db).await?)
    }

    /// Find a local actor by its preferred username.
    pub async fn find_local_by_username<C: ConnectionTrait>(
        &self,
        db: &C,
        domain: &str,
        username: &str,
    ) -> AppResult<Option<Model>> {
        Ok(Entity::find()
            .filter(Column::Local.eq(true))
            .filter(Column::Domain.eq(domain))
            .filter(Column::PreferredUsername.eq(username))
            .one(db)
            .await?)
    }

    /// Find an actor by its inbox or shared-inbox URL, to attribute a
    /// delivery failure on a target inbox back to the actor row it
    /// belongs to (spec §4.2 failure taxonomy: a gone inbox marks its
    /// actor gone).
    pub async fn find_by_inbox_url<C: ConnectionTrait>(&self, db: &C, inbox_url: &str) -> AppResult<Option<Model>> {
        Ok(Entity::find()
            .filter(Condition::any().add(Column::InboxUrl.eq(inbox_url)).add(Column::SharedInboxUrl.eq(inbox_url)))
            .one(db)
            .await?)
    }

    /// Insert a new actor row (used both for fresh local registrations and
    /// for caching a freshly-resolved remote actor document).
    pub async fn insert<C: ConnectionTrait>(&self, db: &C, model: ActiveModel) -> AppResult<Model> {
        Ok(model.insert(db).await?)
    }

    /// Replace a cached remote actor's mutable fields with a freshly
    /// fetched document (spec §4.2 resolver cache refresh).
    pub async fn upsert_remote<C: ConnectionTrait>(&self, db: &C, model: ActiveModel) -> AppResult<Model> {
        Ok(model.save(db).await?.try_into_model()?)
    }

    /// Mark a remote actor as gone (410/404), per the failure taxonomy in
    /// spec §4.2: every delivery item targeting its inboxes subsequently
    /// goes terminal.
    pub async fn mark_gone<C: ConnectionTrait>(&self, db: &C, id: &str) -> AppResult<()> {
        Entity::update_many()
            .col_expr(Column::Gone, Expr::value(true))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Write-once `movedTo` (spec §3 invariant).
    pub async fn set_moved_to<C: ConnectionTrait>(&self, db: &C, id: &str, moved_to: &str) -> AppResult<bool> {
        let result = Entity::update_many()
            .col_expr(Column::MovedTo, Expr::value(moved_to))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::MovedTo.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Record a reciprocal `alsoKnownAs` entry (stored as a JSON array).
    pub async fn set_also_known_as<C: ConnectionTrait>(&self, db: &C, id: &str, also_known_as_json: &str) -> AppResult<()> {
        Entity::update_many()
            .col_expr(Column::AlsoKnownAs, Expr::value(also_known_as_json))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Attempt to claim a throttle slot: succeeds (returns `true`) only if
    /// `last < now - interval` or the column was never set, via a single
    /// conditional `UPDATE` so concurrent workers never need a lock.
    pub async fn try_claim_throttle<C: ConnectionTrait>(
        &self,
        db: &C,
        actor_id: &str,
        kind: ThrottleKind,
        interval: std::time::Duration,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let column = kind.column();
        let cutoff = now - chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());

        let result = Entity::update_many()
            .col_expr(column, Expr::value(now))
            .filter(Column::Id.eq(actor_id))
            .filter(
                Expr::col(column)
                    .is_null()
                    .or(Expr::col(column).lt(cutoff)),
            )
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Update an actor's profile fields (display name / summary / avatar),
    /// used by local profile edits and remote actor refreshes alike.
    pub async fn update_profile<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
        display_name: Option<String>,
        summary: Option<String>,
        avatar_url: Option<String>,
    ) -> AppResult<()> {
        let mut am = ActiveModel {
            id: Set(id.to_string()),
            ..Default::default()
        };
        if let Some(v) = display_name {
            am.display_name = Set(Some(v));
        }
        if let Some(v) = summary {
            am.summary = Set(Some(v));
        }
        if let Some(v) = avatar_url {
            am.avatar_url = Set(Some(v));
        }
        am.updated_at = Set(Utc::now());
        Entity::update(am).filter(Column::Id.eq(id)).exec(db).await?;
        Ok(())
    }

    /// Local actors that have moved (`moved_to` set), for the mover safety
    /// net (spec §5): re-verifies every current follower edge still points
    /// at the new identity, idempotently.
    pub async fn find_moved_locals<C: ConnectionTrait>(&self, db: &C) -> AppResult<Vec<Model>> {
        Ok(Entity::find()
            .filter(Column::Local.eq(true))
            .filter(Column::MovedTo.is_not_null())
            .all(db)
            .await?)
    }

    /// Actors whose `last_refreshed_at` is older than `interval` (or unset),
    /// for the actor-refresher periodic loop (spec §5).
    pub async fn find_stale_remote<C: ConnectionTrait>(
        &self,
        db: &C,
        interval: std::time::Duration,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Model>> {
        use sea_orm::QueryOrder;
        let cutoff = now - chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());
        Ok(Entity::find()
            .filter(Column::Local.eq(false))
            .filter(Column::Gone.eq(false))
            .filter(
                Expr::col(Column::LastRefreshedAt)
                    .is_null()
                    .or(Expr::col(Column::LastRefreshedAt).lt(cutoff)),
            )
            .order_by_asc(Column::LastRefreshedAt)
            .limit(limit)
            .all(db)
            .await?)
    }
}
