//! Bookmark, Like and Share repositories (spec §3 auxiliary tuples, §4.1).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tootik_common::AppResult;

use crate::entities::{bookmark, like, share};

/// Private per-(actor, object) bookmarks — never federated.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookmarkRepository;

impl BookmarkRepository {
    pub async fn exists<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str) -> AppResult<bool> {
        Ok(bookmark::Entity::find()
            .filter(bookmark::Column::ActorId.eq(actor_id))
            .filter(bookmark::Column::ObjectId.eq(object_id))
            .count(db)
            .await?
            > 0)
    }

    pub async fn add<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str) -> AppResult<()> {
        let am = bookmark::ActiveModel {
            actor_id: Set(actor_id.to_string()),
            object_id: Set(object_id.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        am.insert(db).await?;
        Ok(())
    }

    pub async fn remove<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str) -> AppResult<()> {
        bookmark::Entity::delete_many()
            .filter(bookmark::Column::ActorId.eq(actor_id))
            .filter(bookmark::Column::ObjectId.eq(object_id))
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn count_for_actor<C: ConnectionTrait>(&self, db: &C, actor_id: &str) -> AppResult<u64> {
        Ok(bookmark::Entity::find()
            .filter(bookmark::Column::ActorId.eq(actor_id))
            .count(db)
            .await?)
    }
}

/// Federated per-(actor, object) likes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LikeRepository;

impl LikeRepository {
    pub async fn find<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str) -> AppResult<Option<like::Model>> {
        Ok(like::Entity::find()
            .filter(like::Column::ActorId.eq(actor_id))
            .filter(like::Column::ObjectId.eq(object_id))
            .one(db)
            .await?)
    }

    pub async fn add<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str, like_activity_id: &str) -> AppResult<()> {
        let am = like::ActiveModel {
            actor_id: Set(actor_id.to_string()),
            object_id: Set(object_id.to_string()),
            like_activity_id: Set(like_activity_id.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        am.insert(db).await?;
        Ok(())
    }

    pub async fn remove<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str) -> AppResult<()> {
        like::Entity::delete_many()
            .filter(like::Column::ActorId.eq(actor_id))
            .filter(like::Column::ObjectId.eq(object_id))
            .exec(db)
            .await?;
        Ok(())
    }
}

/// Federated per-(actor, object) shares (Announce/UndoAnnounce).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareRepository;

impl ShareRepository {
    pub async fn find<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str) -> AppResult<Option<share::Model>> {
        Ok(share::Entity::find()
            .filter(share::Column::ActorId.eq(actor_id))
            .filter(share::Column::ObjectId.eq(object_id))
            .one(db)
            .await?)
    }

    pub async fn add<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str, announce_activity_id: &str) -> AppResult<()> {
        let am = share::ActiveModel {
            actor_id: Set(actor_id.to_string()),
            object_id: Set(object_id.to_string()),
            announce_activity_id: Set(announce_activity_id.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        am.insert(db).await?;
        Ok(())
    }

    pub async fn remove<C: ConnectionTrait>(&self, db: &C, actor_id: &str, object_id: &str) -> AppResult<()> {
        share::Entity::delete_many()
            .filter(share::Column::ActorId.eq(actor_id))
            .filter(share::Column::ObjectId.eq(object_id))
            .exec(db)
            .await?;
        Ok(())
    }
}
