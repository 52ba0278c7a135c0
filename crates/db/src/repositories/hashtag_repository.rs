//! Hashtag index repository (spec §4.5 `/users/hashtag/<tag>`).

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tootik_common::AppResult;

use crate::entities::hashtag::{ActiveModel, Column, Entity};
use crate::entities::object;

#[derive(Debug, Clone, Copy, Default)]
pub struct HashtagRepository;

impl HashtagRepository {
    /// Index every tag extracted from a post, preserving original casing
    /// for display while indexing lower-cased for lookup (scenario 5).
    pub async fn index<C: ConnectionTrait>(&self, db: &C, object_id: &str, tags: &[String]) -> AppResult<()> {
        for tag in tags {
            let am = ActiveModel {
                object_id: Set(object_id.to_string()),
                tag_lower: Set(tag.to_lowercase()),
                tag_display: Set(tag.clone()),
                ..Default::default()
            };
            am.insert(db).await?;
        }
        Ok(())
    }

    pub async fn delete_for_object<C: ConnectionTrait>(&self, db: &C, object_id: &str) -> AppResult<()> {
        Entity::delete_many()
            .filter(Column::ObjectId.eq(object_id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Visible objects tagged with `tag` (case-insensitive), newest first.
    pub async fn find_objects_by_tag<C: ConnectionTrait>(&self, db: &C, tag: &str, limit: u64) -> AppResult<Vec<object::Model>> {
        Ok(object::Entity::find()
            .inner_join(Entity)
            .filter(Column::TagLower.eq(tag.to_lowercase()))
            .filter(object::Column::DeletedAt.is_null())
            .order_by_desc(object::Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await?)
    }
}
