//! Vote repository (spec §3, §4.1 `Vote`, §5 poll tallier loop).

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use tootik_common::AppResult;

use crate::entities::{poll_option, vote};

#[derive(Debug, Clone, Copy, Default)]
pub struct VoteRepository;

impl VoteRepository {
    /// Cast a vote. A unique `(object_id, actor_id)` index keeps one actor
    /// from voting twice in a single-choice poll; callers needing multi-
    /// select polls issue one row per chosen option under a different
    /// uniqueness key and are rejected here intentionally for single-choice
    /// polls (spec §4.1 does not define multi-vote retraction).
    pub async fn cast<C: ConnectionTrait>(&self, db: &C, object_id: &str, actor_id: &str, poll_option_id: i64) -> AppResult<()> {
        let am = vote::ActiveModel {
            object_id: Set(object_id.to_string()),
            actor_id: Set(actor_id.to_string()),
            poll_option_id: Set(poll_option_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        am.insert(db).await?;
        Ok(())
    }

    pub async fn has_voted<C: ConnectionTrait>(&self, db: &C, object_id: &str, actor_id: &str) -> AppResult<bool> {
        Ok(vote::Entity::find()
            .filter(vote::Column::ObjectId.eq(object_id))
            .filter(vote::Column::ActorId.eq(actor_id))
            .count(db)
            .await?
            > 0)
    }

    /// Re-tally distinct-voter counts per option and write them back onto
    /// `poll_option.votes` (spec §4.1 Poller, §5 poll-tally loop).
    pub async fn retally<C: ConnectionTrait>(&self, db: &C, object_id: &str) -> AppResult<()> {
        let options = poll_option::Entity::find()
            .filter(poll_option::Column::ObjectId.eq(object_id))
            .all(db)
            .await?;

        for option in options {
            let count = vote::Entity::find()
                .filter(vote::Column::ObjectId.eq(object_id))
                .filter(vote::Column::PollOptionId.eq(option.id))
                .count(db)
                .await?;

            poll_option::Entity::update_many()
                .col_expr(poll_option::Column::Votes, Expr::value(count as i64))
                .filter(poll_option::Column::Id.eq(option.id))
                .exec(db)
                .await?;
        }
        Ok(())
    }

    pub async fn find_option_by_name<C: ConnectionTrait>(
        &self,
        db: &C,
        object_id: &str,
        name: &str,
    ) -> AppResult<Option<poll_option::Model>> {
        Ok(poll_option::Entity::find()
            .filter(poll_option::Column::ObjectId.eq(object_id))
            .filter(poll_option::Column::Name.eq(name))
            .one(db)
            .await?)
    }

    pub async fn list_options<C: ConnectionTrait>(&self, db: &C, object_id: &str) -> AppResult<Vec<poll_option::Model>> {
        Ok(poll_option::Entity::find()
            .filter(poll_option::Column::ObjectId.eq(object_id))
            .all(db)
            .await?)
    }
}
