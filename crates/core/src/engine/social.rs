//! `Announce`/`UndoAnnounce`, `Like`/`Unlike` and `Bookmark`/`Unbookmark`
//! (spec §4.1). Bookmarks are private and never federated; likes and
//! boosts are.

use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use tootik_common::{AppError, AppResult};
use tootik_db::entities::activity;
use tootik_db::repositories::{
    ActivityRepository, ActorRepository, BookmarkRepository, DeliveryRepository, LikeRepository,
    ObjectRepository, ShareRepository, ThrottleKind,
};

use super::Engine;

impl Engine {
    /// Boost (`Announce`) a visible object.
    pub async fn announce(&self, actor_id: &str, object_id: &str) -> AppResult<()> {
        let claimed = ActorRepository
            .try_claim_throttle(&self.db, actor_id, ThrottleKind::Boost, self.config.limits.boost_interval, Utc::now())
            .await?;
        if !claimed {
            return Err(AppError::Throttled);
        }
        if ShareRepository.find(&self.db, actor_id, object_id).await?.is_some() {
            return Err(AppError::AlreadyExists("already boosted".to_string()));
        }

        let object = ObjectRepository
            .find_visible(&self.db, object_id)
            .await?
            .ok_or_else(|| AppError::NotFound(object_id.to_string()))?;
        let actor = self.require_actor(actor_id).await?;
        let author = self.require_actor(&object.attributed_to).await?;
        let now = Utc::now();
        let activity_id = self.new_activity_id();

        let txn = self.db.begin().await?;
        ShareRepository.add(&txn, actor_id, object_id, &activity_id).await?;

        let to = vec![super::visibility::PUBLIC.to_string()];
        let cc = vec![self.followers_url(actor_id), author.id.clone()];
        let raw_body =
            format!("{{\"id\":\"{activity_id}\",\"type\":\"Announce\",\"object\":\"{object_id}\"}}").into_bytes();
        let am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Announce".to_string()),
            actor_id: Set(actor.id.clone()),
            object_id: Set(Some(object_id.to_string())),
            target_id: Set(None),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set(serde_json::to_string(&cc).map_err(|e| AppError::Internal(e.to_string()))?),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;
        self.enqueue_deliveries(&txn, &actor, &activity_id, &to, &cc).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Undo a boost.
    pub async fn undo_announce(&self, actor_id: &str, object_id: &str) -> AppResult<()> {
        let share = ShareRepository
            .find(&self.db, actor_id, object_id)
            .await?
            .ok_or_else(|| AppError::NotFound("boost".to_string()))?;
        let actor = self.require_actor(actor_id).await?;
        let object = ObjectRepository.find_any(&self.db, object_id).await?;
        let now = Utc::now();
        let undo_id = self.new_activity_id();

        let txn = self.db.begin().await?;
        ShareRepository.remove(&txn, actor_id, object_id).await?;

        let to = vec![super::visibility::PUBLIC.to_string()];
        let mut cc = vec![self.followers_url(actor_id)];
        if let Some(object) = &object {
            cc.push(object.attributed_to.clone());
        }
        let raw_body = format!(
            "{{\"id\":\"{undo_id}\",\"type\":\"Undo\",\"object\":\"{}\"}}",
            share.announce_activity_id
        )
        .into_bytes();
        let am = activity::ActiveModel {
            id: Set(undo_id.clone()),
            local: Set(true),
            activity_type: Set("Undo".to_string()),
            actor_id: Set(actor.id.clone()),
            object_id: Set(Some(share.announce_activity_id.clone())),
            target_id: Set(None),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set(serde_json::to_string(&cc).map_err(|e| AppError::Internal(e.to_string()))?),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;
        self.enqueue_deliveries(&txn, &actor, &undo_id, &to, &cc).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Federated `Like`.
    pub async fn like(&self, actor_id: &str, object_id: &str) -> AppResult<()> {
        if LikeRepository.find(&self.db, actor_id, object_id).await?.is_some() {
            return Err(AppError::AlreadyExists("already liked".to_string()));
        }
        let object = ObjectRepository
            .find_visible(&self.db, object_id)
            .await?
            .ok_or_else(|| AppError::NotFound(object_id.to_string()))?;
        let actor = self.require_actor(actor_id).await?;
        let author = self.require_actor(&object.attributed_to).await?;
        let now = Utc::now();
        let activity_id = self.new_activity_id();

        let txn = self.db.begin().await?;
        LikeRepository.add(&txn, actor_id, object_id, &activity_id).await?;

        let to = vec![author.id.clone()];
        let raw_body =
            format!("{{\"id\":\"{activity_id}\",\"type\":\"Like\",\"object\":\"{object_id}\"}}").into_bytes();
        let am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Like".to_string()),
            actor_id: Set(actor.id.clone()),
            object_id: Set(Some(object_id.to_string())),
            target_id: Set(None),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;
        self.enqueue_deliveries(&txn, &actor, &activity_id, &to, &[]).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Undo a `Like`.
    pub async fn unlike(&self, actor_id: &str, object_id: &str) -> AppResult<()> {
        let like = LikeRepository
            .find(&self.db, actor_id, object_id)
            .await?
            .ok_or_else(|| AppError::NotFound("like".to_string()))?;
        let actor = self.require_actor(actor_id).await?;
        let object = ObjectRepository.find_any(&self.db, object_id).await?;
        let now = Utc::now();
        let undo_id = self.new_activity_id();

        let txn = self.db.begin().await?;
        LikeRepository.remove(&txn, actor_id, object_id).await?;

        let to: Vec<String> = object.map(|o| vec![o.attributed_to]).unwrap_or_default();
        let raw_body = format!(
            "{{\"id\":\"{undo_id}\",\"type\":\"Undo\",\"object\":\"{}\"}}",
            like.like_activity_id
        )
        .into_bytes();
        let am = activity::ActiveModel {
            id: Set(undo_id.clone()),
            local: Set(true),
            activity_type: Set("Undo".to_string()),
            actor_id: Set(actor.id.clone()),
            object_id: Set(Some(like.like_activity_id.clone())),
            target_id: Set(None),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;
        self.enqueue_deliveries(&txn, &actor, &undo_id, &to, &[]).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Bookmark an object for private later reading. Never federated
    /// (spec §3, §4.1).
    pub async fn bookmark(&self, actor_id: &str, object_id: &str) -> AppResult<()> {
        let claimed = ActorRepository
            .try_claim_throttle(
                &self.db,
                actor_id,
                ThrottleKind::Bookmark,
                self.config.limits.min_bookmark_interval,
                Utc::now(),
            )
            .await?;
        if !claimed {
            return Err(AppError::Throttled);
        }
        if BookmarkRepository.exists(&self.db, actor_id, object_id).await? {
            return Err(AppError::AlreadyExists("already bookmarked".to_string()));
        }
        let count = BookmarkRepository.count_for_actor(&self.db, actor_id).await?;
        if count >= self.config.limits.max_bookmarks_per_user as u64 {
            return Err(AppError::Forbidden("bookmark limit reached".to_string()));
        }
        ObjectRepository
            .find_visible(&self.db, object_id)
            .await?
            .ok_or_else(|| AppError::NotFound(object_id.to_string()))?;
        BookmarkRepository.add(&self.db, actor_id, object_id).await?;
        Ok(())
    }

    /// Remove a bookmark.
    pub async fn unbookmark(&self, actor_id: &str, object_id: &str) -> AppResult<()> {
        if !BookmarkRepository.exists(&self.db, actor_id, object_id).await? {
            return Err(AppError::NotFound("bookmark".to_string()));
        }
        BookmarkRepository.remove(&self.db, actor_id, object_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;

    use super::super::test_support::{seed_local_actor, test_engine};
    use super::super::types::{PostContent, PostVisibility};
    use super::*;

    async fn author_a_post(engine: &super::super::Engine, author_id: &str) -> String {
        let content = PostContent { text: "hello".to_string(), attachments: vec![], poll: None };
        engine.post(author_id, content, PostVisibility::Public, None).await.unwrap()
    }

    #[tokio::test]
    async fn boosting_twice_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let object_id = author_a_post(&engine, &alice.id).await;

        engine.announce(&bob.id, &object_id).await.unwrap();
        let err = engine.announce(&bob.id, &object_id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn undo_announce_removes_the_share() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let object_id = author_a_post(&engine, &alice.id).await;

        engine.announce(&bob.id, &object_id).await.unwrap();
        engine.undo_announce(&bob.id, &object_id).await.unwrap();

        assert!(ShareRepository.find(&db, &bob.id, &object_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn liking_twice_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let object_id = author_a_post(&engine, &alice.id).await;

        engine.like(&bob.id, &object_id).await.unwrap();
        let err = engine.like(&bob.id, &object_id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn unlike_removes_the_like() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let object_id = author_a_post(&engine, &alice.id).await;

        engine.like(&bob.id, &object_id).await.unwrap();
        engine.unlike(&bob.id, &object_id).await.unwrap();

        assert!(LikeRepository.find(&db, &bob.id, &object_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bookmark_is_private_and_not_federated() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let object_id = author_a_post(&engine, &alice.id).await;

        engine.bookmark(&bob.id, &object_id).await.unwrap();

        assert!(BookmarkRepository.exists(&db, &bob.id, &object_id).await.unwrap());
        let due = DeliveryRepository.fetch_due(&db, Utc::now(), 10).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn bookmarking_twice_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let object_id = author_a_post(&engine, &alice.id).await;

        engine.bookmark(&bob.id, &object_id).await.unwrap();
        let err = engine.bookmark(&bob.id, &object_id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn unbookmark_missing_bookmark_is_not_found() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let object_id = author_a_post(&engine, &alice.id).await;

        let err = engine.unbookmark(&bob.id, &object_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
