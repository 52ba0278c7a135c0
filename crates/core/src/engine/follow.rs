//! `Follow`, `Unfollow`, `Accept`/`Reject` and `Move` (spec §4.1).

use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use tootik_common::{AppError, AppResult};
use tootik_db::entities::activity;
use tootik_db::repositories::{ActivityRepository, ActorRepository, DeliveryRepository, FollowRepository, ThrottleKind};

use super::Engine;

impl Engine {
    /// Follow `target_id` as `follower_id`. Local targets are accepted
    /// immediately; remote targets start unaccepted until an `Accept`
    /// arrives (spec §4.1 `Follow`).
    pub async fn follow(&self, follower_id: &str, target_id: &str) -> AppResult<()> {
        if follower_id == target_id {
            return Err(AppError::BadInput("cannot follow yourself".to_string()));
        }
        let claimed = ActorRepository
            .try_claim_throttle(
                &self.db,
                follower_id,
                ThrottleKind::Follow,
                self.config.limits.follow_throttle_interval,
                Utc::now(),
            )
            .await?;
        if !claimed {
            return Err(AppError::Throttled);
        }

        if FollowRepository.find(&self.db, follower_id, target_id).await?.is_some() {
            return Err(AppError::AlreadyFollowing);
        }

        let follower = self.require_actor(follower_id).await?;
        let target = self.require_actor(target_id).await?;
        let activity_id = self.new_activity_id();
        let now = Utc::now();

        let txn = self.db.begin().await?;
        FollowRepository
            .create(&txn, follower_id, target_id, &activity_id, target.local)
            .await?;

        let raw_body =
            format!("{{\"id\":\"{activity_id}\",\"type\":\"Follow\",\"object\":\"{target_id}\"}}").into_bytes();
        let am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Follow".to_string()),
            actor_id: Set(follower.id.clone()),
            object_id: Set(None),
            target_id: Set(Some(target_id.to_string())),
            to: Set(serde_json::json!([target_id]).to_string()),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;

        if !target.local && !target.gone {
            let inbox = target.shared_inbox_url.clone().unwrap_or_else(|| target.inbox_url.clone());
            DeliveryRepository
                .enqueue(&txn, &activity_id, &follower.id, &inbox, now.timestamp_micros())
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Unfollow (spec §4.1 `Unfollow` = `Undo(Follow)`).
    pub async fn unfollow(&self, follower_id: &str, target_id: &str) -> AppResult<()> {
        let edge = FollowRepository
            .find(&self.db, follower_id, target_id)
            .await?
            .ok_or_else(|| AppError::NotFound("follow edge".to_string()))?;

        let follower = self.require_actor(follower_id).await?;
        let target = self.require_actor(target_id).await?;
        let now = Utc::now();
        let undo_id = self.new_activity_id();

        let txn = self.db.begin().await?;
        FollowRepository.delete(&txn, follower_id, target_id).await?;

        let raw_body = format!(
            "{{\"id\":\"{undo_id}\",\"type\":\"Undo\",\"object\":\"{}\"}}",
            edge.follow_activity_id
        )
        .into_bytes();
        let am = activity::ActiveModel {
            id: Set(undo_id.clone()),
            local: Set(true),
            activity_type: Set("Undo".to_string()),
            actor_id: Set(follower.id.clone()),
            object_id: Set(Some(edge.follow_activity_id.clone())),
            target_id: Set(Some(target_id.to_string())),
            to: Set(serde_json::json!([target_id]).to_string()),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;

        if !target.local && !target.gone {
            let inbox = target.shared_inbox_url.clone().unwrap_or_else(|| target.inbox_url.clone());
            DeliveryRepository
                .enqueue(&txn, &undo_id, &follower.id, &inbox, now.timestamp_micros())
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Approve a pending follow request addressed to a local actor
    /// (spec §4.1 `Accept`).
    pub async fn accept_follow(&self, followed_id: &str, follow_activity_id: &str) -> AppResult<()> {
        let edge = FollowRepository
            .find_by_follow_activity(&self.db, follow_activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("follow request".to_string()))?;
        if edge.followed_id != followed_id {
            return Err(AppError::Forbidden("not the target of this follow".to_string()));
        }
        if edge.accepted {
            return Ok(());
        }

        let followed = self.require_actor(followed_id).await?;
        let follower = self.require_actor(&edge.follower_id).await?;
        let now = Utc::now();
        let accept_id = self.new_activity_id();

        let txn = self.db.begin().await?;
        FollowRepository.accept(&txn, edge.id).await?;

        let raw_body = format!(
            "{{\"id\":\"{accept_id}\",\"type\":\"Accept\",\"object\":\"{follow_activity_id}\"}}"
        )
        .into_bytes();
        let am = activity::ActiveModel {
            id: Set(accept_id.clone()),
            local: Set(true),
            activity_type: Set("Accept".to_string()),
            actor_id: Set(followed.id.clone()),
            object_id: Set(Some(follow_activity_id.to_string())),
            target_id: Set(Some(follower.id.clone())),
            to: Set(serde_json::json!([follower.id]).to_string()),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;

        if !follower.local && !follower.gone {
            let inbox = follower.shared_inbox_url.clone().unwrap_or_else(|| follower.inbox_url.clone());
            DeliveryRepository
                .enqueue(&txn, &accept_id, &followed.id, &inbox, now.timestamp_micros())
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Reject a pending follow request (spec §4.1 `Reject`).
    pub async fn reject_follow(&self, followed_id: &str, follow_activity_id: &str) -> AppResult<()> {
        let edge = FollowRepository
            .find_by_follow_activity(&self.db, follow_activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound("follow request".to_string()))?;
        if edge.followed_id != followed_id {
            return Err(AppError::Forbidden("not the target of this follow".to_string()));
        }

        let followed = self.require_actor(followed_id).await?;
        let follower = self.require_actor(&edge.follower_id).await?;
        let now = Utc::now();
        let reject_id = self.new_activity_id();

        let txn = self.db.begin().await?;
        FollowRepository.delete(&txn, &edge.follower_id, &edge.followed_id).await?;

        let raw_body = format!(
            "{{\"id\":\"{reject_id}\",\"type\":\"Reject\",\"object\":\"{follow_activity_id}\"}}"
        )
        .into_bytes();
        let am = activity::ActiveModel {
            id: Set(reject_id.clone()),
            local: Set(true),
            activity_type: Set("Reject".to_string()),
            actor_id: Set(followed.id.clone()),
            object_id: Set(Some(follow_activity_id.to_string())),
            target_id: Set(Some(follower.id.clone())),
            to: Set(serde_json::json!([follower.id]).to_string()),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;

        if !follower.local && !follower.gone {
            let inbox = follower.shared_inbox_url.clone().unwrap_or_else(|| follower.inbox_url.clone());
            DeliveryRepository
                .enqueue(&txn, &reject_id, &followed.id, &inbox, now.timestamp_micros())
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Move a local actor's identity to `new_target_id`, which must already
    /// list this actor's id in its `alsoKnownAs` (spec §4.1 `Move`
    /// invariant: Move only takes effect once the alias is reciprocated).
    /// Every accepted follower is re-pointed and notified via a federated
    /// `Move` activity.
    pub async fn move_actor(&self, actor_id: &str, new_target_id: &str) -> AppResult<()> {
        let claimed = ActorRepository
            .try_claim_throttle(
                &self.db,
                actor_id,
                ThrottleKind::Move,
                self.config.limits.move_throttle_interval,
                Utc::now(),
            )
            .await?;
        if !claimed {
            return Err(AppError::Throttled);
        }

        let actor = self.require_actor(actor_id).await?;
        if actor.moved_to.is_some() {
            return Err(AppError::AlreadyMoved);
        }
        let target = self.require_actor(new_target_id).await?;
        let also_known_as: Vec<String> =
            target.also_known_as.as_deref().and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default();
        if !also_known_as.iter().any(|a| a == actor_id) {
            return Err(AppError::Forbidden(
                "target has not listed this actor in alsoKnownAs".to_string(),
            ));
        }

        let now = Utc::now();
        let activity_id = self.new_activity_id();
        let txn = self.db.begin().await?;

        let moved = ActorRepository.set_moved_to(&txn, actor_id, new_target_id).await?;
        if !moved {
            return Err(AppError::AlreadyMoved);
        }
        let moved_followers = FollowRepository.rewrite_target(&txn, actor_id, new_target_id).await?;
        tracing::info!(actor_id, new_target_id, moved_followers, "actor moved");

        let followers = FollowRepository.list_followers(&txn, new_target_id).await?;
        let raw_body = format!(
            "{{\"id\":\"{activity_id}\",\"type\":\"Move\",\"object\":\"{actor_id}\",\"target\":\"{new_target_id}\"}}"
        )
        .into_bytes();
        let am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Move".to_string()),
            actor_id: Set(actor.id.clone()),
            object_id: Set(None),
            target_id: Set(Some(new_target_id.to_string())),
            to: Set(serde_json::json!([super::visibility::PUBLIC]).to_string()),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;

        for f in followers {
            if let Some(follower) = ActorRepository.find_by_id(&txn, &f.follower_id).await? {
                if !follower.local && !follower.gone {
                    let inbox = follower.shared_inbox_url.clone().unwrap_or(follower.inbox_url.clone());
                    DeliveryRepository
                        .enqueue(&txn, &activity_id, &actor.id, &inbox, now.timestamp_micros())
                        .await?;
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    /// Record a reciprocal alias so a later `Move` from `old_actor_id` can
    /// succeed (spec §4.1 `Move` invariant).
    pub async fn add_alias(&self, actor_id: &str, old_actor_id: &str) -> AppResult<()> {
        let claimed = ActorRepository
            .try_claim_throttle(
                &self.db,
                actor_id,
                ThrottleKind::Alias,
                self.config.limits.alias_throttle_interval,
                Utc::now(),
            )
            .await?;
        if !claimed {
            return Err(AppError::Throttled);
        }

        let actor = self.require_actor(actor_id).await?;
        let mut also_known_as: Vec<String> =
            actor.also_known_as.as_deref().and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default();
        if !also_known_as.iter().any(|a| a == old_actor_id) {
            also_known_as.push(old_actor_id.to_string());
        }
        let json = serde_json::to_string(&also_known_as).map_err(|e| AppError::Internal(e.to_string()))?;
        ActorRepository.set_also_known_as(&self.db, actor_id, &json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;

    use super::super::test_support::{seed_local_actor, seed_remote_actor, test_engine};
    use super::*;

    #[tokio::test]
    async fn following_yourself_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let engine = test_engine(db);

        let err = engine.follow(&alice.id, &alice.id).await.unwrap_err();
        assert!(matches!(err, AppError::BadInput(_)));
    }

    #[tokio::test]
    async fn following_local_target_is_accepted_immediately() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());

        engine.follow(&alice.id, &bob.id).await.unwrap();

        let edge = FollowRepository.find(&db, &alice.id, &bob.id).await.unwrap().unwrap();
        assert!(edge.accepted);
    }

    #[tokio::test]
    async fn following_remote_target_starts_unaccepted() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_remote_actor(&db, "https://remote.test/user/bob", "https://remote.test/inbox/bob").await;
        let engine = test_engine(db.clone());

        engine.follow(&alice.id, &bob.id).await.unwrap();

        let edge = FollowRepository.find(&db, &alice.id, &bob.id).await.unwrap().unwrap();
        assert!(!edge.accepted);

        let due = DeliveryRepository.fetch_due(&db, Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].target_inbox, bob.inbox_url);
    }

    #[tokio::test]
    async fn duplicate_follow_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db);

        engine.follow(&alice.id, &bob.id).await.unwrap();
        let err = engine.follow(&alice.id, &bob.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyFollowing));
    }

    #[tokio::test]
    async fn unfollow_removes_the_edge() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());

        engine.follow(&alice.id, &bob.id).await.unwrap();
        engine.unfollow(&alice.id, &bob.id).await.unwrap();

        assert!(FollowRepository.find(&db, &alice.id, &bob.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn move_without_reciprocal_alias_is_forbidden() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let new_home = seed_local_actor(&db, "alice2").await;
        let engine = test_engine(db);

        let err = engine.move_actor(&alice.id, &new_home.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn move_with_reciprocal_alias_rewrites_followers() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let new_home = seed_local_actor(&db, "alice2").await;
        let follower = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        FollowRepository.create(&db, &follower.id, &alice.id, "https://remote.test/activity/f1", true).await.unwrap();

        let engine = test_engine(db.clone());
        engine.add_alias(&new_home.id, &alice.id).await.unwrap();
        engine.move_actor(&alice.id, &new_home.id).await.unwrap();

        let moved = ActorRepository.find_by_id(&db, &alice.id).await.unwrap().unwrap();
        assert_eq!(moved.moved_to.as_deref(), Some(new_home.id.as_str()));
        assert!(FollowRepository.find(&db, &follower.id, &new_home.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn moving_twice_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let new_home = seed_local_actor(&db, "alice2").await;
        let engine = test_engine(db);

        engine.add_alias(&new_home.id, &alice.id).await.unwrap();
        engine.move_actor(&alice.id, &new_home.id).await.unwrap();

        let err = engine.move_actor(&alice.id, &new_home.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyMoved));
    }
}
