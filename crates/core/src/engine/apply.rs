//! `Apply`: the single entry point for every inbound, signature-verified
//! activity (spec §4.1, §4.4, §8, §9). Idempotent on activity id; stale
//! Updates/Deletes are ignored; unknown types are a logged no-op.

use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use tootik_common::AppResult;
use tootik_db::entities::{activity, object};
use tootik_db::repositories::{
    ActivityRepository, ActorRepository, DeliveryRepository, FollowRepository, HashtagRepository,
    LikeRepository, ObjectRepository, ShareRepository,
};

use super::mentions::extract_hashtags;
use super::types::{ActivityKind, ApplyOutcome, InboundActivity, InboundObject};
use super::Engine;

impl Engine {
    /// Apply one inbound activity. Callers (the inbox worker) have already
    /// verified the HTTP signature and resolved `actor_id`.
    pub async fn apply(&self, inbound: InboundActivity) -> AppResult<ApplyOutcome> {
        if ActivityRepository.exists(&self.db, &inbound.id).await? {
            return Ok(ApplyOutcome::DuplicateIgnored);
        }

        let txn = self.db.begin().await?;
        let outcome = match &inbound.kind {
            ActivityKind::Create(obj) => self.apply_create(&txn, &inbound, obj).await?,
            ActivityKind::Update(obj) => self.apply_update(&txn, &inbound, obj).await?,
            ActivityKind::Delete { object_id } => self.apply_delete(&txn, &inbound, object_id).await?,
            ActivityKind::Follow { target_id } => self.apply_follow(&txn, &inbound, target_id).await?,
            ActivityKind::Accept { follow_activity_id } => {
                self.apply_accept(&txn, follow_activity_id).await?
            }
            ActivityKind::Reject { follow_activity_id } => {
                self.apply_reject(&txn, follow_activity_id).await?
            }
            ActivityKind::Announce { object_id } => self.apply_announce(&txn, &inbound, object_id).await?,
            ActivityKind::Undo { activity_id } => self.apply_undo(&txn, &inbound, activity_id).await?,
            ActivityKind::Like { object_id } => self.apply_like(&txn, &inbound, object_id).await?,
            ActivityKind::Move { target_id } => self.apply_move(&txn, &inbound, target_id).await?,
            ActivityKind::Add { .. } | ActivityKind::Remove { .. } | ActivityKind::Block | ActivityKind::Flag => {
                ApplyOutcome::Ignored
            }
            ActivityKind::Unknown(kind) => {
                tracing::info!(kind, activity_id = %inbound.id, "ignoring unhandled activity type");
                ApplyOutcome::Ignored
            }
        };

        self.record_activity(&txn, &inbound).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    async fn record_activity<C: sea_orm::ConnectionTrait>(&self, txn: &C, inbound: &InboundActivity) -> AppResult<()> {
        let (object_id, target_id, activity_type) = match &inbound.kind {
            ActivityKind::Create(o) => (Some(o.id.clone()), None, "Create"),
            ActivityKind::Update(o) => (Some(o.id.clone()), None, "Update"),
            ActivityKind::Delete { object_id } => (Some(object_id.clone()), None, "Delete"),
            ActivityKind::Follow { target_id } => (None, Some(target_id.clone()), "Follow"),
            ActivityKind::Accept { follow_activity_id } => (Some(follow_activity_id.clone()), None, "Accept"),
            ActivityKind::Reject { follow_activity_id } => (Some(follow_activity_id.clone()), None, "Reject"),
            ActivityKind::Announce { object_id } => (Some(object_id.clone()), None, "Announce"),
            ActivityKind::Undo { activity_id } => (Some(activity_id.clone()), None, "Undo"),
            ActivityKind::Like { object_id } => (Some(object_id.clone()), None, "Like"),
            ActivityKind::Move { target_id } => (None, Some(target_id.clone()), "Move"),
            ActivityKind::Add { target_id, object_id } => (Some(object_id.clone()), Some(target_id.clone()), "Add"),
            ActivityKind::Remove { target_id, object_id } => (Some(object_id.clone()), Some(target_id.clone()), "Remove"),
            ActivityKind::Block => (None, None, "Block"),
            ActivityKind::Flag => (None, None, "Flag"),
            ActivityKind::Unknown(kind) => (None, None, kind.as_str()),
        };

        let am = activity::ActiveModel {
            id: Set(inbound.id.clone()),
            local: Set(false),
            activity_type: Set(activity_type.to_string()),
            actor_id: Set(inbound.actor_id.clone()),
            object_id: Set(object_id),
            target_id: Set(target_id),
            to: Set(serde_json::to_string(&inbound.to).unwrap_or_else(|_| "[]".to_string())),
            cc: Set(serde_json::to_string(&inbound.cc).unwrap_or_else(|_| "[]".to_string())),
            raw_body: Set(inbound.raw_body.clone()),
            created_at: Set(Utc::now()),
        };
        ActivityRepository.insert(txn, am).await?;
        Ok(())
    }

    async fn apply_create<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        obj: &InboundObject,
    ) -> AppResult<ApplyOutcome> {
        if ObjectRepository.find_any(txn, &obj.id).await?.is_some() {
            return Ok(ApplyOutcome::DuplicateIgnored);
        }

        let plain = self.formatter.to_plain(&obj.content);
        let hashtags = extract_hashtags(&plain);
        let now = Utc::now();

        let am = object::ActiveModel {
            id: Set(obj.id.clone()),
            local: Set(false),
            attributed_to: Set(inbound.actor_id.clone()),
            in_reply_to: Set(obj.in_reply_to.clone()),
            content: Set(plain),
            to: Set(serde_json::to_string(&obj.to).unwrap_or_else(|_| "[]".to_string())),
            cc: Set(serde_json::to_string(&obj.cc).unwrap_or_else(|_| "[]".to_string())),
            tag: Set(Some(serde_json::to_string(&obj.tag).unwrap_or_else(|_| "[]".to_string()))),
            is_poll: Set(obj.is_poll),
            poll_multiple: Set(false),
            raw_activity: Set(Some(inbound.raw_body.clone())),
            created_at: Set(obj.updated),
            updated_at: Set(now),
            ..Default::default()
        };
        ObjectRepository.insert(txn, am).await?;
        if !hashtags.is_empty() {
            HashtagRepository.index(txn, &obj.id, &hashtags).await?;
        }

        if let Some(forwarded) = self.forward_reply_if_needed(txn, inbound, obj.in_reply_to.as_deref()).await? {
            return Ok(forwarded);
        }
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_update<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        obj: &InboundObject,
    ) -> AppResult<ApplyOutcome> {
        let to_json = serde_json::to_string(&obj.to).unwrap_or_else(|_| "[]".to_string());
        let cc_json = serde_json::to_string(&obj.cc).unwrap_or_else(|_| "[]".to_string());
        let tag_json = serde_json::to_string(&obj.tag).unwrap_or_else(|_| "[]".to_string());
        let plain = self.formatter.to_plain(&obj.content);

        let changed = ObjectRepository
            .apply_update_if_newer(txn, &obj.id, &plain, &to_json, &cc_json, Some(&tag_json), obj.updated)
            .await?;
        if !changed {
            return Ok(ApplyOutcome::Stale);
        }

        HashtagRepository.delete_for_object(txn, &obj.id).await?;
        let hashtags = extract_hashtags(&plain);
        if !hashtags.is_empty() {
            HashtagRepository.index(txn, &obj.id, &hashtags).await?;
        }

        if let Some(forwarded) = self.forward_reply_if_needed(txn, inbound, obj.in_reply_to.as_deref()).await? {
            return Ok(forwarded);
        }
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_delete<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        object_id: &str,
    ) -> AppResult<ApplyOutcome> {
        let Some(existing) = ObjectRepository.find_any(txn, object_id).await? else {
            return Ok(ApplyOutcome::Ignored);
        };
        if existing.attributed_to != inbound.actor_id {
            tracing::warn!(object_id, actor = %inbound.actor_id, "delete authority mismatch, ignoring");
            return Ok(ApplyOutcome::Ignored);
        }
        ObjectRepository.soft_delete(txn, object_id).await?;
        HashtagRepository.delete_for_object(txn, object_id).await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_follow<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        target_id: &str,
    ) -> AppResult<ApplyOutcome> {
        let target = self.require_actor(target_id).await?;
        if !target.local {
            return Ok(ApplyOutcome::Ignored);
        }
        if FollowRepository.find(txn, &inbound.actor_id, target_id).await?.is_some() {
            return Ok(ApplyOutcome::DuplicateIgnored);
        }
        FollowRepository.create(txn, &inbound.actor_id, target_id, &inbound.id, true).await?;

        let follower = self.require_actor(&inbound.actor_id).await?;
        let accept_id = self.new_activity_id();
        let now = Utc::now();
        let raw_body =
            format!("{{\"id\":\"{accept_id}\",\"type\":\"Accept\",\"object\":\"{}\"}}", inbound.id).into_bytes();
        let am = activity::ActiveModel {
            id: Set(accept_id.clone()),
            local: Set(true),
            activity_type: Set("Accept".to_string()),
            actor_id: Set(target.id.clone()),
            object_id: Set(Some(inbound.id.clone())),
            target_id: Set(Some(follower.id.clone())),
            to: Set(serde_json::json!([follower.id]).to_string()),
            cc: Set("[]".to_string()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(txn, am).await?;

        if !follower.local && !follower.gone {
            let inbox = follower.shared_inbox_url.clone().unwrap_or(follower.inbox_url.clone());
            DeliveryRepository
                .enqueue(txn, &accept_id, &target.id, &inbox, now.timestamp_micros())
                .await?;
        }
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_accept<C: sea_orm::ConnectionTrait>(&self, txn: &C, follow_activity_id: &str) -> AppResult<ApplyOutcome> {
        let Some(edge) = FollowRepository.find_by_follow_activity(txn, follow_activity_id).await? else {
            return Ok(ApplyOutcome::Ignored);
        };
        if edge.accepted {
            return Ok(ApplyOutcome::DuplicateIgnored);
        }
        FollowRepository.accept(txn, edge.id).await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_reject<C: sea_orm::ConnectionTrait>(&self, txn: &C, follow_activity_id: &str) -> AppResult<ApplyOutcome> {
        let Some(edge) = FollowRepository.find_by_follow_activity(txn, follow_activity_id).await? else {
            return Ok(ApplyOutcome::Ignored);
        };
        FollowRepository.delete(txn, &edge.follower_id, &edge.followed_id).await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_announce<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        object_id: &str,
    ) -> AppResult<ApplyOutcome> {
        if ShareRepository.find(txn, &inbound.actor_id, object_id).await?.is_some() {
            return Ok(ApplyOutcome::DuplicateIgnored);
        }
        ShareRepository.add(txn, &inbound.actor_id, object_id, &inbound.id).await?;

        if let Some(object) = ObjectRepository.find_visible(txn, object_id).await? {
            if object.local {
                let author = self.require_actor(&object.attributed_to).await?;
                let followers = FollowRepository.list_followers(txn, &author.id).await?;
                let now = Utc::now();
                for f in followers {
                    if let Some(follower) = ActorRepository.find_by_id(txn, &f.follower_id).await? {
                        if !follower.local && !follower.gone {
                            let inbox = follower.shared_inbox_url.clone().unwrap_or(follower.inbox_url.clone());
                            DeliveryRepository
                                .enqueue(txn, &inbound.id, &author.id, &inbox, now.timestamp_micros())
                                .await?;
                        }
                    }
                }
            }
        }
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_like<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        object_id: &str,
    ) -> AppResult<ApplyOutcome> {
        if LikeRepository.find(txn, &inbound.actor_id, object_id).await?.is_some() {
            return Ok(ApplyOutcome::DuplicateIgnored);
        }
        LikeRepository.add(txn, &inbound.actor_id, object_id, &inbound.id).await?;
        Ok(ApplyOutcome::Applied)
    }

    /// `Undo` looks up the referenced activity's recorded type to decide
    /// what to unwind (spec §9: Undo dispatch is keyed off the stored
    /// activity, not a separate inbound tag).
    async fn apply_undo<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        undone_activity_id: &str,
    ) -> AppResult<ApplyOutcome> {
        let Some(undone) = ActivityRepository.find_by_id(txn, undone_activity_id).await? else {
            return Ok(ApplyOutcome::Ignored);
        };
        if undone.actor_id != inbound.actor_id {
            tracing::warn!(undone_activity_id, actor = %inbound.actor_id, "undo authority mismatch, ignoring");
            return Ok(ApplyOutcome::Ignored);
        }

        match undone.activity_type.as_str() {
            "Follow" => {
                if let Some(target_id) = &undone.target_id {
                    FollowRepository.delete(txn, &inbound.actor_id, target_id).await?;
                }
            }
            "Like" => {
                if let Some(object_id) = &undone.object_id {
                    LikeRepository.remove(txn, &inbound.actor_id, object_id).await?;
                }
            }
            "Announce" => {
                if let Some(object_id) = &undone.object_id {
                    ShareRepository.remove(txn, &inbound.actor_id, object_id).await?;
                }
            }
            other => {
                tracing::info!(other, "undo of unsupported activity type, ignoring");
                return Ok(ApplyOutcome::Ignored);
            }
        }
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_move<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        target_id: &str,
    ) -> AppResult<ApplyOutcome> {
        let target = self.require_actor(target_id).await?;
        let also_known_as: Vec<String> =
            target.also_known_as.as_deref().and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default();
        if !also_known_as.iter().any(|a| a == &inbound.actor_id) {
            tracing::warn!(old = %inbound.actor_id, new = target_id, "move without reciprocal alsoKnownAs, ignoring");
            return Ok(ApplyOutcome::Ignored);
        }

        let redirected = FollowRepository.list_followers_any(txn, &inbound.actor_id).await?;

        let moved = ActorRepository.set_moved_to(txn, &inbound.actor_id, target_id).await?;
        if !moved {
            return Ok(ApplyOutcome::DuplicateIgnored);
        }
        FollowRepository.rewrite_target(txn, &inbound.actor_id, target_id).await?;

        // Any outstanding Follow request addressed to the old identity is
        // now moot (spec §4.1 Apply/Move "cancels pending Follow activities").
        for follow_activity_id in ActivityRepository.find_follow_activity_ids(txn, &inbound.actor_id).await? {
            DeliveryRepository.cancel_by_activity_id(txn, &follow_activity_id).await?;
        }

        // Local followers of the old identity get a fresh Follow to the new
        // one, unaccepted until the new identity confirms it (spec §4.1
        // Apply/Move "if the target is remote enqueues a new Follow").
        if !target.local && !target.gone {
            let now = Utc::now();
            for edge in redirected {
                let Some(follower) = ActorRepository.find_by_id(txn, &edge.follower_id).await? else { continue };
                if !follower.local {
                    continue;
                }
                FollowRepository.set_accepted_for_pair(txn, &follower.id, target_id, false).await?;

                let activity_id = self.new_activity_id();
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
                ActivityRepository.insert(txn, am).await?;

                let inbox = target.shared_inbox_url.clone().unwrap_or_else(|| target.inbox_url.clone());
                DeliveryRepository
                    .enqueue(txn, &activity_id, &follower.id, &inbox, now.timestamp_micros())
                    .await?;
            }
        }

        Ok(ApplyOutcome::Applied)
    }

    /// When a reply's parent was authored locally, forward the raw inbound
    /// bytes unsigned to the parent author's remote followers so they see
    /// the reply even though the replier isn't one of their follows
    /// (spec §4.4, §9).
    async fn forward_reply_if_needed<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        inbound: &InboundActivity,
        in_reply_to: Option<&str>,
    ) -> AppResult<Option<ApplyOutcome>> {
        let Some(parent_id) = in_reply_to else { return Ok(None) };
        let Some(parent) = ObjectRepository.find_visible(txn, parent_id).await? else {
            return Ok(None);
        };
        if !parent.local {
            return Ok(None);
        }

        let author = self.require_actor(&parent.attributed_to).await?;
        let followers = FollowRepository.list_followers(txn, &author.id).await?;
        let now = Utc::now();
        for f in followers {
            if let Some(follower) = ActorRepository.find_by_id(txn, &f.follower_id).await? {
                if !follower.local && !follower.gone && follower.id != inbound.actor_id {
                    let inbox = follower.shared_inbox_url.clone().unwrap_or(follower.inbox_url.clone());
                    DeliveryRepository
                        .enqueue(txn, &inbound.id, &author.id, &inbox, now.timestamp_micros())
                        .await?;
                }
            }
        }
        Ok(Some(ApplyOutcome::Forwarded))
    }
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;

    use super::super::test_support::{seed_local_actor, seed_remote_actor, test_engine};
    use super::*;

    fn inbound_create(id: &str, actor_id: &str, object_id: &str, content: &str) -> InboundActivity {
        InboundActivity {
            id: id.to_string(),
            kind: ActivityKind::Create(InboundObject {
                id: object_id.to_string(),
                content: content.to_string(),
                in_reply_to: None,
                to: vec![super::super::visibility::PUBLIC.to_string()],
                cc: vec![],
                tag: vec![],
                updated: Utc::now(),
                is_poll: false,
            }),
            actor_id: actor_id.to_string(),
            raw_body: b"{}".to_vec(),
            to: vec![super::super::visibility::PUBLIC.to_string()],
            cc: vec![],
        }
    }

    #[tokio::test]
    async fn duplicate_activity_id_is_ignored() {
        let db = in_memory_db().await.unwrap();
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db);

        let inbound = inbound_create("https://remote.test/activity/1", &carol.id, "https://remote.test/object/1", "hi");
        let first = engine.apply(inbound.clone()).await.unwrap();
        assert_eq!(first, ApplyOutcome::Applied);

        let second = engine.apply(inbound).await.unwrap();
        assert_eq!(second, ApplyOutcome::DuplicateIgnored);
    }

    #[tokio::test]
    async fn create_stores_the_object_under_the_sending_actor() {
        let db = in_memory_db().await.unwrap();
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db.clone());

        let inbound = inbound_create("https://remote.test/activity/1", &carol.id, "https://remote.test/object/1", "hello");
        engine.apply(inbound).await.unwrap();

        let stored = ObjectRepository.find_visible(&db, "https://remote.test/object/1").await.unwrap().unwrap();
        assert_eq!(stored.attributed_to, carol.id);
        assert_eq!(stored.content, "hello");
        assert!(!stored.local);
    }

    #[tokio::test]
    async fn stale_update_is_ignored() {
        let db = in_memory_db().await.unwrap();
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db.clone());

        let created_at = Utc::now();
        engine.apply(inbound_create("https://remote.test/activity/1", &carol.id, "https://remote.test/object/1", "v1")).await.unwrap();

        let stale_update = InboundActivity {
            id: "https://remote.test/activity/2".to_string(),
            kind: ActivityKind::Update(InboundObject {
                id: "https://remote.test/object/1".to_string(),
                content: "v0-older".to_string(),
                in_reply_to: None,
                to: vec![],
                cc: vec![],
                tag: vec![],
                updated: created_at - chrono::Duration::hours(1),
                is_poll: false,
            }),
            actor_id: carol.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(stale_update).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Stale);

        let stored = ObjectRepository.find_visible(&db, "https://remote.test/object/1").await.unwrap().unwrap();
        assert_eq!(stored.content, "v1");
    }

    #[tokio::test]
    async fn newer_update_is_applied() {
        let db = in_memory_db().await.unwrap();
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db.clone());

        engine.apply(inbound_create("https://remote.test/activity/1", &carol.id, "https://remote.test/object/1", "v1")).await.unwrap();

        let update = InboundActivity {
            id: "https://remote.test/activity/2".to_string(),
            kind: ActivityKind::Update(InboundObject {
                id: "https://remote.test/object/1".to_string(),
                content: "v2".to_string(),
                in_reply_to: None,
                to: vec![],
                cc: vec![],
                tag: vec![],
                updated: Utc::now() + chrono::Duration::seconds(5),
                is_poll: false,
            }),
            actor_id: carol.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(update).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);

        let stored = ObjectRepository.find_visible(&db, "https://remote.test/object/1").await.unwrap().unwrap();
        assert_eq!(stored.content, "v2");
    }

    #[tokio::test]
    async fn delete_authority_mismatch_is_ignored() {
        let db = in_memory_db().await.unwrap();
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let mallory = seed_remote_actor(&db, "https://remote.test/user/mallory", "https://remote.test/inbox/mallory").await;
        let engine = test_engine(db.clone());

        engine.apply(inbound_create("https://remote.test/activity/1", &carol.id, "https://remote.test/object/1", "mine")).await.unwrap();

        let forged_delete = InboundActivity {
            id: "https://remote.test/activity/2".to_string(),
            kind: ActivityKind::Delete { object_id: "https://remote.test/object/1".to_string() },
            actor_id: mallory.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(forged_delete).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored);

        let stored = ObjectRepository.find_visible(&db, "https://remote.test/object/1").await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn follow_of_local_actor_auto_accepts_and_enqueues_delivery() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db.clone());

        let follow = InboundActivity {
            id: "https://remote.test/activity/follow1".to_string(),
            kind: ActivityKind::Follow { target_id: alice.id.clone() },
            actor_id: carol.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(follow).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);

        let edge = FollowRepository.find(&db, &carol.id, &alice.id).await.unwrap().unwrap();
        assert!(edge.accepted);

        let due = DeliveryRepository.fetch_due(&db, Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].target_inbox, carol.inbox_url);
    }

    #[tokio::test]
    async fn follow_of_remote_target_is_ignored() {
        let db = in_memory_db().await.unwrap();
        let bob = seed_remote_actor(&db, "https://remote.test/user/bob", "https://remote.test/inbox/bob").await;
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db.clone());

        let follow = InboundActivity {
            id: "https://remote.test/activity/follow1".to_string(),
            kind: ActivityKind::Follow { target_id: bob.id.clone() },
            actor_id: carol.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(follow).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert!(FollowRepository.find(&db, &carol.id, &bob.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undo_of_follow_removes_the_edge() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db.clone());

        let follow_id = "https://remote.test/activity/follow1".to_string();
        engine
            .apply(InboundActivity {
                id: follow_id.clone(),
                kind: ActivityKind::Follow { target_id: alice.id.clone() },
                actor_id: carol.id.clone(),
                raw_body: b"{}".to_vec(),
                to: vec![],
                cc: vec![],
            })
            .await
            .unwrap();
        assert!(FollowRepository.find(&db, &carol.id, &alice.id).await.unwrap().is_some());

        let undo = InboundActivity {
            id: "https://remote.test/activity/undo1".to_string(),
            kind: ActivityKind::Undo { activity_id: follow_id },
            actor_id: carol.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(undo).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(FollowRepository.find(&db, &carol.id, &alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undo_with_mismatched_authority_is_ignored() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let mallory = seed_remote_actor(&db, "https://remote.test/user/mallory", "https://remote.test/inbox/mallory").await;
        let engine = test_engine(db.clone());

        let follow_id = "https://remote.test/activity/follow1".to_string();
        engine
            .apply(InboundActivity {
                id: follow_id.clone(),
                kind: ActivityKind::Follow { target_id: alice.id.clone() },
                actor_id: carol.id.clone(),
                raw_body: b"{}".to_vec(),
                to: vec![],
                cc: vec![],
            })
            .await
            .unwrap();

        let forged_undo = InboundActivity {
            id: "https://remote.test/activity/undo1".to_string(),
            kind: ActivityKind::Undo { activity_id: follow_id },
            actor_id: mallory.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(forged_undo).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert!(FollowRepository.find(&db, &carol.id, &alice.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn move_to_remote_target_cancels_pending_follow_and_enqueues_new_one() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let old = seed_remote_actor(&db, "https://remote.test/user/old", "https://remote.test/inbox/old").await;
        let new = seed_remote_actor(&db, "https://other.test/user/new", "https://other.test/inbox/new").await;
        ActorRepository
            .set_also_known_as(&db, &new.id, &serde_json::json!([old.id]).to_string())
            .await
            .unwrap();
        let engine = test_engine(db.clone());

        let follow_activity_id = "https://example.test/activity/follow1".to_string();
        let follow = FollowRepository.create(&db, &alice.id, &old.id, &follow_activity_id, false).await.unwrap();
        assert!(!follow.accepted);
        let follow_am = activity::ActiveModel {
            id: Set(follow_activity_id.clone()),
            local: Set(true),
            activity_type: Set("Follow".to_string()),
            actor_id: Set(alice.id.clone()),
            object_id: Set(None),
            target_id: Set(Some(old.id.clone())),
            to: Set(serde_json::json!([old.id]).to_string()),
            cc: Set("[]".to_string()),
            raw_body: Set(b"{}".to_vec()),
            created_at: Set(Utc::now()),
        };
        ActivityRepository.insert(&db, follow_am).await.unwrap();
        DeliveryRepository.enqueue(&db, &follow_activity_id, &alice.id, &old.inbox_url, 0).await.unwrap();

        let move_activity = InboundActivity {
            id: "https://remote.test/activity/move1".to_string(),
            kind: ActivityKind::Move { target_id: new.id.clone() },
            actor_id: old.id.clone(),
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(move_activity).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);

        let due = DeliveryRepository.fetch_due(&db, Utc::now(), 10).await.unwrap();
        assert!(due.iter().all(|item| item.activity_id != follow_activity_id), "stale follow delivery was not canceled");

        let redirected = FollowRepository.find(&db, &alice.id, &new.id).await.unwrap().unwrap();
        assert!(!redirected.accepted);

        let new_follow_delivery = due.iter().find(|item| item.sender_actor_id == alice.id && item.target_inbox == new.inbox_url);
        assert!(new_follow_delivery.is_some(), "no new Follow delivery enqueued to the moved-to target");
    }

    #[tokio::test]
    async fn unknown_activity_type_is_ignored() {
        let db = in_memory_db().await.unwrap();
        let carol = seed_remote_actor(&db, "https://remote.test/user/carol", "https://remote.test/inbox/carol").await;
        let engine = test_engine(db);

        let inbound = InboundActivity {
            id: "https://remote.test/activity/weird".to_string(),
            kind: ActivityKind::Unknown("Arrive".to_string()),
            actor_id: carol.id,
            raw_body: b"{}".to_vec(),
            to: vec![],
            cc: vec![],
        };
        let outcome = engine.apply(inbound).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored);
    }
}
