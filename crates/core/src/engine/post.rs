//! `Post`, `Edit` and `Delete` (spec §4.1).

use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use tootik_common::{AppError, AppResult};
use tootik_db::entities::{activity, object, poll_option};
use tootik_db::repositories::{
    ActivityRepository, ActorRepository, DeliveryRepository, FollowRepository, HashtagRepository,
    ObjectRepository, ThrottleKind,
};

use super::mentions::{extract_hashtags, extract_mentions};
use super::types::{PollSpec, PostContent, PostVisibility};
use super::visibility::PUBLIC;
use super::Engine;

impl Engine {
    /// Author a new `Note` (or `Question`, when `content.poll` is set) as
    /// `author_id`, enqueue it for delivery to the right audience, and
    /// return the new object's id.
    pub async fn post(
        &self,
        author_id: &str,
        content: PostContent,
        visibility: PostVisibility,
        in_reply_to: Option<&str>,
    ) -> AppResult<String> {
        if content.text.len() > self.config.limits.max_post_length {
            return Err(AppError::BadInput("post exceeds max_post_length".to_string()));
        }

        let claimed = ActorRepository
            .try_claim_throttle(
                &self.db,
                author_id,
                ThrottleKind::Post,
                self.config.limits.post_throttle_interval,
                Utc::now(),
            )
            .await?;
        if !claimed {
            return Err(AppError::Throttled);
        }

        let author = self.require_actor(author_id).await?;
        let plain = self.formatter.to_plain(&content.text);
        let mentions = extract_mentions(&plain);
        let hashtags = extract_hashtags(&plain);

        let (to, mut cc) = self.build_audience(&author.id, visibility, &mentions).await?;
        if let Some(parent_id) = in_reply_to {
            if let Some(parent) = ObjectRepository.find_visible(&self.db, parent_id).await? {
                for addr in self.reply_inherited_recipients(&parent).await? {
                    if addr != PUBLIC && !to.contains(&addr) && !cc.contains(&addr) {
                        cc.push(addr);
                    }
                }
            }
        }
        let object_id = self.new_object_id();
        let activity_id = self.new_activity_id();
        let now = Utc::now();

        let tag_json = serde_json::to_string(&mentions.iter().map(|m| m.handle()).collect::<Vec<_>>())
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let txn = self.db.begin().await?;

        let object_am = object::ActiveModel {
            id: Set(object_id.clone()),
            local: Set(true),
            attributed_to: Set(author.id.clone()),
            in_reply_to: Set(in_reply_to.map(str::to_string)),
            content: Set(plain),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set(serde_json::to_string(&cc).map_err(|e| AppError::Internal(e.to_string()))?),
            tag: Set(Some(tag_json)),
            is_poll: Set(content.poll.is_some()),
            poll_closes_at: Set(content.poll.as_ref().map(|p| p.closes_at)),
            poll_multiple: Set(content.poll.as_ref().is_some_and(|p| p.multiple)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        ObjectRepository.insert(&txn, object_am).await?;

        if let Some(PollSpec { options, .. }) = &content.poll {
            for (position, name) in options.iter().enumerate() {
                let option_am = poll_option::ActiveModel {
                    object_id: Set(object_id.clone()),
                    position: Set(i32::try_from(position).unwrap_or(i32::MAX)),
                    name: Set(name.clone()),
                    votes: Set(0),
                    ..Default::default()
                };
                sea_orm::ActiveModelTrait::insert(option_am, &txn).await?;
            }
        }

        if !hashtags.is_empty() {
            HashtagRepository.index(&txn, &object_id, &hashtags).await?;
        }

        let raw_body = format!("{{\"id\":\"{activity_id}\",\"type\":\"Create\",\"object\":\"{object_id}\"}}").into_bytes();
        let activity_am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Create".to_string()),
            actor_id: Set(author.id.clone()),
            object_id: Set(Some(object_id.clone())),
            target_id: Set(None),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set(serde_json::to_string(&cc).map_err(|e| AppError::Internal(e.to_string()))?),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, activity_am).await?;

        self.enqueue_deliveries(&txn, &author, &activity_id, &to, &cc).await?;

        txn.commit().await?;
        Ok(object_id)
    }

    /// Edit a local object's content in place (spec §4.1 `Edit`). The
    /// edited content is re-delivered as an `Update` to the same audience.
    pub async fn edit(&self, author_id: &str, object_id: &str, new_text: &str) -> AppResult<()> {
        let existing = ObjectRepository
            .find_visible(&self.db, object_id)
            .await?
            .ok_or_else(|| AppError::NotFound(object_id.to_string()))?;
        if existing.attributed_to != author_id {
            return Err(AppError::NotAuthor);
        }

        // Quiet period measured from the object itself, not from the
        // author's last edit. A fresh post cannot be edited again until it
        // has aged past `edit_throttle_interval` (spec §4.1 Edit, §8).
        let quiet_period = chrono::Duration::from_std(self.config.limits.edit_throttle_interval).unwrap_or(chrono::Duration::zero());
        if Utc::now() - existing.created_at < quiet_period {
            return Err(AppError::Throttled);
        }

        // Secondary per-actor rate limit: even once an object has aged past
        // its own quiet period, an actor may not edit more than once per
        // `min_actor_edit_interval` across all of their posts.
        let claimed = ActorRepository
            .try_claim_throttle(
                &self.db,
                author_id,
                ThrottleKind::Edit,
                self.config.limits.min_actor_edit_interval,
                Utc::now(),
            )
            .await?;
        if !claimed {
            return Err(AppError::Throttled);
        }

        let author = self.require_actor(author_id).await?;
        let plain = self.formatter.to_plain(new_text);
        let hashtags = extract_hashtags(&plain);
        let now = Utc::now();

        // Re-fetch community membership: the Group actor referenced by the
        // parent's cc may have changed since the original post (spec §4.1
        // Edit). Additive only, same as Post — existing recipients are
        // never dropped on edit.
        let mut cc: Vec<String> = serde_json::from_str(&existing.cc).unwrap_or_default();
        let to: Vec<String> = serde_json::from_str(&existing.to).unwrap_or_default();
        if let Some(parent_id) = &existing.in_reply_to {
            if let Some(parent) = ObjectRepository.find_visible(&self.db, parent_id).await? {
                for addr in self.reply_inherited_recipients(&parent).await? {
                    if addr != PUBLIC && !to.contains(&addr) && !cc.contains(&addr) {
                        cc.push(addr);
                    }
                }
            }
        }
        let cc_json = serde_json::to_string(&cc).map_err(|e| AppError::Internal(e.to_string()))?;

        let txn = self.db.begin().await?;

        ObjectRepository
            .apply_update_if_newer(&txn, object_id, &plain, &existing.to, &cc_json, None, now)
            .await?;

        HashtagRepository.delete_for_object(&txn, object_id).await?;
        if !hashtags.is_empty() {
            HashtagRepository.index(&txn, object_id, &hashtags).await?;
        }

        let activity_id = self.new_activity_id();
        let raw_body =
            format!("{{\"id\":\"{activity_id}\",\"type\":\"Update\",\"object\":\"{object_id}\"}}").into_bytes();
        let activity_am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Update".to_string()),
            actor_id: Set(author.id.clone()),
            object_id: Set(Some(object_id.to_string())),
            target_id: Set(None),
            to: Set(existing.to.clone()),
            cc: Set(cc_json),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, activity_am).await?;

        self.enqueue_deliveries(&txn, &author, &activity_id, &to, &cc).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Tombstone a local object and federate the `Delete` (spec §4.1
    /// `Delete`). Replies with no other surviving ancestor are left in
    /// place as unreachable leaves; nothing deletes descendants eagerly.
    pub async fn delete(&self, author_id: &str, object_id: &str) -> AppResult<()> {
        let existing = ObjectRepository
            .find_visible(&self.db, object_id)
            .await?
            .ok_or_else(|| AppError::NotFound(object_id.to_string()))?;
        if existing.attributed_to != author_id {
            return Err(AppError::NotAuthor);
        }

        let author = self.require_actor(author_id).await?;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        ObjectRepository.soft_delete(&txn, object_id).await?;
        HashtagRepository.delete_for_object(&txn, object_id).await?;

        let activity_id = self.new_activity_id();
        let raw_body =
            format!("{{\"id\":\"{activity_id}\",\"type\":\"Delete\",\"object\":\"{object_id}\"}}").into_bytes();
        let activity_am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Delete".to_string()),
            actor_id: Set(author.id.clone()),
            object_id: Set(Some(object_id.to_string())),
            target_id: Set(None),
            to: Set(existing.to.clone()),
            cc: Set(existing.cc.clone()),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, activity_am).await?;

        let to: Vec<String> = serde_json::from_str(&existing.to).unwrap_or_default();
        let cc: Vec<String> = serde_json::from_str(&existing.cc).unwrap_or_default();
        self.enqueue_deliveries(&txn, &author, &activity_id, &to, &cc).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Addresses a reply additionally inherits from its parent (spec §4.1
    /// `Post`): the parent's full audience, the parent's author, and the
    /// first Group actor referenced in the parent's `cc` (the only way
    /// "community" membership propagates, spec §9).
    pub(crate) async fn reply_inherited_recipients(&self, parent: &object::Model) -> AppResult<Vec<String>> {
        let mut extra: Vec<String> = Vec::new();
        let parent_to: Vec<String> = serde_json::from_str(&parent.to).unwrap_or_default();
        let parent_cc: Vec<String> = serde_json::from_str(&parent.cc).unwrap_or_default();
        extra.extend(parent_to.iter().cloned());
        extra.extend(parent_cc.iter().cloned());
        extra.push(parent.attributed_to.clone());

        for addr in &parent_cc {
            if let Some(actor) = ActorRepository.find_by_id(&self.db, addr).await? {
                if actor.actor_type == "Group" {
                    extra.push(actor.id);
                    break;
                }
            }
        }
        Ok(extra)
    }

    /// Build the `to`/`cc` address lists for a new post (spec §3, §9).
    pub(crate) async fn build_audience(
        &self,
        author_id: &str,
        visibility: PostVisibility,
        mentions: &[super::mentions::Mention],
    ) -> AppResult<(Vec<String>, Vec<String>)> {
        let followers = self.followers_url(author_id);
        let mentioned_ids: Vec<String> = mentions
            .iter()
            .filter_map(|m| m.host.as_ref().map(|h| format!("https://{h}/user/{}", m.username)))
            .collect();

        Ok(match visibility {
            PostVisibility::Public => (vec![PUBLIC.to_string()], {
                let mut cc = vec![followers];
                cc.extend(mentioned_ids);
                cc
            }),
            PostVisibility::Followers => (vec![followers], mentioned_ids),
            PostVisibility::Direct => (mentioned_ids, vec![]),
        })
    }

    /// Enqueue one delivery item per distinct remote inbox in the
    /// audience's transitive closure (followers expanded at enqueue time,
    /// spec §B, using the shared inbox when the target advertises one).
    pub(crate) async fn enqueue_deliveries<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
        author: &tootik_db::entities::actor::Model,
        activity_id: &str,
        to: &[String],
        cc: &[String],
    ) -> AppResult<()> {
        let mut inboxes: BTreeSet<String> = BTreeSet::new();
        let followers_url = self.followers_url(&author.id);

        for addr in to.iter().chain(cc.iter()) {
            if addr == PUBLIC {
                continue;
            }
            if *addr == followers_url {
                let followers = FollowRepository.list_followers(txn, &author.id).await?;
                for f in followers {
                    if let Some(follower) = ActorRepository.find_by_id(txn, &f.follower_id).await? {
                        if !follower.local {
                            inboxes.insert(follower.shared_inbox_url.unwrap_or(follower.inbox_url));
                        }
                    }
                }
            } else if let Some(actor) = ActorRepository.find_by_id(txn, addr).await? {
                if !actor.local && !actor.gone {
                    inboxes.insert(actor.shared_inbox_url.unwrap_or(actor.inbox_url));
                }
            }
        }

        let sequence = Utc::now().timestamp_micros();
        for inbox in inboxes {
            DeliveryRepository.enqueue(txn, activity_id, &author.id, &inbox, sequence).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tootik_db::test_utils::in_memory_db;

    use super::super::test_support::{seed_local_actor, seed_remote_actor, test_engine};
    use super::*;

    fn content(text: &str) -> PostContent {
        PostContent { text: text.to_string(), attachments: vec![], poll: None }
    }

    #[tokio::test]
    async fn post_then_view_round_trips_content() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let engine = test_engine(db.clone());

        let object_id = engine.post(&alice.id, content("hello, fediverse"), PostVisibility::Public, None).await.unwrap();

        let stored = ObjectRepository.find_visible(&db, &object_id).await.unwrap().unwrap();
        assert_eq!(stored.content, "hello, fediverse");
        assert_eq!(stored.attributed_to, alice.id);
        assert!(stored.local);
    }

    #[tokio::test]
    async fn post_over_max_length_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let mut engine = test_engine(db);
        Arc::get_mut(&mut engine.config).unwrap().limits.max_post_length = 5;

        let err = engine.post(&alice.id, content("way too long"), PostVisibility::Public, None).await.unwrap_err();
        assert!(matches!(err, AppError::BadInput(_)));
    }

    #[tokio::test]
    async fn rapid_second_post_is_throttled() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let mut engine = test_engine(db);
        Arc::get_mut(&mut engine.config).unwrap().limits.post_throttle_interval = std::time::Duration::from_secs(3600);

        engine.post(&alice.id, content("first"), PostVisibility::Public, None).await.unwrap();
        let err = engine.post(&alice.id, content("second"), PostVisibility::Public, None).await.unwrap_err();
        assert!(matches!(err, AppError::Throttled));
    }

    #[tokio::test]
    async fn public_post_enqueues_delivery_to_remote_follower() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_remote_actor(&db, "https://remote.test/user/bob", "https://remote.test/inbox/bob").await;
        FollowRepository.create(&db, &bob.id, &alice.id, "https://remote.test/activity/follow1", true).await.unwrap();

        let engine = test_engine(db.clone());
        engine.post(&alice.id, content("hi followers"), PostVisibility::Public, None).await.unwrap();

        let due = DeliveryRepository.fetch_due(&db, Utc::now(), 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].target_inbox, bob.inbox_url);
    }

    #[tokio::test]
    async fn edit_by_non_author_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());

        let object_id = engine.post(&alice.id, content("original"), PostVisibility::Public, None).await.unwrap();
        let err = engine.edit(&bob.id, &object_id, "hijacked").await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthor));

        let stored = ObjectRepository.find_visible(&db, &object_id).await.unwrap().unwrap();
        assert_eq!(stored.content, "original");
    }

    #[tokio::test]
    async fn immediate_edit_is_throttled_until_object_ages() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let mut engine = test_engine(db.clone());
        Arc::get_mut(&mut engine.config).unwrap().limits.edit_throttle_interval = std::time::Duration::from_secs(3600);

        let object_id = engine.post(&alice.id, content("v1"), PostVisibility::Public, None).await.unwrap();
        let err = engine.edit(&alice.id, &object_id, "v2").await.unwrap_err();
        assert!(matches!(err, AppError::Throttled));

        ObjectRepository.backdate_created_at(&db, &object_id, Utc::now() - chrono::Duration::hours(2)).await.unwrap();
        engine.edit(&alice.id, &object_id, "v2").await.unwrap();

        let stored = ObjectRepository.find_visible(&db, &object_id).await.unwrap().unwrap();
        assert_eq!(stored.content, "v2");
    }

    #[tokio::test]
    async fn edit_replaces_content_in_place() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let engine = test_engine(db.clone());

        let object_id = engine.post(&alice.id, content("v1"), PostVisibility::Public, None).await.unwrap();
        engine.edit(&alice.id, &object_id, "v2").await.unwrap();

        let stored = ObjectRepository.find_visible(&db, &object_id).await.unwrap().unwrap();
        assert_eq!(stored.content, "v2");
    }

    #[tokio::test]
    async fn delete_by_non_author_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());

        let object_id = engine.post(&alice.id, content("mine"), PostVisibility::Public, None).await.unwrap();
        let err = engine.delete(&bob.id, &object_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthor));
    }

    #[tokio::test]
    async fn delete_then_view_is_gone() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let engine = test_engine(db.clone());

        let object_id = engine.post(&alice.id, content("ephemeral"), PostVisibility::Public, None).await.unwrap();
        engine.delete(&alice.id, &object_id).await.unwrap();

        assert!(ObjectRepository.find_visible(&db, &object_id).await.unwrap().is_none());
        let tombstoned = ObjectRepository.find_any(&db, &object_id).await.unwrap().unwrap();
        assert!(tombstoned.deleted_at.is_some());
    }

    #[tokio::test]
    async fn unauthenticated_delete_of_missing_object_is_not_found() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let engine = test_engine(db);

        let err = engine.delete(&alice.id, "https://example.test/object/does-not-exist").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn direct_post_addresses_only_mentions() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let engine = test_engine(db);

        let (to, cc) = engine.build_audience(&alice.id, PostVisibility::Direct, &[]).await.unwrap();
        assert!(to.is_empty());
        assert!(cc.is_empty());
    }

    #[tokio::test]
    async fn followers_only_post_addresses_followers_url_not_public() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let engine = test_engine(db);

        let (to, _cc) = engine.build_audience(&alice.id, PostVisibility::Followers, &[]).await.unwrap();
        assert_eq!(to, vec![engine.followers_url(&alice.id)]);
        assert!(!to.contains(&PUBLIC.to_string()));
    }
}
