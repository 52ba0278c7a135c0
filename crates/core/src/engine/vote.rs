//! `Vote` (spec §4.1): casting a vote creates both a `Note` whose
//! `inReplyTo` is the poll and whose content is the chosen option's name,
//! and a `vote` tuple the poll tallier loop re-counts (spec §5).

use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use tootik_common::{AppError, AppResult};
use tootik_db::entities::{activity, object};
use tootik_db::repositories::{ActivityRepository, DeliveryRepository, ObjectRepository, VoteRepository};

use super::Engine;

impl Engine {
    /// Cast `actor_id`'s vote for `option_name` on the poll at `poll_id`.
    pub async fn vote(&self, actor_id: &str, poll_id: &str, option_name: &str) -> AppResult<String> {
        let poll = ObjectRepository
            .find_visible(&self.db, poll_id)
            .await?
            .ok_or_else(|| AppError::NotFound(poll_id.to_string()))?;
        if !poll.is_poll {
            return Err(AppError::BadInput("object is not a poll".to_string()));
        }
        if let Some(closes_at) = poll.poll_closes_at {
            if Utc::now() > closes_at {
                return Err(AppError::BadInput("poll is closed".to_string()));
            }
        }
        if VoteRepository.has_voted(&self.db, poll_id, actor_id).await? {
            return Err(AppError::AlreadyExists("already voted".to_string()));
        }
        let option = VoteRepository
            .find_option_by_name(&self.db, poll_id, option_name)
            .await?
            .ok_or_else(|| AppError::BadInput(format!("no such option: {option_name}")))?;

        let actor = self.require_actor(actor_id).await?;
        let poll_author = self.require_actor(&poll.attributed_to).await?;
        let now = Utc::now();
        let object_id = self.new_object_id();
        let activity_id = self.new_activity_id();

        let to = vec![poll_author.id.clone()];
        let cc: Vec<String> = vec![];

        let txn = self.db.begin().await?;

        let vote_note = object::ActiveModel {
            id: Set(object_id.clone()),
            local: Set(true),
            attributed_to: Set(actor.id.clone()),
            in_reply_to: Set(Some(poll_id.to_string())),
            content: Set(option_name.to_string()),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set(serde_json::to_string(&cc).map_err(|e| AppError::Internal(e.to_string()))?),
            is_poll: Set(false),
            poll_multiple: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        ObjectRepository.insert(&txn, vote_note).await?;
        VoteRepository.cast(&txn, poll_id, actor_id, option.id).await?;

        let raw_body = format!(
            "{{\"id\":\"{activity_id}\",\"type\":\"Create\",\"object\":\"{object_id}\"}}"
        )
        .into_bytes();
        let am = activity::ActiveModel {
            id: Set(activity_id.clone()),
            local: Set(true),
            activity_type: Set("Create".to_string()),
            actor_id: Set(actor.id.clone()),
            object_id: Set(Some(object_id.clone())),
            target_id: Set(None),
            to: Set(serde_json::to_string(&to).map_err(|e| AppError::Internal(e.to_string()))?),
            cc: Set(serde_json::to_string(&cc).map_err(|e| AppError::Internal(e.to_string()))?),
            raw_body: Set(raw_body),
            created_at: Set(now),
        };
        ActivityRepository.insert(&txn, am).await?;

        if !poll_author.local && !poll_author.gone {
            let inbox = poll_author.shared_inbox_url.clone().unwrap_or(poll_author.inbox_url.clone());
            DeliveryRepository
                .enqueue(&txn, &activity_id, &actor.id, &inbox, now.timestamp_micros())
                .await?;
        }

        VoteRepository.retally(&txn, poll_id).await?;

        txn.commit().await?;
        Ok(object_id)
    }
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;

    use super::super::test_support::{seed_local_actor, test_engine};
    use super::super::types::{PollSpec, PostContent, PostVisibility};
    use super::*;

    async fn author_a_poll(engine: &super::super::Engine, author_id: &str) -> String {
        let content = PostContent {
            text: "pineapple on pizza?".to_string(),
            attachments: vec![],
            poll: Some(PollSpec {
                options: vec!["yes".to_string(), "no".to_string()],
                multiple: false,
                closes_at: Utc::now() + chrono::Duration::hours(1),
            }),
        };
        engine.post(author_id, content, PostVisibility::Public, None).await.unwrap()
    }

    #[tokio::test]
    async fn vote_retallies_the_chosen_option() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let poll_id = author_a_poll(&engine, &alice.id).await;

        engine.vote(&bob.id, &poll_id, "yes").await.unwrap();

        let options = VoteRepository.list_options(&db, &poll_id).await.unwrap();
        let yes = options.iter().find(|o| o.name == "yes").unwrap();
        let no = options.iter().find(|o| o.name == "no").unwrap();
        assert_eq!(yes.votes, 1);
        assert_eq!(no.votes, 0);
    }

    #[tokio::test]
    async fn voting_twice_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let poll_id = author_a_poll(&engine, &alice.id).await;

        engine.vote(&bob.id, &poll_id, "yes").await.unwrap();
        let err = engine.vote(&bob.id, &poll_id, "no").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn voting_unknown_option_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());
        let poll_id = author_a_poll(&engine, &alice.id).await;

        let err = engine.vote(&bob.id, &poll_id, "maybe").await.unwrap_err();
        assert!(matches!(err, AppError::BadInput(_)));
    }

    #[tokio::test]
    async fn voting_on_a_closed_poll_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());

        let content = PostContent {
            text: "already closed".to_string(),
            attachments: vec![],
            poll: Some(PollSpec {
                options: vec!["yes".to_string(), "no".to_string()],
                multiple: false,
                closes_at: Utc::now() - chrono::Duration::hours(1),
            }),
        };
        let poll_id = engine.post(&alice.id, content, PostVisibility::Public, None).await.unwrap();

        let err = engine.vote(&bob.id, &poll_id, "yes").await.unwrap_err();
        assert!(matches!(err, AppError::BadInput(_)));
    }

    #[tokio::test]
    async fn voting_on_a_non_poll_object_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let engine = test_engine(db.clone());

        let content = PostContent { text: "just a note".to_string(), attachments: vec![], poll: None };
        let object_id = engine.post(&alice.id, content, PostVisibility::Public, None).await.unwrap();

        let err = engine.vote(&bob.id, &object_id, "yes").await.unwrap_err();
        assert!(matches!(err, AppError::BadInput(_)));
    }
}
