//! Remote actor resolution: look the actor up locally first, fall through
//! to a live fetch (direct or via `WebFinger`) on a cache miss or when the
//! cached copy is stale, and follow a completed `Move` chain to its current
//! identity (spec §3, §4.1 `Move`, §4.2).

use std::time::Duration;

use sea_orm::{ConnectionTrait, Set};
use serde_json::Value;
use tootik_common::{AppError, AppResult};
use tootik_db::entities::actor;
use tootik_db::repositories::ActorRepository;
use tracing::{debug, warn};

use crate::cache::{CachedRemoteActor, RemoteActorCache};
use crate::client::ApClient;

/// How long a cached remote actor document is trusted before the resolver
/// will refetch it on next use (separate from the periodic background
/// refresher in spec §5, which runs regardless of use).
const RESOLVE_STALE_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// `Move` chains are followed at most this many hops before giving up, so a
/// misconfigured or cyclic chain of `movedTo` pointers can't loop forever
/// (spec §4.1 Move).
const MAX_MOVE_DEPTH: u8 = 10;

/// Resolves actor ids to rows, combining the local cache table, the
/// in-process [`RemoteActorCache`], and live fetches through [`ApClient`].
#[derive(Clone)]
pub struct ActorResolver {
    client: ApClient,
    cache: RemoteActorCache,
}

impl ActorResolver {
    #[must_use]
    pub fn new(client: ApClient, cache: RemoteActorCache) -> Self {
        Self { client, cache }
    }

    /// Resolve an actor id to a row, fetching and upserting it if it is
    /// unknown or stale. Local actors are always returned as-is.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] if the actor cannot be fetched, or a
    /// transient/terminal HTTP error from the underlying fetch.
    pub async fn resolve_actor<C: ConnectionTrait>(&self, db: &C, actor_id: &str) -> AppResult<actor::Model> {
        if let Some(existing) = ActorRepository.find_by_id(db, actor_id).await? {
            if existing.local || !is_stale(&existing) {
                return Ok(existing);
            }
        }
        self.fetch_and_upsert(db, actor_id).await
    }

    /// Resolve an actor id, then follow any completed `Move` chain to the
    /// actor's current identity, up to [`MAX_MOVE_DEPTH`] hops.
    ///
    /// # Errors
    /// Same as [`Self::resolve_actor`].
    pub async fn resolve_actor_following_moves<C: ConnectionTrait>(&self, db: &C, actor_id: &str) -> AppResult<actor::Model> {
        let mut current = self.resolve_actor(db, actor_id).await?;
        let mut hops = 0;
        while let Some(moved_to) = current.moved_to.clone() {
            hops += 1;
            if hops > MAX_MOVE_DEPTH {
                warn!(actor_id, "movedTo chain exceeded max depth, stopping");
                break;
            }
            current = self.resolve_actor(db, &moved_to).await?;
        }
        Ok(current)
    }

    /// Resolve a bare `user@host` handle via `WebFinger`, then resolve the
    /// `self` link it points at (spec §4.2, §4.5 `/users/resolve`).
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when `WebFinger` has no usable `self`
    /// link, or any error [`Self::resolve_actor`] can return.
    pub async fn resolve_handle<C: ConnectionTrait>(&self, db: &C, user: &str, host: &str) -> AppResult<actor::Model> {
        let document = self.client.webfinger(user, host).await?;
        let self_link = document
            .get("links")
            .and_then(|l| l.as_array())
            .into_iter()
            .flatten()
            .find(|link| {
                link.get("rel").and_then(Value::as_str) == Some("self")
                    && link
                        .get("type")
                        .and_then(Value::as_str)
                        .is_none_or(|t| t.contains("activity+json"))
            })
            .and_then(|link| link.get("href"))
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::NotFound(format!("webfinger self link for {user}@{host}")))?;

        self.resolve_actor(db, self_link).await
    }

    /// Force a live refetch of an actor, bypassing both caches. Used by the
    /// periodic actor-refresher loop (spec §5).
    ///
    /// # Errors
    /// Returns an error if the fetch fails; on a 404/410 the caller is
    /// expected to mark the actor gone via `ActorRepository::mark_gone`.
    pub async fn refetch<C: ConnectionTrait>(&self, db: &C, actor_id: &str) -> AppResult<actor::Model> {
        self.cache.invalidate(actor_id).await;
        self.fetch_and_upsert(db, actor_id).await
    }

    async fn fetch_and_upsert<C: ConnectionTrait>(&self, db: &C, actor_id: &str) -> AppResult<actor::Model> {
        if self.cache.is_failed_lookup(actor_id).await {
            return Err(AppError::NotFound(format!("actor {actor_id} (negative cache)")));
        }

        let document = match self.client.fetch_actor(actor_id).await {
            Ok(doc) => doc,
            Err(err) => {
                if matches!(err, AppError::NotFound(_)) {
                    self.cache.set_failed(actor_id).await;
                }
                return Err(err);
            }
        };

        let host = url::Url::parse(actor_id).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();
        let cached = CachedRemoteActor::from_json(&document, &host)
            .ok_or_else(|| AppError::SchemaInvalid(format!("malformed actor document at {actor_id}")))?;
        self.cache.set(cached.clone()).await;

        let existing = ActorRepository.find_by_id(db, actor_id).await?;
        let model = build_active_model(&cached, existing.as_ref());

        let saved = if existing.is_some() {
            ActorRepository.upsert_remote(db, model).await?
        } else {
            ActorRepository.insert(db, model).await?
        };
        debug!(actor_id, "resolved and cached remote actor");
        Ok(saved)
    }
}

fn is_stale(actor: &actor::Model) -> bool {
    actor.last_refreshed_at.is_none_or(|refreshed| {
        chrono::Utc::now().signed_duration_since(refreshed) > chrono::Duration::from_std(RESOLVE_STALE_AFTER).unwrap_or_default()
    })
}

fn build_active_model(cached: &CachedRemoteActor, existing: Option<&actor::Model>) -> actor::ActiveModel {
    let now = chrono::Utc::now();
    actor::ActiveModel {
        id: Set(cached.id.clone()),
        local: Set(false),
        preferred_username: Set(cached.preferred_username.clone()),
        domain: Set(cached.host.clone()),
        actor_type: Set(cached.actor_type.clone()),
        display_name: Set(cached.name.clone()),
        summary: Set(cached.summary.clone()),
        avatar_url: Set(cached.icon.clone()),
        inbox_url: Set(cached.inbox.clone()),
        shared_inbox_url: Set(cached.shared_inbox.clone()),
        outbox_url: Set(cached.outbox.clone()),
        followers_url: Set(cached.followers.clone()),
        public_key_pem: Set(cached.public_key_pem.clone()),
        private_key_pem: Set(None),
        key_algorithm: Set(match cached.key_algorithm {
            tootik_common::crypto::KeyAlgorithm::Rsa => "rsa".to_string(),
            tootik_common::crypto::KeyAlgorithm::Ed25519 => "ed25519".to_string(),
        }),
        moved_to: Set(existing.and_then(|e| e.moved_to.clone())),
        also_known_as: Set(existing.and_then(|e| e.also_known_as.clone())),
        gone: Set(false),
        first_cert_fingerprint: Set(None),
        created_at: Set(existing.map_or(now, |e| e.created_at)),
        updated_at: Set(now),
        last_refreshed_at: Set(Some(now)),
        last_post_at: Set(None),
        last_edit_at: Set(None),
        last_boost_at: Set(None),
        last_bookmark_at: Set(None),
        last_follow_at: Set(None),
        last_alias_at: Set(None),
        last_move_at: Set(None),
        last_name_at: Set(None),
        last_avatar_at: Set(None),
    }
}

#[cfg(test)]
mod tests {
    use tootik_common::crypto::KeyAlgorithm;

    use super::*;

    fn cached(id: &str) -> CachedRemoteActor {
        CachedRemoteActor {
            id: id.to_string(),
            actor_type: "Person".to_string(),
            preferred_username: "carol".to_string(),
            name: Some("Carol".to_string()),
            summary: None,
            inbox: format!("{id}/inbox"),
            shared_inbox: None,
            outbox: None,
            followers: None,
            following: None,
            public_key_id: format!("{id}#main-key"),
            public_key_pem: "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----".to_string(),
            key_algorithm: KeyAlgorithm::Rsa,
            icon: None,
            image: None,
            host: "remote.test".to_string(),
            cached_at: chrono::Utc::now(),
        }
    }

    fn bare_actor(id: &str) -> actor::Model {
        actor::Model {
            id: id.to_string(),
            local: false,
            preferred_username: "carol".to_string(),
            domain: "remote.test".to_string(),
            actor_type: "Person".to_string(),
            display_name: None,
            summary: None,
            avatar_url: None,
            inbox_url: format!("{id}/inbox"),
            shared_inbox_url: None,
            outbox_url: None,
            followers_url: None,
            public_key_pem: "pem".to_string(),
            private_key_pem: None,
            key_algorithm: "rsa".to_string(),
            moved_to: None,
            also_known_as: None,
            gone: false,
            first_cert_fingerprint: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            last_refreshed_at: None,
            last_post_at: None,
            last_edit_at: None,
            last_boost_at: None,
            last_bookmark_at: None,
            last_follow_at: None,
            last_alias_at: None,
            last_move_at: None,
            last_name_at: None,
            last_avatar_at: None,
        }
    }

    #[test]
    fn never_refreshed_actor_is_stale() {
        assert!(is_stale(&bare_actor("https://remote.test/user/carol")));
    }

    #[test]
    fn recently_refreshed_actor_is_not_stale() {
        let mut actor = bare_actor("https://remote.test/user/carol");
        actor.last_refreshed_at = Some(chrono::Utc::now());
        assert!(!is_stale(&actor));
    }

    #[test]
    fn refreshed_past_the_window_is_stale() {
        let mut actor = bare_actor("https://remote.test/user/carol");
        actor.last_refreshed_at = Some(chrono::Utc::now() - chrono::Duration::hours(7));
        assert!(is_stale(&actor));
    }

    #[test]
    fn build_active_model_preserves_existing_moved_to_and_created_at() {
        let existing = {
            let mut a = bare_actor("https://remote.test/user/carol");
            a.moved_to = Some("https://remote.test/user/carol2".to_string());
            a.also_known_as = Some("[\"https://old.test/user/carol\"]".to_string());
            a
        };
        let model = build_active_model(&cached("https://remote.test/user/carol"), Some(&existing));
        assert_eq!(model.moved_to.unwrap(), Some("https://remote.test/user/carol2".to_string()));
        assert_eq!(model.also_known_as.unwrap(), existing.also_known_as);
        assert_eq!(model.created_at.unwrap(), existing.created_at);
        assert!(!model.local.unwrap());
    }

    #[test]
    fn build_active_model_for_new_actor_has_no_prior_identity() {
        let model = build_active_model(&cached("https://remote.test/user/dave"), None);
        assert_eq!(model.moved_to.unwrap(), None);
        assert_eq!(model.also_known_as.unwrap(), None);
        assert_eq!(model.private_key_pem.unwrap(), None);
    }
}
