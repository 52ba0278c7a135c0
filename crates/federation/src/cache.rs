//! In-process remote actor resolution cache (spec §4.2, §B design decision:
//! a single-process embedded server has no need for a shared external cache,
//! so resolved actors and negative lookups live in `moka::future` instead of
//! Redis).

use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tootik_common::crypto::KeyAlgorithm;
use tracing::{debug, info, warn};

/// Default cache TTL: 24 hours
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Short cache TTL for failed lookups: 5 minutes
const FAILED_LOOKUP_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximum number of resolved actors/failed lookups held in memory at once.
const MAX_CAPACITY: u64 = 10_000;

/// Cached remote actor data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRemoteActor {
    /// Actor's `ActivityPub` ID (URL)
    pub id: String,
    /// Actor type (Person, Service, etc.)
    pub actor_type: String,
    /// Preferred username
    pub preferred_username: String,
    /// Display name
    pub name: Option<String>,
    /// Actor summary/bio
    pub summary: Option<String>,
    /// Inbox URL
    pub inbox: String,
    /// Shared inbox URL (optional)
    pub shared_inbox: Option<String>,
    /// Outbox URL (optional)
    pub outbox: Option<String>,
    /// Followers collection URL (optional)
    pub followers: Option<String>,
    /// Following collection URL (optional)
    pub following: Option<String>,
    /// Public key ID
    pub public_key_id: String,
    /// Public key PEM
    pub public_key_pem: String,
    /// Key algorithm, inferred from the PEM (the wire document carries no
    /// explicit field for this; RSA and Ed25519 `SubjectPublicKeyInfo` PEMs
    /// decode distinctly, so trying RSA first is sufficient, spec §4.2).
    pub key_algorithm: KeyAlgorithm,
    /// Avatar icon URL (optional)
    pub icon: Option<String>,
    /// Header/banner image URL (optional)
    pub image: Option<String>,
    /// Host domain
    pub host: String,
    /// When this cache entry was created
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

impl CachedRemoteActor {
    /// Create a cached actor from raw `ActivityPub` JSON.
    pub fn from_json(json: &serde_json::Value, host: &str) -> Option<Self> {
        let id = json.get("id")?.as_str()?.to_string();
        let actor_type = json.get("type")?.as_str()?.to_string();
        let preferred_username = json.get("preferredUsername")?.as_str()?.to_string();
        let name = json.get("name").and_then(|v| v.as_str()).map(String::from);
        let summary = json
            .get("summary")
            .and_then(|v| v.as_str())
            .map(String::from);
        let inbox = json.get("inbox")?.as_str()?.to_string();

        // Handle endpoints object for shared inbox
        let shared_inbox = json
            .get("endpoints")
            .and_then(|e| e.get("sharedInbox"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| {
                json.get("sharedInbox")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            });

        let outbox = json
            .get("outbox")
            .and_then(|v| v.as_str())
            .map(String::from);
        let followers = json
            .get("followers")
            .and_then(|v| v.as_str())
            .map(String::from);
        let following = json
            .get("following")
            .and_then(|v| v.as_str())
            .map(String::from);

        // Public key
        let public_key = json.get("publicKey")?;
        let public_key_id = public_key.get("id")?.as_str()?.to_string();
        let public_key_pem = public_key.get("publicKeyPem")?.as_str()?.to_string();
        let key_algorithm = infer_key_algorithm(&public_key_pem)?;

        // Icon (avatar)
        let icon = json
            .get("icon")
            .and_then(|i| {
                if i.is_object() {
                    i.get("url").and_then(|v| v.as_str())
                } else {
                    i.as_str()
                }
            })
            .map(String::from);

        // Image (header/banner)
        let image = json
            .get("image")
            .and_then(|i| {
                if i.is_object() {
                    i.get("url").and_then(|v| v.as_str())
                } else {
                    i.as_str()
                }
            })
            .map(String::from);

        Some(Self {
            id,
            actor_type,
            preferred_username,
            name,
            summary,
            inbox,
            shared_inbox,
            outbox,
            followers,
            following,
            public_key_id,
            public_key_pem,
            key_algorithm,
            icon,
            image,
            host: host.to_string(),
            cached_at: chrono::Utc::now(),
        })
    }
}

/// Infer whether a `SubjectPublicKeyInfo` PEM holds an RSA or Ed25519 key by
/// attempting to parse it as each in turn.
fn infer_key_algorithm(public_key_pem: &str) -> Option<KeyAlgorithm> {
    if tootik_common::crypto::parse_public_key(public_key_pem).is_ok() {
        Some(KeyAlgorithm::Rsa)
    } else if tootik_common::crypto::parse_ed25519_public_key(public_key_pem).is_ok() {
        Some(KeyAlgorithm::Ed25519)
    } else {
        None
    }
}

/// In-process cache of resolved remote actors, plus a short-lived negative
/// cache for lookups that failed, so a host that's down doesn't get
/// re-resolved on every inbound activity from it.
#[derive(Clone)]
pub struct RemoteActorCache {
    actors: Cache<String, CachedRemoteActor>,
    failed: Cache<String, ()>,
}

impl RemoteActorCache {
    /// Create a new remote actor cache with the default TTLs (spec §B).
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    /// Create a new remote actor cache with a custom positive-lookup TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            actors: Cache::builder().max_capacity(MAX_CAPACITY).time_to_live(ttl).build(),
            failed: Cache::builder().max_capacity(MAX_CAPACITY).time_to_live(FAILED_LOOKUP_TTL).build(),
        }
    }

    /// Get a cached actor by URL.
    pub async fn get(&self, actor_url: &str) -> Option<CachedRemoteActor> {
        let hit = self.actors.get(actor_url).await;
        if hit.is_some() {
            debug!(actor_url, "cache hit for remote actor");
        } else {
            debug!(actor_url, "cache miss for remote actor");
        }
        hit
    }

    /// Check if a lookup previously failed (negative cache).
    pub async fn is_failed_lookup(&self, actor_url: &str) -> bool {
        self.failed.get(actor_url).await.is_some()
    }

    /// Store a resolved actor.
    pub async fn set(&self, actor: CachedRemoteActor) {
        info!(actor_url = %actor.id, host = %actor.host, "cached remote actor");
        self.actors.insert(actor.id.clone(), actor).await;
    }

    /// Mark a lookup as failed (negative cache).
    pub async fn set_failed(&self, actor_url: &str) {
        warn!(actor_url, "marked actor lookup as failed");
        self.failed.insert(actor_url.to_string(), ()).await;
    }

    /// Invalidate a cached actor (e.g., on receipt of an Update).
    pub async fn invalidate(&self, actor_url: &str) {
        info!(actor_url, "invalidated cached remote actor");
        self.actors.invalidate(actor_url).await;
    }

    /// Clear the failed-lookup mark for an actor.
    pub async fn clear_failed(&self, actor_url: &str) {
        self.failed.invalidate(actor_url).await;
    }

    /// Approximate cache occupancy, for diagnostics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_actors: self.actors.entry_count() as usize,
            failed_lookups: self.failed.entry_count() as usize,
        }
    }
}

impl Default for RemoteActorCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cached actors
    pub cached_actors: usize,
    /// Number of failed lookups in negative cache
    pub failed_lookups: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tootik_common::crypto::generate_keypair;

    fn sample_pem() -> String {
        generate_keypair(KeyAlgorithm::Rsa).unwrap().public_key_pem
    }

    #[test]
    fn test_cached_remote_actor_from_json() {
        let pem = sample_pem();
        let json = json!({
            "id": "https://example.com/users/test",
            "type": "Person",
            "preferredUsername": "test",
            "name": "Test User",
            "summary": "A test user",
            "inbox": "https://example.com/users/test/inbox",
            "outbox": "https://example.com/users/test/outbox",
            "followers": "https://example.com/users/test/followers",
            "following": "https://example.com/users/test/following",
            "endpoints": {
                "sharedInbox": "https://example.com/inbox"
            },
            "publicKey": {
                "id": "https://example.com/users/test#main-key",
                "publicKeyPem": pem
            },
            "icon": {
                "type": "Image",
                "url": "https://example.com/avatars/test.png"
            }
        });

        let actor = CachedRemoteActor::from_json(&json, "example.com").unwrap();

        assert_eq!(actor.id, "https://example.com/users/test");
        assert_eq!(actor.actor_type, "Person");
        assert_eq!(actor.preferred_username, "test");
        assert_eq!(actor.name, Some("Test User".to_string()));
        assert_eq!(actor.inbox, "https://example.com/users/test/inbox");
        assert_eq!(
            actor.shared_inbox,
            Some("https://example.com/inbox".to_string())
        );
        assert_eq!(actor.host, "example.com");
        assert_eq!(actor.key_algorithm, KeyAlgorithm::Rsa);
        assert_eq!(
            actor.icon,
            Some("https://example.com/avatars/test.png".to_string())
        );
    }

    #[test]
    fn test_cached_remote_actor_from_json_minimal() {
        let pem = sample_pem();
        let json = json!({
            "id": "https://example.com/users/minimal",
            "type": "Person",
            "preferredUsername": "minimal",
            "inbox": "https://example.com/users/minimal/inbox",
            "publicKey": {
                "id": "https://example.com/users/minimal#main-key",
                "publicKeyPem": pem
            }
        });

        let actor = CachedRemoteActor::from_json(&json, "example.com").unwrap();

        assert_eq!(actor.id, "https://example.com/users/minimal");
        assert!(actor.name.is_none());
        assert!(actor.shared_inbox.is_none());
    }

    #[test]
    fn rejects_unparseable_public_key() {
        let json = json!({
            "id": "https://example.com/users/bad",
            "type": "Person",
            "preferredUsername": "bad",
            "inbox": "https://example.com/users/bad/inbox",
            "publicKey": {
                "id": "https://example.com/users/bad#main-key",
                "publicKeyPem": "-----BEGIN PUBLIC KEY-----\nMIIB...\n-----END PUBLIC KEY-----"
            }
        });
        assert!(CachedRemoteActor::from_json(&json, "example.com").is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = RemoteActorCache::new();
        let pem = sample_pem();
        let actor = CachedRemoteActor::from_json(
            &json!({
                "id": "https://example.com/users/test",
                "type": "Person",
                "preferredUsername": "test",
                "inbox": "https://example.com/users/test/inbox",
                "publicKey": {
                    "id": "https://example.com/users/test#main-key",
                    "publicKeyPem": pem
                }
            }),
            "example.com",
        )
        .unwrap();

        assert!(cache.get(&actor.id).await.is_none());
        cache.set(actor.clone()).await;
        assert_eq!(cache.get(&actor.id).await.unwrap().id, actor.id);
    }

    #[tokio::test]
    async fn failed_lookup_round_trips() {
        let cache = RemoteActorCache::new();
        let url = "https://gone.example/users/ghost";
        assert!(!cache.is_failed_lookup(url).await);
        cache.set_failed(url).await;
        assert!(cache.is_failed_lookup(url).await);
        cache.clear_failed(url).await;
        assert!(!cache.is_failed_lookup(url).await);
    }
}
