//! The Activity Engine: the single place that turns a user or federation
//! intent ("post this", "apply this inbound activity") into database writes
//! plus delivery-queue enqueues, inside one transaction (spec §4.1, §8).

pub mod apply;
pub mod follow;
pub mod mentions;
pub mod post;
pub mod social;
pub mod types;
pub mod visibility;
pub mod vote;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tootik_common::{AppError, AppResult, Config, IdGenerator, TextFormatter};
use tootik_db::entities::actor;
use tootik_db::repositories::ActorRepository;

/// Shared state every engine operation needs: the store connection, loaded
/// configuration, id generator and the text-formatting boundary (spec §1,
/// §A.2-A.4).
pub struct Engine {
    pub(crate) db: DatabaseConnection,
    pub(crate) config: Arc<Config>,
    pub(crate) formatter: Arc<dyn TextFormatter>,
    pub(crate) ids: IdGenerator,
}

impl Engine {
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Arc<Config>, formatter: Arc<dyn TextFormatter>) -> Self {
        Self { db, config, formatter, ids: IdGenerator::new() }
    }

    /// This instance's domain, as configured (spec §3: every local id is
    /// built from it).
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.config.server.domain
    }

    /// The canonical id a local actor document lives at.
    #[must_use]
    pub fn actor_id(&self, username: &str) -> String {
        format!("https://{}/user/{}", self.domain(), username)
    }

    /// The canonical id a freshly-minted local object lives at.
    pub(crate) fn new_object_id(&self) -> String {
        format!("https://{}/object/{}", self.domain(), self.ids.generate())
    }

    /// The canonical id a freshly-minted local activity lives at.
    pub(crate) fn new_activity_id(&self) -> String {
        format!("https://{}/activity/{}", self.domain(), self.ids.generate())
    }

    /// The followers collection id for a local actor.
    #[must_use]
    pub fn followers_url(&self, actor_id: &str) -> String {
        format!("{actor_id}/followers")
    }

    /// Resolve an actor row, local or cached-remote, or `NotFound`.
    pub(crate) async fn require_actor(&self, id: &str) -> AppResult<actor::Model> {
        ActorRepository
            .find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("actor {id}")))
    }
}

/// Shared helpers the per-operation test modules (`apply`, `follow`, `post`,
/// `social`, `vote`) build an [`Engine`] and seed actors with, so each test
/// file doesn't repeat the same boilerplate [`tootik_common::Config`].
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
    use tootik_common::config::{Config, FederationConfig, LimitsConfig, ServerConfig, StoreConfig};
    use tootik_common::BasicTextFormatter;
    use tootik_db::entities::actor;

    use super::Engine;

    /// A [`Config`] with every throttle interval set to zero, so tests can
    /// call an operation twice in a row without tripping the throttle.
    pub(crate) fn test_config() -> Arc<Config> {
        Arc::new(Config {
            server: ServerConfig {
                http_listen: "0.0.0.0:8443".to_string(),
                line_listen: "0.0.0.0:1965".to_string(),
                domain: "example.test".to_string(),
                display_name: "test instance".to_string(),
                tls_cert_path: "cert.pem".to_string(),
                tls_key_path: "key.pem".to_string(),
            },
            store: StoreConfig { path: "sqlite::memory:".to_string(), max_connections: 1 },
            limits: LimitsConfig {
                post_throttle_interval: Duration::ZERO,
                edit_throttle_interval: Duration::ZERO,
                boost_interval: Duration::ZERO,
                follow_throttle_interval: Duration::ZERO,
                alias_throttle_interval: Duration::ZERO,
                move_throttle_interval: Duration::ZERO,
                min_bookmark_interval: Duration::ZERO,
                ..LimitsConfig::default()
            },
            federation: FederationConfig::default(),
        })
    }

    pub(crate) fn test_engine(db: sea_orm::DatabaseConnection) -> Engine {
        Engine::new(db, test_config(), Arc::new(BasicTextFormatter))
    }

    /// Insert a minimal local actor row for `username` at `test_config()`'s
    /// domain, with a freshly generated RSA keypair.
    pub(crate) async fn seed_local_actor<C: ConnectionTrait>(db: &C, username: &str) -> actor::Model {
        let keypair = tootik_common::crypto::generate_keypair(tootik_common::crypto::KeyAlgorithm::Rsa).unwrap();
        let id = format!("https://example.test/user/{username}");
        let now = Utc::now();
        actor::ActiveModel {
            id: Set(id.clone()),
            local: Set(true),
            preferred_username: Set(username.to_string()),
            domain: Set("example.test".to_string()),
            actor_type: Set("Person".to_string()),
            inbox_url: Set(format!("{id}/inbox")),
            shared_inbox_url: Set(Some("https://example.test/inbox".to_string())),
            public_key_pem: Set(keypair.public_key_pem),
            private_key_pem: Set(Some(keypair.private_key_pem)),
            key_algorithm: Set("rsa".to_string()),
            gone: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    /// Insert a minimal remote actor row, as if already resolved and cached.
    pub(crate) async fn seed_remote_actor<C: ConnectionTrait>(db: &C, id: &str, inbox_url: &str) -> actor::Model {
        let keypair = tootik_common::crypto::generate_keypair(tootik_common::crypto::KeyAlgorithm::Rsa).unwrap();
        let now = Utc::now();
        actor::ActiveModel {
            id: Set(id.to_string()),
            local: Set(false),
            preferred_username: Set(id.rsplit('/').next().unwrap_or("remote").to_string()),
            domain: Set("remote.test".to_string()),
            actor_type: Set("Person".to_string()),
            inbox_url: Set(inbox_url.to_string()),
            public_key_pem: Set(keypair.public_key_pem),
            key_algorithm: Set("rsa".to_string()),
            gone: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }
}
