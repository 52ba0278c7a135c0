//! Application configuration.
//!
//! Loaded once at startup by layering `config/default.toml`, an
//! environment-specific file, then `TOOTIK_`-prefixed environment variables.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration (listen addresses, instance identity).
    pub server: ServerConfig,
    /// Embedded store configuration.
    pub store: StoreConfig,
    /// Throttle and limit configuration (spec §6).
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Federation delivery and registration configuration.
    #[serde(default)]
    pub federation: FederationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the ActivityPub HTTP surface binds to.
    #[serde(default = "default_http_addr")]
    pub http_listen: String,
    /// Address the TLS line-protocol listener binds to.
    #[serde(default = "default_line_addr")]
    pub line_listen: String,
    /// This instance's domain, used to build every local actor/object id.
    pub domain: String,
    /// Human-readable instance display name.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Path to the TLS certificate chain (PEM) for the line-protocol listener.
    pub tls_cert_path: String,
    /// Path to the TLS private key (PEM) for the line-protocol listener.
    pub tls_key_path: String,
}

/// Embedded relational store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the `SQLite` database file (or `sqlite::memory:` for tests).
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Limits, throttles and pagination bounds spec §6 names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum length, in characters, of a post body.
    pub max_post_length: usize,
    /// Minimum interval between posts from one actor.
    #[serde(with = "duration_secs")]
    pub post_throttle_interval: Duration,
    /// Minimum interval between edits of one actor's own posts.
    #[serde(with = "duration_secs")]
    pub edit_throttle_interval: Duration,
    /// Minimum interval between edits by one actor, across all of their
    /// posts, in addition to `edit_throttle_interval`'s per-post quiet period.
    #[serde(with = "duration_secs")]
    pub min_actor_edit_interval: Duration,
    /// Minimum interval between bookmark operations.
    #[serde(with = "duration_secs")]
    pub min_bookmark_interval: Duration,
    /// Maximum bookmarks a single actor may hold.
    pub max_bookmarks_per_user: usize,
    /// Minimum interval between boosts (Announce) of one actor.
    #[serde(with = "duration_secs")]
    pub boost_interval: Duration,
    /// Minimum interval between follow operations.
    #[serde(with = "duration_secs")]
    pub follow_throttle_interval: Duration,
    /// Minimum interval between alias changes.
    #[serde(with = "duration_secs")]
    pub alias_throttle_interval: Duration,
    /// Minimum interval between Move operations.
    #[serde(with = "duration_secs")]
    pub move_throttle_interval: Duration,
    /// Minimum interval between display-name changes.
    #[serde(with = "duration_secs")]
    pub name_throttle_interval: Duration,
    /// Minimum interval between avatar uploads.
    #[serde(with = "duration_secs")]
    pub avatar_throttle_interval: Duration,
    /// Maximum uploaded avatar size, in bytes.
    pub max_avatar_size: u64,
    /// Maximum offset accepted by paginated feed endpoints.
    pub max_offset: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_post_length: 5000,
            post_throttle_interval: Duration::from_secs(10),
            edit_throttle_interval: Duration::from_secs(10),
            min_actor_edit_interval: Duration::from_secs(300),
            min_bookmark_interval: Duration::from_secs(1),
            max_bookmarks_per_user: 10_000,
            boost_interval: Duration::from_secs(5),
            follow_throttle_interval: Duration::from_secs(2),
            alias_throttle_interval: Duration::from_secs(3600),
            move_throttle_interval: Duration::from_secs(86_400 * 7),
            name_throttle_interval: Duration::from_secs(3600),
            avatar_throttle_interval: Duration::from_secs(3600),
            max_avatar_size: 2 * 1024 * 1024,
            max_offset: 10_000,
        }
    }
}

/// Federation delivery, registration and retry configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Base interval between delivery retry attempts (before backoff).
    #[serde(with = "duration_secs")]
    pub delivery_retry_interval: Duration,
    /// Maximum delivery attempts before an item is marked terminal.
    pub delivery_max_attempts: u32,
    /// Maximum concurrent in-flight deliveries per destination host.
    pub per_host_delivery_concurrency: usize,
    /// Interval at which the feed materializer loop runs.
    #[serde(with = "duration_secs")]
    pub feed_update_interval: Duration,
    /// Interval at which the poll tallier loop runs.
    #[serde(with = "duration_secs")]
    pub poll_tally_interval: Duration,
    /// Interval at which the actor refresher loop runs.
    #[serde(with = "duration_secs")]
    pub actor_refresh_interval: Duration,
    /// Whether new registrations require a standing invitation.
    pub require_invitation: bool,
    /// Regex new actor names are rejected against.
    pub forbidden_user_name_regex: String,
    /// Maximum registrations accepted from one client certificate per hour.
    pub max_registrations_per_cert_per_hour: u32,
    /// Minimum interval between registration attempts from one certificate.
    #[serde(with = "duration_secs")]
    pub registration_interval: Duration,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            delivery_retry_interval: Duration::from_secs(30),
            delivery_max_attempts: 16,
            per_host_delivery_concurrency: 4,
            feed_update_interval: Duration::from_secs(30),
            poll_tally_interval: Duration::from_secs(60),
            actor_refresh_interval: Duration::from_secs(86_400),
            require_invitation: false,
            forbidden_user_name_regex: String::new(),
            max_registrations_per_cert_per_hour: 2,
            registration_interval: Duration::from_secs(1800),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8443".to_string()
}

fn default_line_addr() -> String {
    "0.0.0.0:1965".to_string()
}

fn default_display_name() -> String {
    "tootik".to_string()
}

const fn default_max_connections() -> u32 {
    16
}

impl Config {
    /// Load configuration by layering `config/default`, `config/{env}` and
    /// `TOOTIK_`-prefixed environment variables, in that order.
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("TOOTIK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("TOOTIK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file, still layering environment
    /// variables on top. Used by tests and single-file deployments.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TOOTIK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_are_positive() {
        let limits = LimitsConfig::default();
        assert!(limits.max_post_length > 0);
        assert!(limits.max_offset > 0);
    }
}
