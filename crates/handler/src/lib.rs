//! `tootik-handler`: the authenticated line-protocol request handler
//! (spec §4.5, §6). Ties certificate-based identity (`session`), the
//! Gemini/Titan request line parser (`request`), per-endpoint dispatch
//! (`routes`) and the response serializer (`response`) together behind one
//! per-connection entry point, [`handle_connection`], that the TLS listener
//! `tootik-server` runs drives one task per accepted connection (spec §5:
//! "a TLS listener accepting one request per connection, each handled on
//! its own task until the response is flushed and the connection closed").

pub mod render;
pub mod request;
pub mod response;
pub mod routes;
pub mod session;
pub mod tls;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tootik_common::{AppError, AppResult, AvatarProcessor, Config, LocalStorage};
use tootik_core::engine::Engine;
use tootik_federation::ActorResolver;
use tracing::debug;

use request::{parse_request_line, Scheme};
use response::Response;

/// Shared state every connection reads from (spec §4.5): the store
/// connection, loaded configuration, the Activity Engine, the federation
/// actor resolver (for `/users/resolve`, `/users/alias`, `/users/move`),
/// and the avatar re-encode/storage boundary the Titan upload route uses.
pub struct HandlerState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub engine: Arc<Engine>,
    pub resolver: ActorResolver,
    pub avatar: Arc<dyn AvatarProcessor>,
    pub storage: Arc<LocalStorage>,
}

/// A request is one line (spec §4.5); this bounds how many bytes are
/// buffered before giving up on ever seeing `\n`.
const MAX_LINE_BYTES: usize = 2048;

/// Upper bound on a Titan upload body read from the wire, independent of
/// the configured `max_avatar_size` (spec §6), purely so an unauthenticated
/// peer can't make the handler buffer an unbounded amount of memory before
/// any limit or throttle check runs.
const MAX_TITAN_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Handle one already-accepted TLS connection end to end: read the peer
/// certificate the handshake captured (if any), read the single request
/// line (plus a Titan body, when the scheme calls for one), authenticate,
/// dispatch, and write back exactly one response line (spec §4.5, §6)
/// before the caller tears the connection down.
pub async fn handle_connection(mut stream: TlsStream<TcpStream>, state: Arc<HandlerState>) {
    let cert_der = peer_certificate_der(&stream);

    let response = match read_request_line(&mut stream).await {
        Ok(line) => process_line(&mut stream, &state, cert_der.as_deref(), &line).await,
        Err(err) => err.into(),
    };

    let bytes = response.into_bytes();
    if let Err(err) = stream.write_all(&bytes).await {
        debug!(%err, "failed to write line-protocol response");
    }
    let _ = stream.shutdown().await;
}

/// The DER bytes of the first certificate the peer presented during the
/// handshake, if any (spec §6: "requests, but does not require, a client
/// certificate").
fn peer_certificate_der(stream: &TlsStream<TcpStream>) -> Option<Vec<u8>> {
    let (_, session) = stream.get_ref();
    session.peer_certificates().and_then(|certs| certs.first()).map(|c| c.as_ref().to_vec())
}

async fn read_request_line(stream: &mut TlsStream<TcpStream>) -> AppResult<String> {
    let mut buf = Vec::with_capacity(256);
    let mut byte = [0_u8; 1];
    loop {
        if buf.len() > MAX_LINE_BYTES {
            return Err(AppError::BadInput("request line too long".to_string()));
        }
        let n = stream
            .read(&mut byte)
            .await
            .map_err(|e| AppError::BadInput(format!("connection error reading request line: {e}")))?;
        if n == 0 {
            return Err(AppError::BadInput("connection closed before a request line was sent".to_string()));
        }
        if byte[0] == b'\n' {
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).map_err(|_| AppError::BadInput("request line is not valid UTF-8".to_string()))
}

async fn process_line(stream: &mut TlsStream<TcpStream>, state: &HandlerState, cert_der: Option<&[u8]>, line: &str) -> Response {
    let req = match parse_request_line(line) {
        Ok(req) => req,
        Err(err) => return err.into(),
    };

    let body = match read_titan_body(stream, &req).await {
        Ok(body) => body,
        Err(err) => return err.into(),
    };

    let identity = match session::authenticate(&state.db, cert_der).await {
        Ok(identity) => identity,
        Err(err) => return err.into(),
    };

    routes::dispatch(state, &identity, &req, body.as_deref()).await
}

/// Read the Titan body named by `req.titan.size`, when the request line was
/// a `titan://` upload (spec §6 "accepts `;mime=<t>;size=<n>` parameters
/// ... and `<size>` bytes of body"). A non-Titan request never reads one.
async fn read_titan_body(stream: &mut TlsStream<TcpStream>, req: &request::Request) -> AppResult<Option<Vec<u8>>> {
    if req.scheme != Scheme::Titan {
        return Ok(None);
    }
    let Some(titan) = &req.titan else { return Ok(None) };
    if titan.size > MAX_TITAN_BODY_BYTES {
        return Err(AppError::BadInput("titan upload exceeds the maximum accepted body size".to_string()));
    }
    let mut buf = vec![0_u8; titan.size as usize];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| AppError::BadInput(format!("failed to read titan upload body: {e}")))?;
    Ok(Some(buf))
}

/// Shared helpers the per-route test modules build a [`HandlerState`] and
/// seed actors with, mirroring `tootik-core`'s `engine::test_support`.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
    use tootik_common::config::{Config, FederationConfig, LimitsConfig, ServerConfig, StoreConfig};
    use tootik_common::storage::StorageConfig;
    use tootik_common::{BasicTextFormatter, ImageAvatarProcessor, LocalStorage};
    use tootik_db::entities::actor;
    use tootik_federation::{ActorResolver, ApClient, RemoteActorCache};

    use super::{Engine, HandlerState};

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
                max_offset: 10_000,
                ..LimitsConfig::default()
            },
            federation: FederationConfig::default(),
        })
    }

    pub(crate) fn test_state(db: sea_orm::DatabaseConnection) -> HandlerState {
        test_state_with_config(db, test_config())
    }

    /// Like [`test_state`], but taking a caller-built [`Config`] so a test
    /// can tweak a throttle/limit via `Arc::get_mut` *before* this function
    /// clones it into the [`Engine`] (after which the refcount is no longer 1).
    pub(crate) fn test_state_with_config(db: sea_orm::DatabaseConnection, config: Arc<Config>) -> HandlerState {
        let engine = Arc::new(Engine::new(db.clone(), config.clone(), Arc::new(BasicTextFormatter)));
        let resolver = ActorResolver::new(ApClient::new("https://example.test"), RemoteActorCache::new());
        HandlerState {
            db,
            config,
            engine,
            resolver,
            avatar: Arc::new(ImageAvatarProcessor),
            storage: Arc::new(LocalStorage::new(StorageConfig {
                base_path: std::env::temp_dir(),
                base_url: "/avatars".to_string(),
            })),
        }
    }

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
