//! tootik server entry point (spec §5): loads configuration, opens the
//! embedded store, and runs every long-lived activity the core names
//! concurrently — the TLS line-protocol listener, the ActivityPub HTTP
//! surface, the delivery and inbox worker pools, and the periodic
//! feed/poll-tally/mover/actor-refresh/garbage-collector loops — until a
//! shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tootik_common::storage::StorageConfig;
use tootik_common::{AvatarProcessor, BasicTextFormatter, Config, ImageAvatarProcessor, LocalStorage};
use tootik_core::engine::Engine;
use tootik_core::loops as core_loops;
use tootik_federation::{federation_router, ActorResolver, ApClient, FederationState, RemoteActorCache};
use tootik_handler::{tls as handler_tls, HandlerState};
use tootik_queue::{spawn_actor_refresher, spawn_delivery_workers, spawn_inbox_workers, BackoffConfig};

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix this listens for both SIGINT (Ctrl+C) and SIGTERM. On other
/// platforms only Ctrl+C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => warn!(%err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Runs the periodic feed-materializer/poll-tally/mover/garbage-collector
/// loops (spec §5) on their own interval each, until cancellation.
async fn spawn_periodic_loops(db: sea_orm::DatabaseConnection, config: Arc<Config>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut poll_tally = tokio::time::interval(config.federation.poll_tally_interval);
        let mut mover = tokio::time::interval(config.federation.feed_update_interval);
        let mut gc = tokio::time::interval(std::time::Duration::from_secs(3600));
        poll_tally.tick().await;
        mover.tick().await;
        gc.tick().await;
        loop {
            tokio::select! {
                _ = poll_tally.tick() => {
                    if let Err(err) = core_loops::poll_tally::run_once(&db).await {
                        error!(%err, "poll tally pass failed");
                    }
                }
                _ = mover.tick() => {
                    if let Err(err) = core_loops::mover::run_once(&db).await {
                        error!(%err, "mover pass failed");
                    }
                }
                _ = gc.tick() => {
                    let older_than = chrono::Utc::now() - chrono::Duration::days(30);
                    if let Err(err) = core_loops::gc::run_once(&db, older_than).await {
                        error!(%err, "garbage collection pass failed");
                    }
                }
            }
        }
    })
}

/// Accept loop for the TLS line-protocol listener (spec §4.5, §5): one task
/// per accepted connection, handled to completion independently of every
/// other connection.
async fn run_line_listener(listener: TcpListener, acceptor: TlsAcceptor, state: Arc<HandlerState>) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "failed to accept line-protocol connection");
                continue;
            }
        };
        let acceptor = acceptor.clone();
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            match acceptor.accept(socket).await {
                Ok(stream) => tootik_handler::handle_connection(stream, state).await,
                Err(err) => warn!(%err, %peer, "TLS handshake failed"),
            }
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "tootik=debug,tower_http=debug".into()))
        .init();

    info!("starting tootik");

    let config = Arc::new(Config::load()?);

    let db = tootik_db::init(&config).await?;
    info!("connected to embedded store at {}", config.store.path);

    tootik_db::migrate(&db).await?;
    info!("migrations complete");

    let instance_url = format!("https://{}", config.server.domain);
    let ap_client = ApClient::new(&instance_url);
    let resolver = ActorResolver::new(ap_client.clone(), RemoteActorCache::new());

    let formatter = Arc::new(BasicTextFormatter);
    let engine = Arc::new(Engine::new(db.clone(), Arc::clone(&config), formatter));

    let avatar: Arc<dyn AvatarProcessor> = Arc::new(ImageAvatarProcessor);
    let storage = Arc::new(LocalStorage::new(StorageConfig {
        base_path: PathBuf::from("./data/avatars"),
        base_url: format!("{instance_url}/avatars"),
    }));

    let handler_state = Arc::new(HandlerState {
        db: db.clone(),
        config: Arc::clone(&config),
        engine: Arc::clone(&engine),
        resolver: resolver.clone(),
        avatar,
        storage,
    });

    let tls_config = handler_tls::load_server_config(&config.server.tls_cert_path, &config.server.tls_key_path)?;
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));
    let line_listener = TcpListener::bind(&config.server.line_listen).await?;
    info!("line protocol listening on {}", config.server.line_listen);

    let federation_state = FederationState { db: db.clone(), config: Arc::clone(&config) };
    let federation_app = federation_router(federation_state).layer(TraceLayer::new_for_http());
    let http_listener = TcpListener::bind(&config.server.http_listen).await?;
    info!("ActivityPub HTTP surface listening on {}", config.server.http_listen);

    let backoff = BackoffConfig::from_federation_config(&config.federation);
    let delivery_handle = spawn_delivery_workers(db.clone(), ap_client, Arc::clone(&config));
    let inbox_handle = spawn_inbox_workers(db.clone(), resolver.clone(), Arc::clone(&engine), backoff);
    let refresher_handle = spawn_actor_refresher(db.clone(), resolver, Arc::clone(&config));
    let periodic_handle = spawn_periodic_loops(db.clone(), Arc::clone(&config)).await;

    let line_listener_task = tokio::spawn(run_line_listener(line_listener, acceptor, handler_state));

    tokio::select! {
        result = axum::serve(http_listener, federation_app) => {
            if let Err(err) = result {
                error!(%err, "ActivityPub HTTP surface exited");
            }
        }
        () = shutdown_signal() => {}
    }

    line_listener_task.abort();
    delivery_handle.abort();
    inbox_handle.abort();
    refresher_handle.abort();
    periodic_handle.abort();

    info!("shutdown complete");
    Ok(())
}
