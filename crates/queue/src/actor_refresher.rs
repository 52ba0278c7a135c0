//! Actor refresher loop (spec §5): periodically refetches remote actor
//! documents whose `last_refreshed_at` has aged past the configured
//! interval, independent of whatever the resolver's own use-triggered
//! staleness check does. A 404/410 on refetch marks the actor gone, same
//! as a failed delivery does (spec §4.2 failure taxonomy).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tootik_common::{AppResult, Config};
use tootik_db::repositories::ActorRepository;
use tootik_federation::ActorResolver;
use tracing::{error, warn};

/// Stale remote actors refetched per tick.
const BATCH: u64 = 50;

/// Idle interval between ticks when nothing was due.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the actor refresher loop. Returns its `JoinHandle` so the server
/// can await it during graceful shutdown.
pub fn spawn_actor_refresher(db: DatabaseConnection, resolver: ActorResolver, config: Arc<Config>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match run_once(&db, &resolver, config.federation.actor_refresh_interval).await {
                Ok(0) => tokio::time::sleep(POLL_INTERVAL).await,
                Ok(_) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(err) => {
                    error!(%err, "actor refresher tick failed");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    })
}

/// Run one refresh pass, returning how many actors were refetched.
pub async fn run_once(db: &DatabaseConnection, resolver: &ActorResolver, interval: Duration) -> AppResult<usize> {
    let stale = ActorRepository.find_stale_remote(db, interval, Utc::now(), BATCH).await?;
    let count = stale.len();
    for actor in stale {
        if let Err(err) = resolver.refetch(db, &actor.id).await {
            if matches!(err, tootik_common::AppError::NotFound(_)) {
                ActorRepository.mark_gone(db, &actor.id).await?;
            } else {
                warn!(%err, actor_id = %actor.id, "actor refresh attempt failed");
            }
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tootik_federation::{ActorResolver, ApClient, RemoteActorCache};
    use tootik_db::test_utils::in_memory_db;

    #[tokio::test]
    async fn runs_without_error_on_empty_store() {
        let db = in_memory_db().await.unwrap();
        let resolver = ActorResolver::new(ApClient::new("https://example.test"), RemoteActorCache::new());
        let refreshed = run_once(&db, &resolver, Duration::from_secs(3600)).await.unwrap();
        assert_eq!(refreshed, 0);
    }
}
