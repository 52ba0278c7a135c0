//! Inbound activity worker pool (spec §4.4, §9): polls `inbox_item` for due
//! rows, verifies the `HTTP` Signature against the claimed sender, then
//! hands the decoded activity to the Activity Engine's `Apply`. Retries on
//! transient failure (signature verification needing a not-yet-resolvable
//! remote actor, a database hiccup); gives up after the attempt cap like
//! delivery does.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tootik_common::AppResult;
use tootik_core::engine::Engine;
use tootik_db::entities::inbox_item;
use tootik_db::repositories::InboxRepository;
use tootik_federation::{verify_inbox_item, ActorResolver};
use tracing::{debug, error, warn};

use crate::backoff::BackoffConfig;

const POLL_BATCH: u64 = 200;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the inbox worker loop. Returns its `JoinHandle` so the server can
/// await it during graceful shutdown.
pub fn spawn_inbox_workers(db: DatabaseConnection, resolver: ActorResolver, engine: Arc<Engine>, backoff: BackoffConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match run_once(&db, &resolver, &engine, &backoff).await {
                Ok(0) => tokio::time::sleep(POLL_INTERVAL).await,
                Ok(_) => {}
                Err(err) => {
                    error!(%err, "inbox worker tick failed");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    })
}

async fn run_once(db: &DatabaseConnection, resolver: &ActorResolver, engine: &Engine, backoff: &BackoffConfig) -> AppResult<usize> {
    let due = InboxRepository.fetch_due(db, Utc::now(), POLL_BATCH).await?;
    if due.is_empty() {
        return Ok(0);
    }
    let count = due.len();
    for item in due {
        if let Err(err) = process_one(db, resolver, engine, backoff, &item).await {
            warn!(%err, inbox_item_id = item.id, "failed to process inbox item");
        }
    }
    Ok(count)
}

async fn process_one(
    db: &DatabaseConnection,
    resolver: &ActorResolver,
    engine: &Engine,
    backoff: &BackoffConfig,
    item: &inbox_item::Model,
) -> AppResult<()> {
    let verified = verify_inbox_item(db, resolver, item).await;

    let activity = match verified {
        Ok(activity) => activity,
        Err(err) if err.is_transient() => return schedule_retry(db, backoff, item).await,
        Err(err) => {
            InboxRepository.mark_terminal(db, item.id, &err.to_string()).await?;
            return Ok(());
        }
    };

    match engine.apply(activity).await {
        Ok(outcome) => {
            debug!(inbox_item_id = item.id, ?outcome, "applied inbound activity");
            InboxRepository.mark_success(db, item.id).await?;
        }
        Err(err) if err.is_transient() => {
            schedule_retry(db, backoff, item).await?;
        }
        Err(err) => {
            InboxRepository.mark_terminal(db, item.id, &err.to_string()).await?;
        }
    }
    Ok(())
}

async fn schedule_retry(db: &DatabaseConnection, backoff: &BackoffConfig, item: &inbox_item::Model) -> AppResult<()> {
    let attempts = item.attempts + 1;
    if backoff.should_retry(attempts.max(0) as u32) {
        let delay = backoff.delay_for_attempt(attempts.max(0) as u32);
        let next_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        InboxRepository.mark_retry(db, item.id, attempts, next_at).await
    } else {
        InboxRepository.mark_terminal(db, item.id, "max attempts exceeded").await
    }
}
