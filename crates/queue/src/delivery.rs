//! Outbound delivery worker pool (spec §4.3): polls `delivery_item` for due
//! rows, builds the wire body — fresh `JSON-LD` for this instance's own
//! activities, the exact received bytes for a forwarded reply — signs it
//! with the sending actor's key, and delivers it, retrying with backoff
//! until the per-item attempt cap is hit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tootik_common::crypto::KeyAlgorithm;
use tootik_common::{AppError, AppResult, Config};
use tootik_db::entities::{activity, delivery_item};
use tootik_db::repositories::{ActivityRepository, ActorRepository, DeliveryRepository, ObjectRepository, VoteRepository};
use tootik_federation::{document, ApClient, DeliveryOutcome};
use tracing::{debug, error, warn};

use crate::backoff::BackoffConfig;

/// Delivery items fetched per poll tick.
const POLL_BATCH: u64 = 200;

/// Idle interval between poll ticks when the last tick found nothing due.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Spawn the delivery worker loop. Returns its `JoinHandle` so the server
/// can await it during graceful shutdown.
pub fn spawn_delivery_workers(db: DatabaseConnection, client: ApClient, config: Arc<Config>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let backoff = BackoffConfig::from_federation_config(&config.federation);
        let per_host = config.federation.per_host_delivery_concurrency.max(1);
        loop {
            match run_once(&db, &client, &backoff, per_host).await {
                Ok(0) => tokio::time::sleep(POLL_INTERVAL).await,
                Ok(_) => {}
                Err(err) => {
                    error!(%err, "delivery worker tick failed");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    })
}

/// Run one poll tick, returning how many items were picked up.
async fn run_once(db: &DatabaseConnection, client: &ApClient, backoff: &BackoffConfig, per_host: usize) -> AppResult<usize> {
    let due = DeliveryRepository.fetch_due(db, Utc::now(), POLL_BATCH).await?;
    if due.is_empty() {
        return Ok(0);
    }
    let count = due.len();

    let mut by_host: HashMap<String, HashMap<String, Vec<delivery_item::Model>>> = HashMap::new();
    for item in due {
        let host = url::Url::parse(&item.target_inbox).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();
        by_host.entry(host).or_default().entry(item.target_inbox.clone()).or_default().push(item);
    }

    let mut host_handles = Vec::new();
    for (_host, by_inbox) in by_host {
        let db = db.clone();
        let client = client.clone();
        let backoff = *backoff;
        host_handles.push(tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(per_host));
            let mut inbox_handles = Vec::new();
            for (_inbox, items) in by_inbox {
                let permit_source = Arc::clone(&semaphore);
                let db = db.clone();
                let client = client.clone();
                inbox_handles.push(tokio::spawn(async move {
                    // One inbox's items are delivered strictly in order
                    // (spec §4.3 per-(sender, target) FIFO); only different
                    // inboxes on the same host run concurrently.
                    let Ok(_permit) = permit_source.acquire_owned().await else { return };
                    for item in items {
                        if let Err(err) = deliver_one(&db, &client, &backoff, &item).await {
                            warn!(%err, delivery_id = item.id, "delivery attempt failed");
                        }
                    }
                }));
            }
            for handle in inbox_handles {
                let _ = handle.await;
            }
        }));
    }
    for handle in host_handles {
        let _ = handle.await;
    }
    Ok(count)
}

async fn deliver_one(
    db: &DatabaseConnection,
    client: &ApClient,
    backoff: &BackoffConfig,
    item: &delivery_item::Model,
) -> AppResult<()> {
    let Some(activity) = ActivityRepository.find_by_id(db, &item.activity_id).await? else {
        DeliveryRepository.mark_terminal(db, item.id, "activity no longer exists").await?;
        return Ok(());
    };
    let Some(sender) = ActorRepository.find_by_id(db, &item.sender_actor_id).await? else {
        DeliveryRepository.mark_terminal(db, item.id, "sending actor no longer exists").await?;
        return Ok(());
    };
    let Some(private_key_pem) = sender.private_key_pem.clone() else {
        DeliveryRepository.mark_terminal(db, item.id, "sending actor has no private key").await?;
        return Ok(());
    };
    let algorithm = match sender.key_algorithm.as_str() {
        "ed25519" => KeyAlgorithm::Ed25519,
        _ => KeyAlgorithm::Rsa,
    };
    let key_id = format!("{}#main-key", sender.id);

    let body = build_wire_body(db, &activity).await?;
    let outcome = client.deliver_raw(&item.target_inbox, &body, algorithm, &private_key_pem, &key_id, &activity.activity_type).await;

    match outcome {
        Ok(DeliveryOutcome::Delivered) => {
            debug!(delivery_id = item.id, inbox = %item.target_inbox, "delivered");
            DeliveryRepository.mark_success(db, item.id).await?;
        }
        Ok(DeliveryOutcome::ActorGone) => {
            if let Some(actor) = ActorRepository.find_by_inbox_url(db, &item.target_inbox).await? {
                ActorRepository.mark_gone(db, &actor.id).await?;
            }
            DeliveryRepository.mark_all_for_inbox_terminal(db, &item.target_inbox, "actor gone (404/410)").await?;
        }
        Err(err) if err.is_transient() => {
            let attempts = item.attempts + 1;
            if backoff.should_retry(attempts.max(0) as u32) {
                let delay = backoff.delay_for_attempt(attempts.max(0) as u32);
                let next_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
                DeliveryRepository.mark_retry(db, item.id, attempts, next_at).await?;
            } else {
                DeliveryRepository.mark_terminal(db, item.id, "max delivery attempts exceeded").await?;
            }
        }
        Err(err) => {
            DeliveryRepository.mark_terminal(db, item.id, &err.to_string()).await?;
        }
    }
    Ok(())
}

/// Build the exact bytes to POST: the stored raw wire bytes for a forwarded
/// (non-local) activity, or a freshly encoded `JSON-LD` document built from
/// this instance's own DB rows for a local one (spec §4.1, §4.4, §9 — the
/// Activity Engine never stores wire-ready JSON for local activities).
async fn build_wire_body(db: &DatabaseConnection, activity: &activity::Model) -> AppResult<Vec<u8>> {
    if !activity.local {
        return Ok(activity.raw_body.clone());
    }

    let inline_object = match activity.activity_type.as_str() {
        "Create" | "Update" => {
            if let Some(object_id) = &activity.object_id {
                if let Some(model) = ObjectRepository.find_any(db, object_id).await? {
                    let options = if model.is_poll { VoteRepository.list_options(db, object_id).await? } else { Vec::new() };
                    Some(document::object_to_json(&model, &options))
                } else {
                    None
                }
            } else {
                None
            }
        }
        "Delete" => activity.object_id.as_ref().map(|id| document::tombstone_json(id)),
        _ => None,
    };

    let doc = document::activity_to_json(activity, inline_object.as_ref(), None);
    serde_json::to_vec(&doc).map_err(|e| AppError::Internal(format!("failed to encode activity for delivery: {e}")))
}
