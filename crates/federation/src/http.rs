//! Thin `ActivityPub` HTTP surface (spec §4.2, §6): actor documents,
//! `WebFinger`, paged collections, and inbox capture. Every inbox route's
//! only job is to record raw bytes and headers — verification and `Apply`
//! happen later in the queue's inbox worker (spec §4.4, §9).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Deserialize;
use serde_json::Value;
use tootik_common::{AppError, Config};
use tootik_db::entities::activity as activity_entity;
use tootik_db::repositories::{ActivityRepository, ActorRepository, FollowRepository, InboxRepository, ObjectRepository, VoteRepository};
use tracing::warn;

use crate::document;
use crate::verify::PATH_KEY;

/// Items per `OrderedCollectionPage` (spec §6 paging).
const PAGE_SIZE: u64 = 20;

/// Propagate a repository error as an HTTP response from inside a handler,
/// or bind the `Ok` value.
macro_rules! ok_or_return {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => return error_response(&err),
        }
    };
}

/// Shared state the federation HTTP surface reads from.
#[derive(Clone)]
pub struct FederationState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
}

/// Build the federation HTTP router. Mounted by `tootik-server` alongside
/// the TLS line-protocol listener, on its own HTTP(S) port (spec §1, §6).
#[must_use]
pub fn federation_router(state: FederationState) -> Router {
    Router::new()
        .route("/.well-known/webfinger", get(webfinger))
        .route("/user/{username}", get(get_actor))
        .route("/user/{username}/inbox", post(post_actor_inbox))
        .route("/user/{username}/outbox", get(get_outbox))
        .route("/user/{username}/followers", get(get_followers))
        .route("/inbox", post(post_shared_inbox))
        .route("/object/{id}", get(get_object))
        .with_state(state)
}

fn activity_json_response(value: &Value, status: StatusCode) -> Response {
    let body = serde_json::to_vec(value).unwrap_or_default();
    (status, [("content-type", "application/activity+json")], body).into_response()
}

fn error_response(err: &AppError) -> Response {
    let status = match err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::BadInput(_) | AppError::SchemaInvalid(_) => StatusCode::BAD_REQUEST,
        AppError::SignatureInvalid(_) | AppError::AuthorityMismatch(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

async fn get_actor(State(state): State<FederationState>, Path(username): Path<String>) -> Response {
    match ActorRepository.find_local_by_username(&state.db, &state.config.server.domain, &username).await {
        Ok(Some(actor)) => activity_json_response(&document::actor_to_json(&actor), StatusCode::OK),
        Ok(None) => error_response(&AppError::NotFound(format!("actor {username}"))),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
struct WebfingerQuery {
    resource: String,
}

async fn webfinger(State(state): State<FederationState>, Query(q): Query<WebfingerQuery>) -> Response {
    let Some(acct) = q.resource.strip_prefix("acct:") else {
        return error_response(&AppError::BadInput("resource must be an acct: URI".into()));
    };
    let Some((username, domain)) = acct.split_once('@') else {
        return error_response(&AppError::BadInput("malformed acct URI".into()));
    };
    if domain != state.config.server.domain {
        return error_response(&AppError::NotFound(format!("acct:{acct}")));
    }
    match ActorRepository.find_local_by_username(&state.db, domain, username).await {
        Ok(Some(actor)) => activity_json_response(&document::webfinger_json(&actor, domain), StatusCode::OK),
        Ok(None) => error_response(&AppError::NotFound(format!("acct:{acct}"))),
        Err(err) => error_response(&err),
    }
}

async fn get_object(State(state): State<FederationState>, Path(id): Path<String>) -> Response {
    let object_id = format!("https://{}/object/{id}", state.config.server.domain);
    match ObjectRepository.find_any(&state.db, &object_id).await {
        Ok(Some(model)) if model.deleted_at.is_some() => {
            activity_json_response(&document::tombstone_json(&object_id), StatusCode::GONE)
        }
        Ok(Some(model)) => {
            let options = if model.is_poll {
                VoteRepository.list_options(&state.db, &object_id).await.unwrap_or_default()
            } else {
                Vec::new()
            };
            activity_json_response(&document::object_to_json(&model, &options), StatusCode::OK)
        }
        Ok(None) => error_response(&AppError::NotFound(format!("object {object_id}"))),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize, Default)]
struct PageQuery {
    offset: Option<u64>,
}

async fn get_outbox(State(state): State<FederationState>, Path(username): Path<String>, Query(q): Query<PageQuery>) -> Response {
    let Some(actor) = ok_or_return!(ActorRepository.find_local_by_username(&state.db, &state.config.server.domain, &username).await) else {
        return error_response(&AppError::NotFound(format!("actor {username}")));
    };
    let collection_id = format!("{}/outbox", actor.id);

    let Some(offset) = q.offset else {
        let total = ok_or_return!(activity_entity::Entity::find()
            .filter(activity_entity::Column::ActorId.eq(&actor.id))
            .filter(activity_entity::Column::Local.eq(true))
            .count(&state.db)
            .await);
        return activity_json_response(
            &document::ordered_collection_summary(&collection_id, total, &format!("{collection_id}?offset=0")),
            StatusCode::OK,
        );
    };
    let offset = offset.min(state.config.limits.max_offset);

    let rows = ok_or_return!(ActivityRepository.find_outbox_page(&state.db, &actor.id, offset, PAGE_SIZE).await);
    let total = ok_or_return!(activity_entity::Entity::find()
        .filter(activity_entity::Column::ActorId.eq(&actor.id))
        .filter(activity_entity::Column::Local.eq(true))
        .count(&state.db)
        .await);

    let items: Vec<Value> = rows.iter().map(|a| document::activity_to_json(a, None, None)).collect();
    activity_json_response(&document::ordered_collection_page(&collection_id, items, offset, PAGE_SIZE, total), StatusCode::OK)
}

async fn get_followers(State(state): State<FederationState>, Path(username): Path<String>, Query(q): Query<PageQuery>) -> Response {
    let Some(actor) = ok_or_return!(ActorRepository.find_local_by_username(&state.db, &state.config.server.domain, &username).await) else {
        return error_response(&AppError::NotFound(format!("actor {username}")));
    };
    let collection_id = actor.followers_url.clone().unwrap_or_else(|| format!("{}/followers", actor.id));

    let all = ok_or_return!(FollowRepository.list_followers(&state.db, &actor.id).await);
    let total = all.len() as u64;

    let Some(offset) = q.offset else {
        return activity_json_response(
            &document::ordered_collection_summary(&collection_id, total, &format!("{collection_id}?offset=0")),
            StatusCode::OK,
        );
    };
    let offset = offset.min(state.config.limits.max_offset);

    let items: Vec<Value> =
        all.into_iter().skip(offset as usize).take(PAGE_SIZE as usize).map(|f| Value::String(f.follower_id)).collect();
    activity_json_response(&document::ordered_collection_page(&collection_id, items, offset, PAGE_SIZE, total), StatusCode::OK)
}

/// Build the headers-JSON blob the inbox worker will re-verify against:
/// lowercase header names the request actually carried, plus the path
/// under [`PATH_KEY`] since `(request-target)` needs it (spec §4.4).
fn capture_headers(headers: &HeaderMap, path: &str) -> String {
    let mut map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string())))
        .collect();
    map.insert(PATH_KEY.to_string(), path.to_string());
    serde_json::to_string(&map).unwrap_or_default()
}

fn sender_hint(headers: &HeaderMap) -> Option<String> {
    let signature = headers.get("signature")?.to_str().ok()?;
    let parsed = tootik_common::http_signature::HttpSignature::parse(signature).ok()?;
    Some(parsed.key_id)
}

async fn post_shared_inbox(State(state): State<FederationState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    capture_inbox_item(&state, headers, body, None, "/inbox").await
}

async fn post_actor_inbox(
    State(state): State<FederationState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let target = match ActorRepository.find_local_by_username(&state.db, &state.config.server.domain, &username).await {
        Ok(Some(actor)) => Some(actor.id),
        Ok(None) => return error_response(&AppError::NotFound(format!("actor {username}"))),
        Err(err) => return error_response(&err),
    };
    let path = format!("/user/{username}/inbox");
    capture_inbox_item(&state, headers, body, target, &path).await
}

async fn capture_inbox_item(
    state: &FederationState,
    headers: HeaderMap,
    body: axum::body::Bytes,
    target_actor_id: Option<String>,
    path: &str,
) -> Response {
    let headers_json = capture_headers(&headers, path);
    let hint = sender_hint(&headers);
    match InboxRepository.enqueue(&state.db, body.to_vec(), &headers_json, hint, target_actor_id).await {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(err) => {
            warn!(%err, "failed to capture inbox item");
            error_response(&err)
        }
    }
}
