//! Turn a captured [`inbox_item::Model`] into a verified [`InboundActivity`]:
//! resolve the claimed sender, check the HTTP Signature and digest, then
//! decode the body (spec §4.2, §4.4, §9). This is where the inbox worker's
//! per-item verification step lives; the axum inbox route never calls it
//! inline.

use std::collections::HashMap;

use sea_orm::ConnectionTrait;
use serde_json::Value;
use tootik_common::http_signature::HttpSignature;
use tootik_common::{AppError, AppResult};
use tootik_db::entities::inbox_item;
use tootik_core::engine::types::InboundActivity;

use crate::inbound::parse_inbound_activity;
use crate::resolver::ActorResolver;
use crate::signature::{verify_digest, verify_request};

/// Captured-headers key the inbox route stashes the request path under,
/// since `(request-target)` needs it but it isn't itself an HTTP header
/// (spec §4.4 "capture enough of the request to re-verify later").
pub const PATH_KEY: &str = "(request-path)";

/// Verify one captured inbox item and decode it into a dispatchable
/// activity. Inbox deliveries are always `POST`, so only the path needs to
/// travel with the captured headers.
///
/// # Errors
/// Returns [`AppError::SchemaInvalid`] if the stored headers or body don't
/// parse, [`AppError::SignatureInvalid`] if the `Signature` header is
/// malformed or doesn't verify, and whatever [`ActorResolver::resolve_actor`]
/// returns if the claimed sender can't be resolved.
pub async fn verify_inbox_item<C: ConnectionTrait>(
    db: &C,
    resolver: &ActorResolver,
    item: &inbox_item::Model,
) -> AppResult<InboundActivity> {
    let mut headers: HashMap<String, String> =
        serde_json::from_str(&item.headers).map_err(|e| AppError::SchemaInvalid(format!("malformed captured headers: {e}")))?;
    let path = headers.remove(PATH_KEY).ok_or_else(|| AppError::SchemaInvalid("captured headers missing request path".into()))?;

    let signature_header = headers.get("signature").ok_or_else(|| AppError::SignatureInvalid("missing signature header".into()))?;
    let parsed_signature = HttpSignature::parse(signature_header)?;
    let key_id = &parsed_signature.key_id;
    let sender_id = key_id.split('#').next().unwrap_or(key_id);

    let sender = resolver.resolve_actor(db, sender_id).await?;
    let algorithm = match sender.key_algorithm.as_str() {
        "ed25519" => tootik_common::crypto::KeyAlgorithm::Ed25519,
        _ => tootik_common::crypto::KeyAlgorithm::Rsa,
    };

    verify_request(signature_header, &sender.public_key_pem, algorithm, "POST", &path, &headers)?;

    let digest_header = headers.get("digest").map(String::as_str);
    if !verify_digest(&item.raw_body, digest_header) {
        return Err(AppError::SignatureInvalid("digest mismatch".into()));
    }

    let json: Value =
        serde_json::from_slice(&item.raw_body).map_err(|e| AppError::SchemaInvalid(format!("malformed activity body: {e}")))?;
    let activity = parse_inbound_activity(&item.raw_body, &json)?;

    if activity.actor_id != sender.id {
        return Err(AppError::AuthorityMismatch(format!(
            "activity actor {} does not match signing key owner {}",
            activity.actor_id, sender.id
        )));
    }

    Ok(activity)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use sea_orm::{ActiveModelTrait, Set};
    use tootik_common::crypto::{generate_keypair, KeyAlgorithm};
    use tootik_db::entities::actor;
    use tootik_db::test_utils::in_memory_db;

    use super::*;
    use crate::cache::RemoteActorCache;
    use crate::client::ApClient;
    use crate::signature::sign_request;

    async fn seed_resolvable_remote_actor(db: &sea_orm::DatabaseConnection, id: &str) -> (actor::Model, tootik_common::crypto::Keypair) {
        let keypair = generate_keypair(KeyAlgorithm::Rsa).unwrap();
        let now = chrono::Utc::now();
        let model = actor::ActiveModel {
            id: Set(id.to_string()),
            local: Set(false),
            preferred_username: Set("carol".to_string()),
            domain: Set("remote.test".to_string()),
            actor_type: Set("Person".to_string()),
            inbox_url: Set(format!("{id}/inbox")),
            public_key_pem: Set(keypair.public_key_pem.clone()),
            key_algorithm: Set("rsa".to_string()),
            gone: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            last_refreshed_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();
        (model, keypair)
    }

    fn captured_headers(signature_header: &str, date_header: &str, digest_header: Option<&str>, path: &str) -> String {
        let mut headers: StdHashMap<String, String> = StdHashMap::new();
        headers.insert("host".to_string(), "instance.test".to_string());
        headers.insert("date".to_string(), date_header.to_string());
        headers.insert("signature".to_string(), signature_header.to_string());
        if let Some(digest) = digest_header {
            headers.insert("digest".to_string(), digest.to_string());
        }
        headers.insert(PATH_KEY.to_string(), path.to_string());
        serde_json::to_string(&headers).unwrap()
    }

    #[tokio::test]
    async fn well_signed_follow_verifies_and_decodes() {
        let db = in_memory_db().await.unwrap();
        let sender_id = "https://remote.test/user/carol";
        let (_actor, keypair) = seed_resolvable_remote_actor(&db, sender_id).await;
        let resolver = ActorResolver::new(ApClient::new("https://instance.test"), RemoteActorCache::new());

        let body = format!(
            r#"{{"id":"https://remote.test/activity/1","type":"Follow","actor":"{sender_id}","object":"https://instance.test/user/alice"}}"#
        )
        .into_bytes();
        let signed = sign_request(
            KeyAlgorithm::Rsa,
            &keypair.private_key_pem,
            &format!("{sender_id}#main-key"),
            "POST",
            "instance.test",
            "/inbox",
            &body,
        )
        .unwrap();

        let item = inbox_item::Model {
            id: 1,
            raw_body: body,
            headers: captured_headers(&signed.signature_header, &signed.date_header, signed.digest_header.as_deref(), "/inbox"),
            sender_hint: Some(format!("{sender_id}#main-key")),
            target_actor_id: None,
            received_at: chrono::Utc::now(),
            attempts: 0,
            next_attempt_at: chrono::Utc::now(),
            terminal: false,
            terminal_reason: None,
        };

        let activity = verify_inbox_item(&db, &resolver, &item).await.unwrap();
        assert_eq!(activity.actor_id, sender_id);
        assert!(matches!(activity.kind, tootik_core::engine::types::ActivityKind::Follow { .. }));
    }

    #[tokio::test]
    async fn tampered_body_fails_digest_check() {
        let db = in_memory_db().await.unwrap();
        let sender_id = "https://remote.test/user/carol";
        let (_actor, keypair) = seed_resolvable_remote_actor(&db, sender_id).await;
        let resolver = ActorResolver::new(ApClient::new("https://instance.test"), RemoteActorCache::new());

        let body = format!(
            r#"{{"id":"https://remote.test/activity/1","type":"Follow","actor":"{sender_id}","object":"https://instance.test/user/alice"}}"#
        )
        .into_bytes();
        let signed = sign_request(
            KeyAlgorithm::Rsa,
            &keypair.private_key_pem,
            &format!("{sender_id}#main-key"),
            "POST",
            "instance.test",
            "/inbox",
            &body,
        )
        .unwrap();

        let item = inbox_item::Model {
            id: 1,
            raw_body: b"{\"tampered\":true}".to_vec(),
            headers: captured_headers(&signed.signature_header, &signed.date_header, signed.digest_header.as_deref(), "/inbox"),
            sender_hint: Some(format!("{sender_id}#main-key")),
            target_actor_id: None,
            received_at: chrono::Utc::now(),
            attempts: 0,
            next_attempt_at: chrono::Utc::now(),
            terminal: false,
            terminal_reason: None,
        };

        let err = verify_inbox_item(&db, &resolver, &item).await.unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid(_)));
    }

    #[tokio::test]
    async fn activity_actor_mismatched_with_signer_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let sender_id = "https://remote.test/user/carol";
        let (_actor, keypair) = seed_resolvable_remote_actor(&db, sender_id).await;
        let _impostor = seed_resolvable_remote_actor(&db, "https://remote.test/user/mallory").await;
        let resolver = ActorResolver::new(ApClient::new("https://instance.test"), RemoteActorCache::new());

        let body = br#"{"id":"https://remote.test/activity/1","type":"Follow","actor":"https://remote.test/user/mallory","object":"https://instance.test/user/alice"}"#.to_vec();
        let signed = sign_request(
            KeyAlgorithm::Rsa,
            &keypair.private_key_pem,
            &format!("{sender_id}#main-key"),
            "POST",
            "instance.test",
            "/inbox",
            &body,
        )
        .unwrap();

        let item = inbox_item::Model {
            id: 1,
            raw_body: body,
            headers: captured_headers(&signed.signature_header, &signed.date_header, signed.digest_header.as_deref(), "/inbox"),
            sender_hint: Some(format!("{sender_id}#main-key")),
            target_actor_id: None,
            received_at: chrono::Utc::now(),
            attempts: 0,
            next_attempt_at: chrono::Utc::now(),
            terminal: false,
            terminal_reason: None,
        };

        let err = verify_inbox_item(&db, &resolver, &item).await.unwrap_err();
        assert!(matches!(err, AppError::AuthorityMismatch(_)));
    }
}
