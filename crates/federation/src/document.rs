//! `JSON-LD` encode/decode: the wire shapes for actor documents, objects,
//! activities, collections and `WebFinger` responses (spec §4.2, §6). This
//! is the only module in the workspace that knows what an `ActivityPub`
//! document looks like on the wire; `tootik-core` only ever sees the plain
//! DTOs in `tootik_core::engine::types`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tootik_common::crypto::KeyAlgorithm;
use tootik_db::entities::{activity, actor, object, poll_option};

const CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";

/// `publicKey` sub-document of an actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PublicKeyDoc {
    id: String,
    owner: String,
    #[serde(rename = "publicKeyPem")]
    public_key_pem: String,
}

/// Render a local or cached-remote actor as its canonical `ActivityPub`
/// document. Both `Person`- and `Group`-typed actors use the same shape;
/// only the `type` differs (spec §3, §9 "community" = `Group` actor).
#[must_use]
pub fn actor_to_json(model: &actor::Model) -> Value {
    let kind = match model.actor_type.as_str() {
        "Group" => "Group",
        "Service" => "Service",
        _ => "Person",
    };

    let mut doc = json!({
        "@context": [CONTEXT, SECURITY_CONTEXT],
        "id": model.id,
        "type": kind,
        "preferredUsername": model.preferred_username,
        "inbox": model.inbox_url,
        "publicKey": PublicKeyDoc {
            id: format!("{}#main-key", model.id),
            owner: model.id.clone(),
            public_key_pem: model.public_key_pem.clone(),
        },
    });
    let obj = doc.as_object_mut().unwrap_or_else(|| unreachable!("json! always builds an object"));

    if let Some(name) = &model.display_name {
        obj.insert("name".to_string(), json!(name));
    }
    if let Some(summary) = &model.summary {
        obj.insert("summary".to_string(), json!(summary));
    }
    if let Some(shared) = &model.shared_inbox_url {
        obj.insert("endpoints".to_string(), json!({ "sharedInbox": shared }));
    }
    if let Some(outbox) = &model.outbox_url {
        obj.insert("outbox".to_string(), json!(outbox));
    }
    if let Some(followers) = &model.followers_url {
        obj.insert("followers".to_string(), json!(followers));
    }
    if let Some(avatar) = &model.avatar_url {
        obj.insert("icon".to_string(), json!({ "type": "Image", "url": avatar }));
    }
    if let Some(moved_to) = &model.moved_to {
        obj.insert("movedTo".to_string(), json!(moved_to));
    }
    if let Some(aka_json) = &model.also_known_as {
        if let Ok(aka) = serde_json::from_str::<Vec<String>>(aka_json) {
            if !aka.is_empty() {
                obj.insert("alsoKnownAs".to_string(), json!(aka));
            }
        }
    }
    doc
}

/// Infer which algorithm a PEM key uses, for a freshly resolved actor
/// document. Delegates to the same probe `tootik_federation::cache` uses.
#[must_use]
pub fn infer_key_algorithm(public_key_pem: &str) -> Option<KeyAlgorithm> {
    if tootik_common::crypto::parse_public_key(public_key_pem).is_ok() {
        Some(KeyAlgorithm::Rsa)
    } else if tootik_common::crypto::parse_ed25519_public_key(public_key_pem).is_ok() {
        Some(KeyAlgorithm::Ed25519)
    } else {
        None
    }
}

/// Render a `Note` (or `Question`, when `options` is non-empty) as its
/// `ActivityPub` document.
#[must_use]
pub fn object_to_json(model: &object::Model, options: &[poll_option::Model]) -> Value {
    let to: Vec<String> = serde_json::from_str(&model.to).unwrap_or_default();
    let cc: Vec<String> = serde_json::from_str(&model.cc).unwrap_or_default();
    let kind = if model.is_poll { "Question" } else { "Note" };

    let mut doc = json!({
        "@context": CONTEXT,
        "id": model.id,
        "type": kind,
        "attributedTo": model.attributed_to,
        "content": model.content,
        "to": to,
        "cc": cc,
        "published": model.created_at.to_rfc3339(),
        "updated": model.updated_at.to_rfc3339(),
    });
    let obj = doc.as_object_mut().unwrap_or_else(|| unreachable!("json! always builds an object"));

    if let Some(parent) = &model.in_reply_to {
        obj.insert("inReplyTo".to_string(), json!(parent));
    }
    if let Some(tag_json) = &model.tag {
        if let Ok(tags) = serde_json::from_str::<Vec<String>>(tag_json) {
            let tag_docs: Vec<Value> = tags.into_iter().map(|href| json!({ "type": "Mention", "href": href })).collect();
            obj.insert("tag".to_string(), json!(tag_docs));
        }
    }
    if let Some(attachment_json) = &model.attachment {
        if let Ok(urls) = serde_json::from_str::<Vec<String>>(attachment_json) {
            let docs: Vec<Value> = urls.into_iter().map(|url| json!({ "type": "Document", "url": url })).collect();
            obj.insert("attachment".to_string(), json!(docs));
        }
    }
    if model.is_poll {
        let field = if model.poll_multiple { "anyOf" } else { "oneOf" };
        let opts: Vec<Value> = options
            .iter()
            .map(|o| json!({ "type": "Note", "name": o.name, "replies": { "type": "Collection", "totalItems": o.votes } }))
            .collect();
        obj.insert(field.to_string(), json!(opts));
        if let Some(closes) = model.poll_closes_at {
            obj.insert("endTime".to_string(), json!(closes.to_rfc3339()));
        }
    }
    doc
}

/// A tombstone for a deleted object (spec §4.1 `Delete`).
#[must_use]
pub fn tombstone_json(object_id: &str) -> Value {
    json!({
        "@context": CONTEXT,
        "id": object_id,
        "type": "Tombstone",
    })
}

/// Build the outbound `ActivityPub` envelope for one of this instance's
/// own activities, inlining the referenced object/target when the
/// recipient needs it embedded rather than by reference (spec §4.1, §4.2).
#[must_use]
pub fn activity_to_json(model: &activity::Model, inline_object: Option<&Value>, inline_target: Option<&str>) -> Value {
    let to: Vec<String> = serde_json::from_str(&model.to).unwrap_or_default();
    let cc: Vec<String> = serde_json::from_str(&model.cc).unwrap_or_default();

    let mut doc = json!({
        "@context": CONTEXT,
        "id": model.id,
        "type": model.activity_type,
        "actor": model.actor_id,
        "to": to,
        "cc": cc,
        "published": model.created_at.to_rfc3339(),
    });
    let obj = doc.as_object_mut().unwrap_or_else(|| unreachable!("json! always builds an object"));

    if let Some(inline) = inline_object {
        obj.insert("object".to_string(), inline.clone());
    } else if let Some(object_id) = &model.object_id {
        obj.insert("object".to_string(), json!(object_id));
    }
    if let Some(target) = inline_target.map(ToString::to_string).or_else(|| model.target_id.clone()) {
        obj.insert("target".to_string(), json!(target));
    }
    doc
}

/// `WebFinger` JRD response for `acct:<username>@<domain>` (spec §4.2, §6).
#[must_use]
pub fn webfinger_json(model: &actor::Model, domain: &str) -> Value {
    json!({
        "subject": format!("acct:{}@{}", model.preferred_username, domain),
        "aliases": [model.id],
        "links": [
            { "rel": "self", "type": "application/activity+json", "href": model.id },
            { "rel": "http://webfinger.net/rel/profile-page", "type": "text/html", "href": model.id },
        ],
    })
}

/// One page of an `OrderedCollection` (followers/following/outbox), using
/// simple numeric offset paging (spec §4.5, §6 `max_offset`).
#[must_use]
pub fn ordered_collection_page(
    collection_id: &str,
    items: Vec<Value>,
    offset: u64,
    limit: u64,
    total: u64,
) -> Value {
    let mut doc = json!({
        "@context": CONTEXT,
        "id": format!("{collection_id}?offset={offset}"),
        "type": "OrderedCollectionPage",
        "partOf": collection_id,
        "totalItems": total,
        "orderedItems": items,
    });
    let obj = doc.as_object_mut().unwrap_or_else(|| unreachable!("json! always builds an object"));
    if offset + limit < total {
        obj.insert("next".to_string(), json!(format!("{collection_id}?offset={}", offset + limit)));
    }
    doc
}

/// The bare `OrderedCollection` summary a collection `GET` without
/// `?offset=` returns (spec §6).
#[must_use]
pub fn ordered_collection_summary(collection_id: &str, total: u64, first_page_url: &str) -> Value {
    json!({
        "@context": CONTEXT,
        "id": collection_id,
        "type": "OrderedCollection",
        "totalItems": total,
        "first": first_page_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_actor() -> actor::Model {
        actor::Model {
            id: "https://tootik.example/user/alice".to_string(),
            local: true,
            preferred_username: "alice".to_string(),
            domain: "tootik.example".to_string(),
            actor_type: "Person".to_string(),
            display_name: Some("Alice".to_string()),
            summary: None,
            avatar_url: None,
            inbox_url: "https://tootik.example/user/alice/inbox".to_string(),
            shared_inbox_url: Some("https://tootik.example/inbox".to_string()),
            outbox_url: Some("https://tootik.example/user/alice/outbox".to_string()),
            followers_url: Some("https://tootik.example/user/alice/followers".to_string()),
            public_key_pem: "PEM".to_string(),
            private_key_pem: None,
            key_algorithm: "rsa".to_string(),
            moved_to: None,
            also_known_as: None,
            gone: false,
            first_cert_fingerprint: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_refreshed_at: None,
            last_post_at: None,
            last_edit_at: None,
            last_boost_at: None,
            last_bookmark_at: None,
            last_follow_at: None,
            last_alias_at: None,
            last_move_at: None,
            last_name_at: None,
            last_avatar_at: None,
        }
    }

    #[test]
    fn actor_document_carries_shared_inbox_and_key() {
        let doc = actor_to_json(&sample_actor());
        assert_eq!(doc["type"], "Person");
        assert_eq!(doc["endpoints"]["sharedInbox"], "https://tootik.example/inbox");
        assert_eq!(doc["publicKey"]["publicKeyPem"], "PEM");
    }

    #[test]
    fn webfinger_response_has_self_link() {
        let doc = webfinger_json(&sample_actor(), "tootik.example");
        assert_eq!(doc["subject"], "acct:alice@tootik.example");
        assert_eq!(doc["links"][0]["href"], "https://tootik.example/user/alice");
    }
}
