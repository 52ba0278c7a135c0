//! Decode a raw inbound `ActivityPub` envelope into the plain
//! [`InboundActivity`] DTO [`tootik_core::engine::Engine::apply`] consumes
//! (spec §4.1, §4.4, §9 "activity dispatch as tagged variants").

use chrono::{DateTime, Utc};
use serde_json::Value;
use tootik_common::{AppError, AppResult};
use tootik_core::engine::types::{ActivityKind, InboundActivity, InboundObject};

fn as_str_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

fn object_id_ref(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(map)) => map.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn parse_object(id: String, v: &Value) -> InboundObject {
    let content = v.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
    let in_reply_to = v.get("inReplyTo").and_then(Value::as_str).map(str::to_string);
    let to = as_str_list(v.get("to"));
    let cc = as_str_list(v.get("cc"));
    let tag = v
        .get("tag")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.get("href").and_then(Value::as_str).or_else(|| t.get("name").and_then(Value::as_str)))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let updated = v
        .get("updated")
        .or_else(|| v.get("published"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let is_poll = v.get("type").and_then(Value::as_str) == Some("Question");

    InboundObject { id, content, in_reply_to, to, cc, tag, updated, is_poll }
}

/// Parse one inbound activity envelope. Unrecognized `type` values decode
/// to [`ActivityKind::Unknown`] rather than erroring, since the inbox
/// worker logs and skips them as a no-op (spec §9).
///
/// # Errors
/// Returns [`AppError::SchemaInvalid`] when the envelope is missing `id`,
/// `type` or `actor`, or when a referenced object/target cannot be
/// resolved to an id.
pub fn parse_inbound_activity(raw_body: &[u8], json: &Value) -> AppResult<InboundActivity> {
    let id = json.get("id").and_then(Value::as_str).ok_or_else(|| AppError::SchemaInvalid("activity missing id".into()))?.to_string();
    let kind_str = json.get("type").and_then(Value::as_str).ok_or_else(|| AppError::SchemaInvalid("activity missing type".into()))?;
    let actor_id = json
        .get("actor")
        .and_then(|a| a.as_str().map(str::to_string).or_else(|| a.get("id").and_then(Value::as_str).map(str::to_string)))
        .ok_or_else(|| AppError::SchemaInvalid("activity missing actor".into()))?;
    let to = as_str_list(json.get("to"));
    let cc = as_str_list(json.get("cc"));

    let object_val = json.get("object");
    let kind = match kind_str {
        "Create" => {
            let obj_val = object_val.ok_or_else(|| AppError::SchemaInvalid("Create missing object".into()))?;
            let obj_id = object_id_ref(Some(obj_val)).ok_or_else(|| AppError::SchemaInvalid("Create object missing id".into()))?;
            ActivityKind::Create(parse_object(obj_id, obj_val))
        }
        "Update" => {
            let obj_val = object_val.ok_or_else(|| AppError::SchemaInvalid("Update missing object".into()))?;
            let obj_id = object_id_ref(Some(obj_val)).ok_or_else(|| AppError::SchemaInvalid("Update object missing id".into()))?;
            ActivityKind::Update(parse_object(obj_id, obj_val))
        }
        "Delete" => {
            let object_id = object_id_ref(object_val).ok_or_else(|| AppError::SchemaInvalid("Delete missing object".into()))?;
            ActivityKind::Delete { object_id }
        }
        "Follow" => {
            let target_id = object_id_ref(object_val).ok_or_else(|| AppError::SchemaInvalid("Follow missing object".into()))?;
            ActivityKind::Follow { target_id }
        }
        "Accept" => {
            let follow_activity_id =
                object_id_ref(object_val).ok_or_else(|| AppError::SchemaInvalid("Accept missing object".into()))?;
            ActivityKind::Accept { follow_activity_id }
        }
        "Reject" => {
            let follow_activity_id =
                object_id_ref(object_val).ok_or_else(|| AppError::SchemaInvalid("Reject missing object".into()))?;
            ActivityKind::Reject { follow_activity_id }
        }
        "Announce" => {
            let object_id = object_id_ref(object_val).ok_or_else(|| AppError::SchemaInvalid("Announce missing object".into()))?;
            ActivityKind::Announce { object_id }
        }
        "Like" => {
            let object_id = object_id_ref(object_val).ok_or_else(|| AppError::SchemaInvalid("Like missing object".into()))?;
            ActivityKind::Like { object_id }
        }
        "Undo" => {
            let activity_id = object_id_ref(object_val).ok_or_else(|| AppError::SchemaInvalid("Undo missing object".into()))?;
            ActivityKind::Undo { activity_id }
        }
        "Move" => {
            let target_id = json
                .get("target")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| AppError::SchemaInvalid("Move missing target".into()))?;
            ActivityKind::Move { target_id }
        }
        "Add" => {
            let target_id = json.get("target").and_then(Value::as_str).unwrap_or_default().to_string();
            let object_id = object_id_ref(object_val).unwrap_or_default();
            ActivityKind::Add { target_id, object_id }
        }
        "Remove" => {
            let target_id = json.get("target").and_then(Value::as_str).unwrap_or_default().to_string();
            let object_id = object_id_ref(object_val).unwrap_or_default();
            ActivityKind::Remove { target_id, object_id }
        }
        "Block" => ActivityKind::Block,
        "Flag" => ActivityKind::Flag,
        other => ActivityKind::Unknown(other.to_string()),
    };

    Ok(InboundActivity { id, kind, actor_id, raw_body: raw_body.to_vec(), to, cc })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_create_note() {
        let body = json!({
            "id": "https://remote.example/activity/1",
            "type": "Create",
            "actor": "https://remote.example/user/bob",
            "to": ["https://www.w3.org/ns/activitystreams#Public"],
            "object": {
                "id": "https://remote.example/object/1",
                "type": "Note",
                "content": "hello",
                "to": ["https://www.w3.org/ns/activitystreams#Public"],
            }
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let parsed = parse_inbound_activity(&raw, &body).unwrap();
        assert_eq!(parsed.actor_id, "https://remote.example/user/bob");
        match parsed.kind {
            ActivityKind::Create(obj) => assert_eq!(obj.content, "hello"),
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_decodes_without_error() {
        let body = json!({
            "id": "https://remote.example/activity/2",
            "type": "IntransitiveActivity",
            "actor": "https://remote.example/user/bob",
        });
        let raw = serde_json::to_vec(&body).unwrap();
        let parsed = parse_inbound_activity(&raw, &body).unwrap();
        assert!(matches!(parsed.kind, ActivityKind::Unknown(ref k) if k == "IntransitiveActivity"));
    }

    #[test]
    fn follow_without_object_errors() {
        let body = json!({
            "id": "https://remote.example/activity/3",
            "type": "Follow",
            "actor": "https://remote.example/user/bob",
        });
        let raw = serde_json::to_vec(&body).unwrap();
        assert!(parse_inbound_activity(&raw, &body).is_err());
    }
}
