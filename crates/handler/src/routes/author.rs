//! Authoring endpoints: `say`/`whisper`/`dm`/`post`, `reply`, `edit`,
//! `delete` (spec §4.5, routed to §4.1).

use tootik_core::engine::types::{PostContent, PostVisibility};
use tootik_db::entities::actor;

use crate::response::Response;
use crate::HandlerState;

/// Visibility a posting command implies. `post` is a generic alias for
/// `say` (both public) since the spec names no further endpoint to pick a
/// visibility explicitly; see `DESIGN.md`.
#[must_use]
pub fn visibility_for_command(command: &str) -> Option<PostVisibility> {
    match command {
        "say" | "post" => Some(PostVisibility::Public),
        "whisper" => Some(PostVisibility::Followers),
        "dm" => Some(PostVisibility::Direct),
        _ => None,
    }
}

/// `/users/say|whisper|dm|post?<content>`.
pub async fn post(state: &HandlerState, author: &actor::Model, visibility: PostVisibility, content: Option<&str>) -> Response {
    let Some(text) = content.filter(|t| !t.is_empty()) else {
        return Response::Input("Post content".to_string());
    };
    let content = PostContent { text: text.to_string(), attachments: Vec::new(), poll: None };
    match state.engine.post(&author.id, content, visibility, None).await {
        Ok(object_id) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(&object_id))),
        Err(err) => err.into(),
    }
}

/// `/users/reply/<id>?<content>`. Replies are always addressed with the
/// poster's own default visibility plus whatever the parent inherits
/// (spec §4.1 `Post`); we use `Public` as that default, matching `say`.
pub async fn reply(state: &HandlerState, author: &actor::Model, parent_id: &str, content: Option<&str>) -> Response {
    let Some(text) = content.filter(|t| !t.is_empty()) else {
        return Response::Input("Reply content".to_string());
    };
    let content = PostContent { text: text.to_string(), attachments: Vec::new(), poll: None };
    match state.engine.post(&author.id, content, PostVisibility::Public, Some(parent_id)).await {
        Ok(object_id) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(&object_id))),
        Err(err) => err.into(),
    }
}

/// `/users/edit/<id>?<content>`.
pub async fn edit(state: &HandlerState, author: &actor::Model, object_id: &str, content: Option<&str>) -> Response {
    let Some(text) = content.filter(|t| !t.is_empty()) else {
        return Response::Input("New content".to_string());
    };
    match state.engine.edit(&author.id, object_id, text).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(object_id))),
        Err(err) => err.into(),
    }
}

/// `/users/delete/<id>`.
pub async fn delete(state: &HandlerState, author: &actor::Model, object_id: &str) -> Response {
    match state.engine.delete(&author.id, object_id).await {
        Ok(()) => Response::Redirect(format!("/users/outbox/{}", author.preferred_username)),
        Err(err) => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;

    use crate::test_support::{seed_local_actor, test_state};
    use super::*;

    #[tokio::test]
    async fn empty_post_content_prompts_for_input() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let resp = post(&state, &alice, PostVisibility::Public, Some("")).await;
        assert!(matches!(resp, Response::Input(_)));
    }

    #[tokio::test]
    async fn posting_redirects_to_the_new_post() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let resp = post(&state, &alice, PostVisibility::Public, Some("hello world")).await;
        assert!(matches!(resp, Response::Redirect(url) if url.starts_with("/users/view/")));
    }

    #[tokio::test]
    async fn editing_someone_elses_post_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let state = test_state(db);

        let object_id = state
            .engine
            .post(&alice.id, PostContent { text: "mine".to_string(), attachments: vec![], poll: None }, PostVisibility::Public, None)
            .await
            .unwrap();

        let resp = edit(&state, &bob, &object_id, Some("hijacked")).await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }

    #[tokio::test]
    async fn deleting_your_own_post_redirects_to_outbox() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let object_id = state
            .engine
            .post(&alice.id, PostContent { text: "bye".to_string(), attachments: vec![], poll: None }, PostVisibility::Public, None)
            .await
            .unwrap();

        let resp = delete(&state, &alice, &object_id).await;
        assert!(matches!(resp, Response::Redirect(url) if url == "/users/outbox/alice"));
    }
}
