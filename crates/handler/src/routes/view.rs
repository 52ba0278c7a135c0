//! Post view, hashtag and full-text search (spec §4.5).

use tootik_db::entities::actor;
use tootik_db::repositories::{ActorRepository, HashtagRepository, ObjectRepository};

use crate::render;
use crate::response::Response;
use crate::HandlerState;

const SEARCH_LIMIT: u64 = 50;

/// `/users/view/<id>`, `/view/<id>`: a post and its direct, visible replies.
/// Visibility is enforced by `find_visible` (spec §3); a deleted parent does
/// not hide an otherwise-visible reply (spec §4.5, §8).
pub async fn view(state: &HandlerState, viewer: Option<&actor::Model>, object_id: &str) -> Response {
    let obj = match ObjectRepository.find_visible(&state.db, object_id).await {
        Ok(Some(obj)) => obj,
        Ok(None) => return Response::TempFailure("Post not found".to_string()),
        Err(err) => return err.into(),
    };
    if !is_visible_to(&obj, viewer) {
        return Response::TempFailure("Post not found".to_string());
    }
    let author = match ActorRepository.find_by_id(&state.db, &obj.attributed_to).await {
        Ok(Some(a)) => a,
        Ok(None) => return Response::TempFailure("author no longer available".to_string()),
        Err(err) => return err.into(),
    };
    let replies = match ObjectRepository.find_replies(&state.db, &obj.id).await {
        Ok(r) => r,
        Err(err) => return err.into(),
    };
    let mut rendered_replies = Vec::with_capacity(replies.len());
    for reply in replies {
        if !is_visible_to(&reply, viewer) {
            continue;
        }
        if let Ok(Some(reply_author)) = ActorRepository.find_by_id(&state.db, &reply.attributed_to).await {
            rendered_replies.push((reply, reply_author));
        }
    }
    Response::Success(render::post_view(&obj, &author, &rendered_replies))
}

/// Unauthenticated viewers may only see public posts; an authenticated
/// viewer may additionally see anything addressed to them directly (spec
/// §4.5 "unauthenticated users can see only public posts").
fn is_visible_to(obj: &tootik_db::entities::object::Model, viewer: Option<&actor::Model>) -> bool {
    let to: Vec<String> = serde_json::from_str(&obj.to).unwrap_or_default();
    let cc: Vec<String> = serde_json::from_str(&obj.cc).unwrap_or_default();
    const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";
    if to.iter().chain(cc.iter()).any(|a| a == PUBLIC) {
        return true;
    }
    let Some(viewer) = viewer else { return false };
    if viewer.id == obj.attributed_to {
        return true;
    }
    to.iter().chain(cc.iter()).any(|a| a == &viewer.id)
}

/// `/users/hashtag/<tag>`: case-insensitive lookup, original casing
/// preserved in storage (spec §4.5, §8 scenario 5).
pub async fn hashtag(state: &HandlerState, tag: &str) -> Response {
    if tag.is_empty() {
        return Response::Input("Hashtag to search for".to_string());
    }
    match HashtagRepository.find_objects_by_tag(&state.db, &tag.to_lowercase(), SEARCH_LIMIT).await {
        Ok(posts) => {
            let mut rendered = Vec::with_capacity(posts.len());
            for post in posts {
                if let Ok(Some(author)) = ActorRepository.find_by_id(&state.db, &post.attributed_to).await {
                    rendered.push((post, author));
                }
            }
            Response::Success(render::feed_page(&format!("#{tag}"), &format!("/users/hashtag/{tag}"), &rendered, 0, SEARCH_LIMIT))
        }
        Err(err) => err.into(),
    }
}

/// `/users/fts?<q>`: a simple substring search (spec §4.5). Empty input
/// prompts for a query rather than erroring.
pub async fn fts(state: &HandlerState, query: Option<&str>) -> Response {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Response::Input("Search query".to_string());
    };
    match ObjectRepository.search_content(&state.db, query, SEARCH_LIMIT).await {
        Ok(posts) => {
            let mut rendered = Vec::with_capacity(posts.len());
            for post in posts {
                if let Ok(Some(author)) = ActorRepository.find_by_id(&state.db, &post.attributed_to).await {
                    rendered.push((post, author));
                }
            }
            Response::Success(render::feed_page("Search results", "/users/fts", &rendered, 0, SEARCH_LIMIT))
        }
        Err(err) => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;
    use tootik_core::engine::types::{PostContent, PostVisibility};

    use crate::test_support::{seed_local_actor, test_state};
    use super::*;

    #[tokio::test]
    async fn owner_sees_their_own_direct_post_but_a_stranger_does_not() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let state = test_state(db);

        let content = PostContent { text: format!("hey @{}", bob.preferred_username), attachments: vec![], poll: None };
        let object_id = state.engine.post(&alice.id, content, PostVisibility::Direct, None).await.unwrap();

        let as_stranger = view(&state, None, &object_id).await;
        assert!(matches!(as_stranger, Response::TempFailure(_)));

        let as_author = view(&state, Some(&alice), &object_id).await;
        assert!(matches!(as_author, Response::Success(_)));
    }

    #[tokio::test]
    async fn public_post_is_visible_to_anonymous_viewers() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let content = PostContent { text: "hello world".to_string(), attachments: vec![], poll: None };
        let object_id = state.engine.post(&alice.id, content, PostVisibility::Public, None).await.unwrap();

        let resp = view(&state, None, &object_id).await;
        let Response::Success(body) = resp else { panic!("expected success") };
        assert!(body.contains("hello world"));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let db = in_memory_db().await.unwrap();
        let state = test_state(db);

        let resp = view(&state, None, "https://example.test/object/nope").await;
        assert!(matches!(resp, Response::TempFailure(msg) if msg == "Post not found"));
    }

    #[tokio::test]
    async fn hashtag_search_is_case_insensitive() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);
        state
            .engine
            .post(&alice.id, PostContent { text: "loving #RustLang today".to_string(), attachments: vec![], poll: None }, PostVisibility::Public, None)
            .await
            .unwrap();

        let resp = hashtag(&state, "rustlang").await;
        let Response::Success(body) = resp else { panic!("expected success") };
        assert!(body.contains("loving"));
    }

    #[tokio::test]
    async fn empty_fts_query_prompts_for_input() {
        let db = in_memory_db().await.unwrap();
        let state = test_state(db);
        let resp = fts(&state, Some("")).await;
        assert!(matches!(resp, Response::Input(_)));
    }
}
