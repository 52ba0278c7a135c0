//! Follow graph, identity migration, and the small engagement verbs
//! (boost/like/bookmark/vote) routed to §4.1. The `<id>` path segments these
//! take are bare actor/object ids with the scheme stripped (spec §4.5
//! "accepts the actor URL without the scheme").

use tootik_db::entities::actor;
use tootik_federation::ActorResolver;

use crate::response::Response;
use crate::HandlerState;

/// Re-attach a `https://` scheme to an id a client sent without one (spec
/// §4.5 `/users/follow/<id>` "accepts the actor URL without the scheme").
fn with_scheme(id: &str) -> String {
    if id.starts_with("http://") || id.starts_with("https://") {
        id.to_string()
    } else {
        format!("https://{id}")
    }
}

/// Split a `user@host` handle into its parts.
fn split_handle(handle: &str) -> Option<(&str, &str)> {
    let handle = handle.trim_start_matches('@');
    handle.split_once('@')
}

pub async fn follow(state: &HandlerState, follower: &actor::Model, target_id: &str) -> Response {
    match state.engine.follow(&follower.id, &with_scheme(target_id)).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(&with_scheme(target_id)))),
        Err(err) => err.into(),
    }
}

pub async fn unfollow(state: &HandlerState, follower: &actor::Model, target_id: &str) -> Response {
    match state.engine.unfollow(&follower.id, &with_scheme(target_id)).await {
        Ok(()) => Response::Redirect("/users".to_string()),
        Err(err) => err.into(),
    }
}

/// `/users/resolve?<handle>` (spec §4.2, §4.5): resolves `user@host` and
/// redirects to the resolved actor's outbox.
pub async fn resolve(state: &HandlerState, resolver: &ActorResolver, handle: Option<&str>) -> Response {
    let Some(handle) = handle.filter(|h| !h.is_empty()) else {
        return Response::Input("Handle to resolve (user@host)".to_string());
    };
    let Some((user, host)) = split_handle(handle) else {
        return Response::TempFailure("Bad input: expected user@host".to_string());
    };
    match resolver.resolve_handle(&state.db, user, host).await {
        Ok(actor) => Response::Redirect(actor.outbox_url.unwrap_or(actor.id)),
        Err(err) => err.into(),
    }
}

/// `/users/alias?<handle>`: record this actor's `alsoKnownAs` entry for the
/// resolved actor (spec §4.1 `Move` invariant, step one of two).
pub async fn alias(state: &HandlerState, resolver: &ActorResolver, actor_model: &actor::Model, handle: Option<&str>) -> Response {
    let Some(handle) = handle.filter(|h| !h.is_empty()) else {
        return Response::Input("Handle to alias (user@host)".to_string());
    };
    let Some((user, host)) = split_handle(handle) else {
        return Response::TempFailure("Bad input: expected user@host".to_string());
    };
    let other = match resolver.resolve_handle(&state.db, user, host).await {
        Ok(a) => a,
        Err(err) => return err.into(),
    };
    match state.engine.add_alias(&actor_model.id, &other.id).await {
        Ok(()) => Response::Success("Alias recorded.\r\n".to_string()),
        Err(err) => err.into(),
    }
}

/// `/users/move?<handle>`: complete the migration, provided the resolved
/// target already reciprocates the alias (spec §4.1 `Move`).
pub async fn move_to(state: &HandlerState, resolver: &ActorResolver, actor_model: &actor::Model, handle: Option<&str>) -> Response {
    let Some(handle) = handle.filter(|h| !h.is_empty()) else {
        return Response::Input("Handle to move to (user@host)".to_string());
    };
    let Some((user, host)) = split_handle(handle) else {
        return Response::TempFailure("Bad input: expected user@host".to_string());
    };
    let target = match resolver.resolve_handle(&state.db, user, host).await {
        Ok(a) => a,
        Err(err) => return err.into(),
    };
    match state.engine.move_actor(&actor_model.id, &target.id).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(&target.id))),
        Err(err) => err.into(),
    }
}

pub async fn boost(state: &HandlerState, actor_model: &actor::Model, object_id: &str) -> Response {
    match state.engine.announce(&actor_model.id, object_id).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(object_id))),
        Err(err) => err.into(),
    }
}

pub async fn unboost(state: &HandlerState, actor_model: &actor::Model, object_id: &str) -> Response {
    match state.engine.undo_announce(&actor_model.id, object_id).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(object_id))),
        Err(err) => err.into(),
    }
}

pub async fn like(state: &HandlerState, actor_model: &actor::Model, object_id: &str) -> Response {
    match state.engine.like(&actor_model.id, object_id).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(object_id))),
        Err(err) => err.into(),
    }
}

pub async fn unlike(state: &HandlerState, actor_model: &actor::Model, object_id: &str) -> Response {
    match state.engine.unlike(&actor_model.id, object_id).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(object_id))),
        Err(err) => err.into(),
    }
}

pub async fn bookmark(state: &HandlerState, actor_model: &actor::Model, object_id: &str) -> Response {
    match state.engine.bookmark(&actor_model.id, object_id).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(object_id))),
        Err(err) => err.into(),
    }
}

pub async fn unbookmark(state: &HandlerState, actor_model: &actor::Model, object_id: &str) -> Response {
    match state.engine.unbookmark(&actor_model.id, object_id).await {
        Ok(()) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(object_id))),
        Err(err) => err.into(),
    }
}

/// `/users/vote/<poll_id>?<option>`.
pub async fn vote(state: &HandlerState, actor_model: &actor::Model, poll_id: &str, option: Option<&str>) -> Response {
    let Some(option) = option.filter(|o| !o.is_empty()) else {
        return Response::Input("Option to vote for".to_string());
    };
    match state.engine.vote(&actor_model.id, poll_id, option).await {
        Ok(_) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(poll_id))),
        Err(err) => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use tootik_db::test_utils::in_memory_db;
    use tootik_core::engine::types::{PostContent, PostVisibility};

    use crate::test_support::{seed_local_actor, test_state};
    use super::*;

    #[test]
    fn with_scheme_leaves_a_url_alone_but_adds_https_to_a_bare_host() {
        assert_eq!(with_scheme("https://remote.test/user/bob"), "https://remote.test/user/bob");
        assert_eq!(with_scheme("remote.test/user/bob"), "https://remote.test/user/bob");
    }

    #[test]
    fn split_handle_tolerates_a_leading_at_sign() {
        assert_eq!(split_handle("@bob@remote.test"), Some(("bob", "remote.test")));
        assert_eq!(split_handle("bob@remote.test"), Some(("bob", "remote.test")));
        assert_eq!(split_handle("not-a-handle"), None);
    }

    #[tokio::test]
    async fn follow_then_unfollow_a_local_actor() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let state = test_state(db);

        let bare_id = bob.id.trim_start_matches("https://").to_string();
        let resp = follow(&state, &alice, &bare_id).await;
        assert!(matches!(resp, Response::Redirect(url) if url.contains(&crate::render::encode_id(&bob.id))));

        let resp = unfollow(&state, &alice, &bare_id).await;
        assert!(matches!(resp, Response::Redirect(url) if url == "/users"));
    }

    #[tokio::test]
    async fn following_yourself_is_rejected() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let bare_id = alice.id.trim_start_matches("https://").to_string();
        let resp = follow(&state, &alice, &bare_id).await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }

    #[tokio::test]
    async fn boost_and_unboost_a_public_post() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let state = test_state(db);
        let object_id = state
            .engine
            .post(&alice.id, PostContent { text: "boost me".to_string(), attachments: vec![], poll: None }, PostVisibility::Public, None)
            .await
            .unwrap();

        let resp = boost(&state, &bob, &object_id).await;
        assert!(matches!(resp, Response::Redirect(_)));
        let resp = unboost(&state, &bob, &object_id).await;
        assert!(matches!(resp, Response::Redirect(_)));
    }

    #[tokio::test]
    async fn like_and_unlike_a_public_post() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let state = test_state(db);
        let object_id = state
            .engine
            .post(&alice.id, PostContent { text: "like me".to_string(), attachments: vec![], poll: None }, PostVisibility::Public, None)
            .await
            .unwrap();

        let resp = like(&state, &bob, &object_id).await;
        assert!(matches!(resp, Response::Redirect(_)));
        let resp = unlike(&state, &bob, &object_id).await;
        assert!(matches!(resp, Response::Redirect(_)));
    }

    #[tokio::test]
    async fn bookmark_and_unbookmark_a_public_post() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let bob = seed_local_actor(&db, "bob").await;
        let state = test_state(db);
        let object_id = state
            .engine
            .post(&alice.id, PostContent { text: "bookmark me".to_string(), attachments: vec![], poll: None }, PostVisibility::Public, None)
            .await
            .unwrap();

        let resp = bookmark(&state, &bob, &object_id).await;
        assert!(matches!(resp, Response::Redirect(_)));
        let resp = unbookmark(&state, &bob, &object_id).await;
        assert!(matches!(resp, Response::Redirect(_)));
    }

    #[tokio::test]
    async fn resolve_with_no_handle_prompts_for_input() {
        let db = in_memory_db().await.unwrap();
        let state = test_state(db);
        let resp = resolve(&state, &state.resolver, None).await;
        assert!(matches!(resp, Response::Input(_)));
    }

    #[tokio::test]
    async fn resolve_with_a_handle_missing_at_host_is_bad_input() {
        let db = in_memory_db().await.unwrap();
        let state = test_state(db);
        let resp = resolve(&state, &state.resolver, Some("not-a-handle")).await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }

    #[tokio::test]
    async fn alias_with_no_handle_prompts_for_input() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);
        let resp = alias(&state, &state.resolver, &alice, None).await;
        assert!(matches!(resp, Response::Input(_)));
    }

    #[tokio::test]
    async fn move_to_with_a_handle_missing_at_host_is_bad_input() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);
        let resp = move_to(&state, &state.resolver, &alice, Some("not-a-handle")).await;
        assert!(matches!(resp, Response::TempFailure(_)));
    }

    #[tokio::test]
    async fn voting_with_no_option_prompts_for_input() {
        let db = in_memory_db().await.unwrap();
        let alice = seed_local_actor(&db, "alice").await;
        let state = test_state(db);

        let resp = vote(&state, &alice, "https://example.test/object/not-a-poll", None).await;
        assert!(matches!(resp, Response::Input(_)));
    }
}
