//! Endpoint dispatch (spec §4.5 step 3): matches the decoded path segments
//! against every endpoint named in the spec, plus the supplemental
//! engagement verbs (boost/like/bookmark/vote) the "notable endpoints" list
//! calls illustrative rather than exhaustive.

pub mod author;
pub mod certs;
pub mod feed;
pub mod social;
pub mod upload;
pub mod view;

use crate::request::Request;
use crate::response::Response;
use crate::session::Identity;
use crate::HandlerState;

/// Dispatch one fully-parsed request. `body` carries the Titan upload
/// payload, when present.
pub async fn dispatch(state: &HandlerState, identity: &Identity, req: &Request, body: Option<&[u8]>) -> Response {
    let segments = match req.segments() {
        Ok(s) => s,
        Err(err) => return err.into(),
    };
    let s0 = segments.first().map(String::as_str);
    let s1 = segments.get(1).map(String::as_str);
    let s2 = segments.get(2).map(String::as_str);
    let s3 = segments.get(3).map(String::as_str);

    // Reachable without an authenticated actor: the unauthenticated view
    // aliases and the registration flow (spec §4.5 steps 1-2).
    if s0 == Some("view") {
        return match s1 {
            Some(id) => view::view(state, identity.actor(), id).await,
            None => Response::TempFailure("Bad input: missing id".to_string()),
        };
    }
    if s0 == Some("users") && s1 == Some("view") {
        return match s2 {
            Some(id) => view::view(state, identity.actor(), id).await,
            None => Response::TempFailure("Bad input: missing id".to_string()),
        };
    }
    if s0 == Some("users") && s1 == Some("register") {
        return handle_register(state, identity, req).await;
    }

    if s0 != Some("users") {
        return Response::TempFailure("Not found".to_string());
    }

    let actor = match identity {
        Identity::Anonymous => return Response::CertRequired("A client certificate is required".to_string()),
        Identity::Pending { .. } => return Response::CertRejected("Client certificate is awaiting approval".to_string()),
        Identity::Unbound { .. } => return Response::Redirect("/users/register".to_string()),
        Identity::Bound { actor, .. } => actor,
    };

    match (s1, s2, s3) {
        (None, None, None) => feed::home(state, actor, req).await,
        (Some("inbox"), Some(date), None) => feed::inbox_day(state, req, date).await,
        (Some("firehose"), None, None) => feed::firehose(state, req).await,
        (Some("federated"), None, None) => feed::federated(state, req).await,
        (Some("local"), None, None) => feed::local(state, req).await,
        (Some("outbox"), Some(name), None) => feed::outbox(state, req, name).await,
        (Some("hashtag"), Some(tag), None) => view::hashtag(state, tag).await,
        (Some("fts"), None, None) => view::fts(state, req.query.as_deref()).await,

        (Some(cmd @ ("say" | "whisper" | "dm" | "post")), None, None) => {
            let visibility = author::visibility_for_command(cmd).expect("matched by the guard above");
            author::post(state, actor, visibility, req.query.as_deref()).await
        }
        (Some("reply"), Some(id), None) => author::reply(state, actor, id, req.query.as_deref()).await,
        (Some("edit"), Some(id), None) => author::edit(state, actor, id, req.query.as_deref()).await,
        (Some("delete"), Some(id), None) => author::delete(state, actor, id).await,

        (Some("follow"), Some(id), None) => social::follow(state, actor, id).await,
        (Some("unfollow"), Some(id), None) => social::unfollow(state, actor, id).await,
        (Some("resolve"), None, None) => social::resolve(state, &state.resolver, req.query.as_deref()).await,
        (Some("alias"), None, None) => social::alias(state, &state.resolver, actor, req.query.as_deref()).await,
        (Some("move"), None, None) => social::move_to(state, &state.resolver, actor, req.query.as_deref()).await,

        (Some("boost"), Some(id), None) => social::boost(state, actor, id).await,
        (Some("unboost"), Some(id), None) => social::unboost(state, actor, id).await,
        (Some("like"), Some(id), None) => social::like(state, actor, id).await,
        (Some("unlike"), Some(id), None) => social::unlike(state, actor, id).await,
        (Some("bookmark"), Some(id), None) => social::bookmark(state, actor, id).await,
        (Some("unbookmark"), Some(id), None) => social::unbookmark(state, actor, id).await,
        (Some("vote"), Some(id), None) => social::vote(state, actor, id, req.query.as_deref()).await,

        (Some("certificates"), Some("approve"), Some(fp)) => certs::approve(state, actor, fp).await,
        (Some("certificates"), Some("revoke"), Some(fp)) => certs::revoke(state, actor, fp).await,

        (Some("upload"), Some("avatar"), None) => match (&req.titan, body) {
            (Some(titan), Some(body)) => upload::avatar(state, actor, titan, body).await,
            _ => Response::TempFailure("Bad input: expected a Titan upload".to_string()),
        },

        _ => Response::TempFailure("Not found".to_string()),
    }
}

async fn handle_register(state: &HandlerState, identity: &Identity, req: &Request) -> Response {
    match identity {
        Identity::Bound { .. } => Response::TempFailure("Already registered".to_string()),
        Identity::Pending { .. } => Response::CertRejected("Client certificate is awaiting approval".to_string()),
        Identity::Anonymous => Response::CertRequired("A client certificate is required to register".to_string()),
        Identity::Unbound { fingerprint, suggested_name } => {
            let Some(query) = req.query.as_deref().filter(|q| !q.is_empty()) else {
                let prompt = suggested_name.as_deref().unwrap_or("username");
                return Response::Input(format!("Choose a username (suggested: {prompt})"));
            };
            let (username, invitation) = match query.split_once(';') {
                Some((name, invite)) => (name, Some(invite)),
                None => (query, None),
            };
            match crate::session::register(state, fingerprint, username, invitation).await {
                Ok(actor) => Response::Redirect(format!("/users/view/{}", crate::render::encode_id(&actor.id))),
                Err(err) => err.into(),
            }
        }
    }
}
