//! Feed views: `/users`, `/users/inbox/<date>`, `/users/firehose`,
//! `/users/federated`, `/users/local` (spec §4.5).

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use tootik_db::entities::{actor, object};
use tootik_db::repositories::{ActorRepository, FollowRepository, ObjectRepository};

use crate::render;
use crate::request::{parse_offset, Request};
use crate::response::Response;
use crate::HandlerState;

const PAGE_SIZE: u64 = 20;

async fn resolve_authors(state: &HandlerState, posts: Vec<object::Model>) -> Vec<(object::Model, actor::Model)> {
    let mut out = Vec::with_capacity(posts.len());
    for post in posts {
        if let Ok(Some(author)) = ActorRepository.find_by_id(&state.db, &post.attributed_to).await {
            out.push((post, author));
        }
    }
    out
}

fn checked_offset(state: &HandlerState, query: Option<&str>) -> Result<u64, Response> {
    let offset = parse_offset(query).map_err(|_| Response::TempFailure("Invalid query".to_string()))?;
    if offset > state.config.limits.max_offset {
        return Err(Response::TempFailure(format!("Offset must be <= {}", state.config.limits.max_offset)));
    }
    Ok(offset)
}

/// Home feed: the viewer's own posts plus everyone they follow (`/users`).
pub async fn home(state: &HandlerState, viewer: &actor::Model, req: &Request) -> Response {
    let offset = match checked_offset(state, req.query.as_deref()) {
        Ok(o) => o,
        Err(r) => return r,
    };
    let following = match FollowRepository.list_following(&state.db, &viewer.id).await {
        Ok(edges) => edges,
        Err(err) => return err.into(),
    };
    let mut author_ids: Vec<String> = following.into_iter().filter(|f| f.accepted).map(|f| f.followed_id).collect();
    author_ids.push(viewer.id.clone());

    match ObjectRepository.find_by_authors_page(&state.db, &author_ids, offset, PAGE_SIZE).await {
        Ok(posts) => {
            let rendered = resolve_authors(state, posts).await;
            Response::Success(render::feed_page("Home", "/users", &rendered, offset, PAGE_SIZE))
        }
        Err(err) => err.into(),
    }
}

pub async fn firehose(state: &HandlerState, req: &Request) -> Response {
    let offset = match checked_offset(state, req.query.as_deref()) {
        Ok(o) => o,
        Err(r) => return r,
    };
    match ObjectRepository.find_firehose_page(&state.db, offset, PAGE_SIZE).await {
        Ok(posts) => {
            let rendered = resolve_authors(state, posts).await;
            Response::Success(render::feed_page("Firehose", "/users/firehose", &rendered, offset, PAGE_SIZE))
        }
        Err(err) => err.into(),
    }
}

pub async fn federated(state: &HandlerState, req: &Request) -> Response {
    let offset = match checked_offset(state, req.query.as_deref()) {
        Ok(o) => o,
        Err(r) => return r,
    };
    match ObjectRepository.find_federated_page(&state.db, offset, PAGE_SIZE).await {
        Ok(posts) => {
            let rendered = resolve_authors(state, posts).await;
            Response::Success(render::feed_page("Federated", "/users/federated", &rendered, offset, PAGE_SIZE))
        }
        Err(err) => err.into(),
    }
}

pub async fn local(state: &HandlerState, req: &Request) -> Response {
    let offset = match checked_offset(state, req.query.as_deref()) {
        Ok(o) => o,
        Err(r) => return r,
    };
    match ObjectRepository.find_local_page(&state.db, offset, PAGE_SIZE).await {
        Ok(posts) => {
            let rendered = resolve_authors(state, posts).await;
            Response::Success(render::feed_page("Local", "/users/local", &rendered, offset, PAGE_SIZE))
        }
        Err(err) => err.into(),
    }
}

/// `/users/outbox/<name>`: one local author's own posts, newest first
/// (spec §4.5; §8 scenario 1's `delete` redirects here after removing a post).
pub async fn outbox(state: &HandlerState, req: &Request, name: &str) -> Response {
    let author = match ActorRepository.find_local_by_username(&state.db, &state.config.server.domain, name).await {
        Ok(Some(author)) => author,
        Ok(None) => return Response::TempFailure(format!("No such user: {name}")),
        Err(err) => return err.into(),
    };
    let offset = match checked_offset(state, req.query.as_deref()) {
        Ok(o) => o,
        Err(r) => return r,
    };
    match ObjectRepository.find_by_authors_page(&state.db, std::slice::from_ref(&author.id), offset, PAGE_SIZE).await {
        Ok(posts) => {
            let rendered = resolve_authors(state, posts).await;
            let base = format!("/users/outbox/{name}");
            Response::Success(render::feed_page(&format!("{name}'s posts"), &base, &rendered, offset, PAGE_SIZE))
        }
        Err(err) => err.into(),
    }
}

/// `/users/inbox/<date|today|yesterday>`: one UTC day's worth of received
/// objects. Rejects a future date with a redirect to an error page, and a
/// date that doesn't parse with `BadInput` (spec §4.5, §8).
pub async fn inbox_day(state: &HandlerState, req: &Request, date_segment: &str) -> Response {
    let today = Utc::now().date_naive();
    let day = match date_segment {
        "today" => today,
        "yesterday" => today - ChronoDuration::days(1),
        other => match NaiveDate::parse_from_str(other, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => return Response::TempFailure("Bad input: unparseable date".to_string()),
        },
    };
    if day > today {
        return Response::Redirect("/users/error/future-date".to_string());
    }

    let offset = match checked_offset(state, req.query.as_deref()) {
        Ok(o) => o,
        Err(r) => return r,
    };
    let day_start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let day_end = day_start + ChronoDuration::days(1);

    match ObjectRepository.find_by_day_page(&state.db, day_start, day_end, offset, PAGE_SIZE).await {
        Ok(posts) => {
            let rendered = resolve_authors(state, posts).await;
            let base = format!("/users/inbox/{date_segment}");
            Response::Success(render::feed_page(&format!("Inbox for {day}"), &base, &rendered, offset, PAGE_SIZE))
        }
        Err(err) => err.into(),
    }
}
