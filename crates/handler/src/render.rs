//! Gemtext rendering (spec §6 `20 text/gemini`): link lines (`=> url label`),
//! headings (`# `) and plain body text. No corpus precedent renders
//! gemtext — these are the minimal building blocks the line-protocol
//! response body is assembled from.

use tootik_db::entities::{actor, object};

/// A rendered `=> url label` line.
#[must_use]
pub fn link(url: &str, label: &str) -> String {
    format!("=> {url} {label}\r\n")
}

#[must_use]
pub fn heading(text: &str) -> String {
    format!("# {text}\r\n")
}

#[must_use]
pub fn line(text: &str) -> String {
    format!("{text}\r\n")
}

/// Render one post's author line, content, and a permalink, for use inside
/// a feed listing.
#[must_use]
pub fn post_summary(obj: &object::Model, author: &actor::Model) -> String {
    let mut out = String::new();
    out.push_str(&line(&format!("{} ({})", author.preferred_username, obj.created_at.to_rfc3339())));
    for content_line in obj.content.lines() {
        out.push_str(&line(content_line));
    }
    out.push_str(&link(&format!("/users/view/{}", encode_id(&obj.id)), "view thread"));
    out.push('\r');
    out.push('\n');
    out
}

/// Render a feed page: a heading, each post via [`post_summary`], and a
/// `next page` link when the page appears full (spec §4.5 feed pagination).
#[must_use]
pub fn feed_page(title: &str, base_path: &str, posts: &[(object::Model, actor::Model)], offset: u64, limit: u64) -> String {
    let mut out = heading(title);
    if posts.is_empty() {
        out.push_str(&line("Nothing here."));
        return out;
    }
    for (obj, author) in posts {
        out.push_str(&post_summary(obj, author));
    }
    if posts.len() as u64 == limit {
        out.push_str(&link(&format!("{base_path}?{}", offset + limit), "next page"));
    }
    out
}

/// Render a single post plus its direct, visible replies (spec §4.5
/// `/users/view/<id>`).
#[must_use]
pub fn post_view(obj: &object::Model, author: &actor::Model, replies: &[(object::Model, actor::Model)]) -> String {
    let mut out = heading(&format!("{}'s post", author.preferred_username));
    out.push_str(&post_summary(obj, author));
    if !replies.is_empty() {
        out.push_str(&heading("Replies"));
        for (reply, reply_author) in replies {
            out.push_str(&post_summary(reply, reply_author));
        }
    }
    out
}

/// Path-safe encoding of an object/actor id for embedding in a `=>` link:
/// ids are full URLs, so they must not be split by the path router. We
/// reuse the percent-decode-compatible escaping already used for requests.
#[must_use]
pub fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_and_heading_and_line_end_with_crlf() {
        assert_eq!(link("/x", "label"), "=> /x label\r\n");
        assert_eq!(heading("Home"), "# Home\r\n");
        assert_eq!(line("hi"), "hi\r\n");
    }

    #[test]
    fn encode_id_escapes_reserved_characters_but_not_alphanumerics() {
        let encoded = encode_id("https://example.com/user/a_b-c.d~e");
        assert_eq!(encoded, "https%3A%2F%2Fexample.com%2Fuser%2Fa_b-c.d~e");
    }

    #[test]
    fn feed_page_with_no_posts_says_nothing_here() {
        let out = feed_page("Home", "/users", &[], 0, 20);
        assert!(out.contains("Nothing here."));
    }

    #[test]
    fn feed_page_adds_next_page_link_only_when_full() {
        let author = sample_actor();
        let posts: Vec<_> = (0..3).map(|i| (sample_object(&author.id, &format!("post {i}")), author.clone())).collect();

        let full_page = feed_page("Home", "/users", &posts, 0, 3);
        assert!(full_page.contains("next page"));

        let partial_page = feed_page("Home", "/users", &posts, 0, 20);
        assert!(!partial_page.contains("next page"));
    }

    #[test]
    fn post_view_includes_replies_section_only_when_there_are_replies() {
        let author = sample_actor();
        let post = sample_object(&author.id, "original");

        let no_replies = post_view(&post, &author, &[]);
        assert!(!no_replies.contains("Replies"));

        let reply = sample_object(&author.id, "a reply");
        let with_replies = post_view(&post, &author, &[(reply, author.clone())]);
        assert!(with_replies.contains("Replies"));
        assert!(with_replies.contains("a reply"));
    }

    fn sample_actor() -> actor::Model {
        let now = chrono::Utc::now();
        actor::Model {
            id: "https://example.test/user/alice".to_string(),
            local: true,
            preferred_username: "alice".to_string(),
            domain: "example.test".to_string(),
            actor_type: "Person".to_string(),
            display_name: None,
            summary: None,
            avatar_url: None,
            inbox_url: "https://example.test/user/alice/inbox".to_string(),
            shared_inbox_url: None,
            outbox_url: None,
            followers_url: None,
            public_key_pem: "pem".to_string(),
            private_key_pem: None,
            key_algorithm: "rsa".to_string(),
            moved_to: None,
            also_known_as: None,
            gone: false,
            first_cert_fingerprint: None,
            created_at: now,
            updated_at: now,
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

    fn sample_object(author_id: &str, content: &str) -> object::Model {
        let now = chrono::Utc::now();
        object::Model {
            id: format!("https://example.test/object/{}", content.len()),
            local: true,
            attributed_to: author_id.to_string(),
            in_reply_to: None,
            content: content.to_string(),
            to: "[]".to_string(),
            cc: "[]".to_string(),
            audience: None,
            bto: None,
            bcc: None,
            tag: None,
            attachment: None,
            is_poll: false,
            poll_closes_at: None,
            poll_multiple: false,
            raw_activity: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
