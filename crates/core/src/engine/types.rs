//! DTOs the Activity Engine's public operations accept and return. The wire
//! (JSON-LD) shapes live in `tootik-federation`; this crate only knows about
//! plain Rust values so it never depends on the federation layer.

use chrono::{DateTime, Utc};

/// Visibility the caller requests when authoring a post (spec §4.1 `Post`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostVisibility {
    /// Public + followers.
    Public,
    /// Followers only.
    Followers,
    /// Explicit mentions only.
    Direct,
}

/// A media attachment reference.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub url: String,
    pub media_type: String,
}

/// A poll to attach to a new post.
#[derive(Debug, Clone)]
pub struct PollSpec {
    pub options: Vec<String>,
    pub multiple: bool,
    pub closes_at: DateTime<Utc>,
}

/// Inputs to [`crate::engine::Engine::post`] and
/// [`crate::engine::Engine::edit`].
#[derive(Debug, Clone)]
pub struct PostContent {
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub poll: Option<PollSpec>,
}

/// The outcome of an inbound `Apply` call, for metrics and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied and changed local state.
    Applied,
    /// A no-op: the activity id was already processed.
    DuplicateIgnored,
    /// A no-op: an Update/Delete arrived for an object with a newer stored
    /// `updated` timestamp (spec §4.1 ordering rule).
    Stale,
    /// Forwarded to local followers without being otherwise applied
    /// (spec §4.4 reply forwarding).
    Forwarded,
    /// Recognized type, nothing to do (e.g. unknown/ignored activity type,
    /// spec §9 "unknown types are a no-op variant logged at info level").
    Ignored,
}

/// One fully-parsed inbound `ActivityPub` envelope, as `tootik-federation`
/// hands it to [`crate::engine::Engine::apply`] after signature
/// verification. `raw_body` is the exact bytes received, preserved for
/// reply forwarding without re-signing (spec §4.4, §9).
#[derive(Debug, Clone)]
pub struct InboundActivity {
    pub id: String,
    pub kind: ActivityKind,
    pub actor_id: String,
    pub raw_body: Vec<u8>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

/// The tagged-variant dispatch for `Apply` (spec §9 "Activity dispatch as
/// tagged variants").
#[derive(Debug, Clone)]
pub enum ActivityKind {
    Create(InboundObject),
    Update(InboundObject),
    Delete { object_id: String },
    Follow { target_id: String },
    Accept { follow_activity_id: String },
    Reject { follow_activity_id: String },
    Announce { object_id: String },
    Undo { activity_id: String },
    Like { object_id: String },
    Move { target_id: String },
    Add { target_id: String, object_id: String },
    Remove { target_id: String, object_id: String },
    Block,
    Flag,
    /// A recognized but unhandled type (spec §9: logged at info, no-op).
    Unknown(String),
}

/// The `Note`/`Question` payload carried by a Create/Update.
#[derive(Debug, Clone)]
pub struct InboundObject {
    pub id: String,
    pub content: String,
    pub in_reply_to: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub tag: Vec<String>,
    pub updated: DateTime<Utc>,
    pub is_poll: bool,
}
