//! `ActivityPub` federation I/O (spec §4.2): the HTTP client, request
//! signature primitives, remote actor resolution and caching, and the wire
//! (`JSON-LD`) encode/decode boundary between the outside world and the
//! plain Rust DTOs `tootik-core`'s Activity Engine works with.
//!
//! Everything in this crate is read-mostly or stateless: the delivery and
//! inbox worker loops that actually drive traffic through it live in
//! `tootik-queue`, and the HTTP surface exposed here is deliberately thin —
//! the inbox route's only job is to capture raw bytes, never to verify or
//! apply them inline (spec §4.4, §9).

pub mod cache;
pub mod client;
pub mod document;
pub mod http;
pub mod inbound;
pub mod resolver;
pub mod signature;
pub mod verify;

pub use cache::{CachedRemoteActor, RemoteActorCache};
pub use client::{ApClient, DeliveryOutcome};
pub use http::{federation_router, FederationState};
pub use inbound::parse_inbound_activity;
pub use resolver::ActorResolver;
pub use verify::verify_inbox_item;
