//! Delivery and inbox worker pools (spec §4.3, §4.4, §5): at-least-once,
//! DB-polling background processing that drives traffic through the
//! signing/verification primitives in `tootik-federation` and the Activity
//! Engine in `tootik-core`. There is no external job broker — the `SQLite`
//! tables `delivery_item` and `inbox_item` themselves are the queue (spec
//! §B design decision: a single-process embedded server has no need for a
//! separate broker process).

pub mod actor_refresher;
pub mod backoff;
pub mod delivery;
pub mod inbox;

pub use actor_refresher::spawn_actor_refresher;
pub use backoff::BackoffConfig;
pub use delivery::spawn_delivery_workers;
pub use inbox::spawn_inbox_workers;
