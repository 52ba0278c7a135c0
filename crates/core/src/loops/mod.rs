//! Periodic background loops the scheduler in `tootik-server` drives
//! (spec §5). Loops that need an outbound HTTP client (actor refresh,
//! delivery/inbox workers) live in `tootik-federation`/`tootik-queue`
//! instead, since this crate has no network dependency.

pub mod gc;
pub mod mover;
pub mod poll_tally;
