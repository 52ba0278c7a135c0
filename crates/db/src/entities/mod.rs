//! `SeaORM` entities for the tootik data model (spec §3).

pub mod activity;
pub mod actor;
pub mod bookmark;
pub mod certificate;
pub mod delivery_item;
pub mod follow_edge;
pub mod hashtag;
pub mod inbox_item;
pub mod invitation;
pub mod like;
pub mod object;
pub mod poll_option;
pub mod registration_attempt;
pub mod share;
pub mod vote;
