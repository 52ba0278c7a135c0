//! The Activity Engine and its periodic background loops (spec §4, §5).

pub mod engine;
pub mod loops;

pub use engine::Engine;
