//! Core deterministic primitives.
//!
//! Seeded randomness for deck layout and a virtual-time timer queue for the
//! engine's fixed delays. Nothing here reads the wall clock.

pub mod rng;
pub mod timer;

// Re-export core types
pub use rng::DeterministicRng;
pub use timer::{FiredTimer, Millis, TimerQueue};
