//! Game Logic Module
//!
//! Memory-match rules. Deterministic: no wall clock, no I/O.
//!
//! ## Module Structure
//!
//! - `card`: cards and deck construction
//! - `stats`: per-session counters
//! - `scoring`: stars, efficiency, bonus qualification
//! - `events`: timed transitions and feedback cues
//! - `engine`: flip/evaluate/match state machine

pub mod card;
pub mod stats;
pub mod scoring;
pub mod events;
pub mod engine;

// Re-export key types
pub use card::{Card, CardId, DeckError};
pub use stats::GameStats;
pub use scoring::BonusQualification;
pub use events::{EngineEvent, Feedback};
pub use engine::{EnginePhase, FlipOutcome, IgnoredReason, MatchEngine};
