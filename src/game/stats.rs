//! Session Statistics

use serde::{Serialize, Deserialize};

use crate::core::timer::Millis;

/// Counters for one play session.
///
/// `total_attempts`, `errors`, `flip_count` and `matches_found` move during
/// play. `stars` and `efficiency_percent` are only written when the session
/// is finalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    /// Pairs the player has turned over.
    pub total_attempts: u32,
    /// Pairs that did not match.
    pub errors: u32,
    /// Star rating, 0-3.
    pub stars: u8,
    /// Active play time, preview excluded.
    pub completion_time_ms: Millis,
    /// No error made so far.
    pub perfect_run: bool,
    /// Pairs found.
    pub matches_found: u32,
    /// Individual card flips.
    pub flip_count: u32,
    /// Minimum flips as a percentage of actual flips.
    pub efficiency_percent: u32,
}

impl Default for GameStats {
    fn default() -> Self {
        Self {
            total_attempts: 0,
            errors: 0,
            stars: 0,
            completion_time_ms: 0,
            perfect_run: true,
            matches_found: 0,
            flip_count: 0,
            efficiency_percent: 0,
        }
    }
}

impl GameStats {
    /// Record a selected pair.
    pub fn record_attempt(&mut self, matched: bool) {
        self.total_attempts += 1;
        if !matched {
            self.errors += 1;
            self.perfect_run = false;
        }
    }
}
