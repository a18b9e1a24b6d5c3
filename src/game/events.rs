//! Engine Events
//!
//! Timed state transitions emitted by the match engine. The rendering layer
//! animates in response to these; the engine never waits on an animation.

use serde::{Serialize, Deserialize};

use crate::game::card::CardId;
use crate::game::stats::GameStats;

/// Discrete feedback cue for the UI (sound, haptics, mascot reaction).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    /// A pair was matched.
    Success,
    /// A pair did not match.
    Error,
    /// The session was completed.
    Winner,
    /// The session was abandoned.
    Loser,
}

/// Event emitted by the match engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// All cards turned face-up for the preview window.
    PreviewStarted {
        /// Preview length (ms).
        duration_ms: u64,
    },

    /// Preview over, cards face-down, play clock started.
    PreviewEnded,

    /// A card was turned face-up by the player.
    CardFlipped {
        /// Flipped card.
        card_id: CardId,
    },

    /// A mismatched pair was turned back face-down.
    CardsHidden {
        /// The pair.
        pair: [CardId; 2],
    },

    /// A pair was confirmed as matched.
    PairMatched {
        /// The pair.
        pair: [CardId; 2],
    },

    /// Feedback cue.
    Feedback(Feedback),

    /// Selection buffer cleared; flips are accepted again.
    InputUnlocked,

    /// Every pair was found and the grace delay has elapsed.
    Completed(GameStats),
}

impl EngineEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreviewStarted { .. } => "preview_started",
            Self::PreviewEnded => "preview_ended",
            Self::CardFlipped { .. } => "card_flipped",
            Self::CardsHidden { .. } => "cards_hidden",
            Self::PairMatched { .. } => "pair_matched",
            Self::Feedback(_) => "feedback",
            Self::InputUnlocked => "input_unlocked",
            Self::Completed(_) => "completed",
        }
    }
}
