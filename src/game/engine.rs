//! Memory-Match Engine
//!
//! Owns the deck and the flip/evaluate/match state machine for one play
//! session:
//!
//! ```text
//! Idle ──build_deck──▶ Previewing ──preview timer──▶ Active ⇄ Evaluating ──▶ Completed
//! ```
//!
//! Commands take the current virtual time in milliseconds. Delayed steps are
//! scheduled on a [`TimerQueue`] and run by [`MatchEngine::advance`]; the
//! resulting transitions are collected as [`EngineEvent`]s and drained with
//! [`MatchEngine::take_events`].
//!
//! ## Input lock
//!
//! Once two cards are selected, no flip is accepted until the input-lock
//! timer fires. The full selection buffer is what prevents a fast third tap
//! from corrupting an evaluation in progress; there is no other lock.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::config::EngineConfig;
use crate::core::rng::DeterministicRng;
use crate::core::timer::{FiredTimer, Millis, TimerQueue};
use crate::game::card::{build_deck, Card, CardId, DeckError};
use crate::game::events::{EngineEvent, Feedback};
use crate::game::stats::GameStats;

/// Engine phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePhase {
    /// No deck.
    Idle,
    /// Deck built; cards shown during the preview window.
    Previewing,
    /// Accepting flips.
    Active,
    /// A pair is selected and being evaluated.
    Evaluating {
        /// The selected pair.
        pair: [CardId; 2],
    },
    /// Every pair found. Terminal until reset.
    Completed,
}

/// Why a flip was ignored. Ignored flips leave all counters unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoredReason {
    /// Engine is not accepting input.
    NotActive,
    /// No card with that id.
    UnknownCard,
    /// Card is already showing.
    AlreadyFaceUp,
    /// Card was already matched.
    AlreadyMatched,
    /// Two cards are already selected.
    SelectionFull,
}

/// Result of a flip command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipOutcome {
    /// Flip rejected.
    Ignored(IgnoredReason),
    /// First card of a pair revealed.
    Revealed,
    /// Second card revealed; the pair is now under evaluation.
    PairSelected {
        /// Whether the two symbols match.
        matched: bool,
    },
}

/// Engine command errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Deck construction failed.
    #[error(transparent)]
    Deck(#[from] DeckError),
    /// Command not valid in the current phase.
    #[error("invalid phase for command: {0:?}")]
    InvalidPhase(EnginePhase),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineTimer {
    EndPreview,
    ConfirmMatch([CardId; 2]),
    FlipBack([CardId; 2]),
    Unlock,
    CompletionGrace,
}

/// Memory-match state machine.
#[derive(Debug)]
pub struct MatchEngine {
    config: EngineConfig,
    phase: EnginePhase,
    deck: Vec<Card>,
    selection: Vec<CardId>,
    stats: GameStats,
    timers: TimerQueue<EngineTimer>,
    play_started_ms: Millis,
    events: Vec<EngineEvent>,
}

impl MatchEngine {
    /// Create an idle engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            phase: EnginePhase::Idle,
            deck: Vec::new(),
            selection: Vec::with_capacity(2),
            stats: GameStats::default(),
            timers: TimerQueue::new(),
            play_started_ms: 0,
            events: Vec::new(),
        }
    }

    /// Build a shuffled deck with two cards per symbol.
    ///
    /// Cancels every pending timer and resets all counters first, so this is
    /// safe to call mid-session.
    pub fn build_deck<S: AsRef<str>>(
        &mut self,
        symbols: &[S],
        rng: &mut DeterministicRng,
    ) -> Result<&[Card], EngineError> {
        self.reset();
        self.deck = build_deck(symbols, rng)?;
        self.phase = EnginePhase::Previewing;
        debug!(cards = self.deck.len(), "deck built");
        Ok(&self.deck)
    }

    /// Show every card face-up for `duration_ms`, then start play.
    pub fn start_preview(&mut self, now_ms: Millis, duration_ms: Millis) -> Result<(), EngineError> {
        if self.phase != EnginePhase::Previewing || !self.timers.is_empty() {
            return Err(EngineError::InvalidPhase(self.phase));
        }

        for card in &mut self.deck {
            card.face_up = true;
        }
        self.timers.schedule(now_ms, duration_ms, EngineTimer::EndPreview);
        self.events.push(EngineEvent::PreviewStarted { duration_ms });
        debug!(duration_ms, "preview started");
        Ok(())
    }

    /// Flip a card face-up.
    pub fn flip(&mut self, card_id: CardId, now_ms: Millis) -> FlipOutcome {
        if self.phase != EnginePhase::Active {
            return FlipOutcome::Ignored(IgnoredReason::NotActive);
        }
        if self.selection.len() >= 2 {
            return FlipOutcome::Ignored(IgnoredReason::SelectionFull);
        }
        let Some(card) = self.deck.get_mut(card_id) else {
            return FlipOutcome::Ignored(IgnoredReason::UnknownCard);
        };
        if !card.is_selectable() {
            let reason = if card.matched {
                IgnoredReason::AlreadyMatched
            } else {
                IgnoredReason::AlreadyFaceUp
            };
            return FlipOutcome::Ignored(reason);
        }

        card.face_up = true;
        self.stats.flip_count += 1;
        self.selection.push(card_id);
        self.events.push(EngineEvent::CardFlipped { card_id });

        if self.selection.len() < 2 {
            return FlipOutcome::Revealed;
        }

        let pair = [self.selection[0], self.selection[1]];
        let matched = self.deck[pair[0]].symbol == self.deck[pair[1]].symbol;
        self.stats.record_attempt(matched);
        self.phase = EnginePhase::Evaluating { pair };

        if matched {
            self.timers
                .schedule(now_ms, self.config.match_confirm_ms, EngineTimer::ConfirmMatch(pair));
        } else {
            self.timers
                .schedule(now_ms, self.config.mismatch_flip_back_ms, EngineTimer::FlipBack(pair));
        }
        self.timers.schedule(now_ms, self.config.input_lock_ms, EngineTimer::Unlock);

        debug!(?pair, matched, attempts = self.stats.total_attempts, "pair selected");
        FlipOutcome::PairSelected { matched }
    }

    /// Run every timer due at or before `now_ms`.
    pub fn advance(&mut self, now_ms: Millis) {
        while let Some(fired) = self.timers.pop_due(now_ms) {
            self.fire(fired);
        }
    }

    fn fire(&mut self, fired: FiredTimer<EngineTimer>) {
        let at = fired.due_ms;
        match fired.kind {
            EngineTimer::EndPreview => {
                for card in &mut self.deck {
                    card.face_up = false;
                }
                self.play_started_ms = at;
                self.phase = EnginePhase::Active;
                self.events.push(EngineEvent::PreviewEnded);
                debug!(at, "preview ended, play clock started");
            }
            EngineTimer::ConfirmMatch(pair) => {
                for id in pair {
                    self.deck[id].matched = true;
                }
                self.stats.matches_found += 1;
                self.events.push(EngineEvent::PairMatched { pair });
                self.events.push(EngineEvent::Feedback(Feedback::Success));

                if self.all_matched() {
                    self.stats.completion_time_ms = at.saturating_sub(self.play_started_ms);
                    self.timers
                        .schedule(at, self.config.completion_grace_ms, EngineTimer::CompletionGrace);
                    debug!(time_ms = self.stats.completion_time_ms, "all pairs found");
                }
            }
            EngineTimer::FlipBack(pair) => {
                for id in pair {
                    self.deck[id].face_up = false;
                }
                self.events.push(EngineEvent::CardsHidden { pair });
                self.events.push(EngineEvent::Feedback(Feedback::Error));
            }
            EngineTimer::Unlock => {
                self.selection.clear();
                if matches!(self.phase, EnginePhase::Evaluating { .. }) {
                    self.phase = EnginePhase::Active;
                }
                self.events.push(EngineEvent::InputUnlocked);
            }
            EngineTimer::CompletionGrace => {
                self.phase = EnginePhase::Completed;
                self.events.push(EngineEvent::Completed(self.stats.clone()));
                debug!(flips = self.stats.flip_count, errors = self.stats.errors, "engine completed");
            }
        }
    }

    /// Discard the deck, counters and every pending timer.
    pub fn reset(&mut self) {
        self.timers.cancel_all();
        self.deck.clear();
        self.selection.clear();
        self.stats = GameStats::default();
        self.play_started_ms = 0;
        self.events.clear();
        self.phase = EnginePhase::Idle;
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.timers.next_deadline()
    }

    /// Current phase.
    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// The deck.
    pub fn deck(&self) -> &[Card] {
        &self.deck
    }

    /// Cards currently selected.
    pub fn selection(&self) -> &[CardId] {
        &self.selection
    }

    /// Live counters.
    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    /// Pairs on the board.
    pub fn total_pairs(&self) -> u32 {
        (self.deck.len() / 2) as u32
    }

    /// Time play started (end of preview).
    pub fn play_started_ms(&self) -> Millis {
        self.play_started_ms
    }

    /// True while flips are being rejected by the input lock.
    pub fn is_input_locked(&self) -> bool {
        matches!(self.phase, EnginePhase::Evaluating { .. })
    }

    fn all_matched(&self) -> bool {
        !self.deck.is_empty() && self.stats.matches_found == self.total_pairs()
    }
}

// =============================================================================
// TESTS
// =============================================================================
