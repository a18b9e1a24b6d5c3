//! Game Session Controller
//!
//! Wraps a [`MatchEngine`] for one activity session. Tracks the session-wide
//! [`GameStats`], finalizes the score when the board is cleared, reports the
//! result to the [`AchievementGateway`] and routes unlocked achievements to
//! the notification queue.
//!
//! The controller is UI-agnostic: commands come in as method calls, and
//! everything the player should see goes out as [`UiEvent`]s on a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::rng::DeterministicRng;
use crate::core::timer::Millis;
use crate::game::card::{Card, CardId};
use crate::game::engine::{EngineError, EnginePhase, FlipOutcome, MatchEngine};
use crate::game::events::{EngineEvent, Feedback};
use crate::game::scoring::{
    calculate_efficiency, calculate_stars, check_bonus_qualification, max_time_ms,
    BonusQualification,
};
use crate::game::stats::GameStats;
use crate::notify::queue::NotificationHandle;
use crate::session::gateway::{AchievementGateway, CompletionSummary, GatewayError};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Activity type reported for memory-match sessions.
pub const MEMORY_MATCH_ACTIVITY: &str = "memory-match";

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Deck built, preview not started.
    Ready,
    /// Preview or play in progress.
    Playing,
    /// Board cleared and score finalized.
    Completed,
    /// Player left after confirming.
    Abandoned,
}

/// Event for the UI layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiEvent {
    /// Board transition to animate.
    Engine(EngineEvent),
    /// Feedback cue.
    Feedback(Feedback),
    /// Final score for the results screen.
    ScoreFinalized {
        /// Finalized stats.
        stats: GameStats,
        /// Bonus earned.
        bonus: BonusQualification,
    },
    /// Progress could not be saved. Dismissible; play is unaffected.
    PersistenceWarning {
        /// Human readable reason.
        message: String,
    },
    /// Leaving now would lose progress; ask the player first.
    ConfirmExit,
    /// A fresh board was dealt.
    SessionReset,
}

/// Answer to an exit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Nothing to lose; leave now.
    Exit,
    /// Wait for [`GameSessionController::confirm_exit`] or
    /// [`GameSessionController::cancel_exit`].
    ConfirmRequired,
}

/// Outcome of a completion report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Reported; this many achievements were queued.
    Delivered(usize),
    /// The gateway failed; a warning was shown.
    Failed(GatewayError),
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Engine rejected the command.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Command not valid in the current state.
    #[error("invalid session state: {0:?}")]
    InvalidState(SessionState),
    /// Score requested before the board was cleared.
    #[error("session not finished")]
    NotFinished,
    /// Nothing has been reported yet.
    #[error("no completion to report")]
    NothingToReport,
    /// The last completion already reached the gateway.
    #[error("completion already reported")]
    AlreadyReported,
    /// The session runner has stopped.
    #[error("session runner closed")]
    RunnerClosed,
}

/// What the session is built from.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    /// Lesson the symbols come from.
    pub lesson_id: String,
    /// Activity type reported to the gateway.
    pub activity_type: String,
    /// Unique symbols; each becomes a pair.
    pub symbols: Vec<String>,
}

impl SessionSetup {
    /// Memory-match setup for a lesson.
    pub fn memory_match(lesson_id: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            activity_type: MEMORY_MATCH_ACTIVITY.to_string(),
            symbols,
        }
    }
}

/// External collaborators of a session.
#[derive(Clone)]
pub struct SessionCollaborators {
    /// Achievement persistence.
    pub gateway: Arc<dyn AchievementGateway>,
    /// Notification queue.
    pub notifications: NotificationHandle,
    /// UI event sink.
    pub ui: mpsc::UnboundedSender<UiEvent>,
}

/// Controller for one activity session.
pub struct GameSessionController {
    id: SessionId,
    config: EngineConfig,
    setup: SessionSetup,
    engine: MatchEngine,
    rng: DeterministicRng,
    stats: GameStats,
    state: SessionState,
    game_started: bool,
    used_help: bool,
    exit_pending: bool,
    previous_stars: Option<u8>,
    completions: u32,
    last_report: Option<PendingReport>,
    collaborators: SessionCollaborators,
}

/// Last completion summary and whether the gateway accepted it.
struct PendingReport {
    summary: CompletionSummary,
    delivered: Arc<AtomicBool>,
}

impl GameSessionController {
    /// Create a session and deal its first board.
    pub fn new(
        config: EngineConfig,
        setup: SessionSetup,
        collaborators: SessionCollaborators,
    ) -> Result<Self, SessionError> {
        let id = uuid::Uuid::new_v4().into_bytes();
        let rng = DeterministicRng::for_session(&id, &setup.lesson_id);
        Self::with_rng(id, config, setup, collaborators, rng)
    }

    /// Create a session with a fixed id and deck RNG.
    pub fn with_rng(
        id: SessionId,
        config: EngineConfig,
        setup: SessionSetup,
        collaborators: SessionCollaborators,
        mut rng: DeterministicRng,
    ) -> Result<Self, SessionError> {
        let mut engine = MatchEngine::new(config.clone());
        engine.build_deck(&setup.symbols, &mut rng)?;

        info!(
            session = %uuid::Uuid::from_bytes(id),
            lesson = %setup.lesson_id,
            pairs = engine.total_pairs(),
            "session created"
        );

        Ok(Self {
            id,
            config,
            setup,
            engine,
            rng,
            stats: GameStats::default(),
            state: SessionState::Ready,
            game_started: false,
            used_help: false,
            exit_pending: false,
            previous_stars: None,
            completions: 0,
            last_report: None,
            collaborators,
        })
    }

    /// Start the preview; play begins when it ends.
    pub fn start_game(&mut self, now_ms: Millis) -> Result<(), SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::InvalidState(self.state));
        }
        self.engine.start_preview(now_ms, self.config.preview_ms)?;
        self.state = SessionState::Playing;
        self.game_started = true;
        self.drain_engine();
        Ok(())
    }

    /// Flip a card.
    pub fn flip(&mut self, card_id: CardId, now_ms: Millis) -> FlipOutcome {
        let outcome = self.engine.flip(card_id, now_ms);
        if let FlipOutcome::Ignored(reason) = outcome {
            debug!(card_id, ?reason, "flip ignored");
        }
        self.drain_engine();
        outcome
    }

    /// Run engine timers due at or before `now_ms`.
    ///
    /// Returns the report task if this advance completed the session.
    pub fn advance(&mut self, now_ms: Millis) -> Option<JoinHandle<ReportOutcome>> {
        self.engine.advance(now_ms);
        if self.drain_engine() {
            match self.complete_game() {
                Ok(task) => return Some(task),
                Err(e) => warn!(error = %e, "completion failed"),
            }
        }
        None
    }

    /// Earliest pending engine timer.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.engine.next_deadline()
    }

    /// Mark that the player asked for help.
    pub fn use_hint(&mut self) {
        if self.state == SessionState::Playing {
            self.used_help = true;
        }
    }

    /// Forward engine events to the UI and mirror counters.
    ///
    /// Returns true if the engine reported completion.
    fn drain_engine(&mut self) -> bool {
        let mut completed = false;
        for event in self.engine.take_events() {
            debug!(event = event.name(), "engine event");
            match event {
                EngineEvent::Feedback(feedback) => self.emit(UiEvent::Feedback(feedback)),
                EngineEvent::Completed(_) => completed = true,
                other => self.emit(UiEvent::Engine(other)),
            }
        }
        if self.state == SessionState::Playing {
            self.stats = self.engine.stats().clone();
        }
        completed
    }

    /// Finalize the score and report it.
    ///
    /// The winner feedback and final score go to the UI before the gateway is
    /// called; the report runs on its own task and never blocks the player.
    pub fn complete_game(&mut self) -> Result<JoinHandle<ReportOutcome>, SessionError> {
        if self.state != SessionState::Playing {
            return Err(SessionError::InvalidState(self.state));
        }
        if self.engine.phase() != EnginePhase::Completed {
            return Err(SessionError::NotFinished);
        }

        let total_pairs = self.engine.total_pairs();
        let mut stats = self.engine.stats().clone();
        stats.stars = calculate_stars(
            stats.errors,
            stats.flip_count,
            stats.completion_time_ms,
            total_pairs,
        );
        stats.efficiency_percent = calculate_efficiency(total_pairs, stats.flip_count);
        let bonus = check_bonus_qualification(&stats, total_pairs);

        self.completions += 1;
        let summary = CompletionSummary {
            completion_id: format!("{}-{}", uuid::Uuid::from_bytes(self.id), self.completions),
            stars: stats.stars,
            is_perfect: stats.perfect_run,
            completion_time_ms: stats.completion_time_ms,
            errors: stats.errors,
            activity_type: self.setup.activity_type.clone(),
            showed_improvement: self.previous_stars.is_some_and(|prev| stats.stars > prev),
            used_help: self.used_help,
            took_time: stats.completion_time_ms >= max_time_ms(total_pairs),
        };

        info!(
            stars = stats.stars,
            efficiency = stats.efficiency_percent,
            errors = stats.errors,
            time_ms = stats.completion_time_ms,
            ?bonus,
            "session completed"
        );

        self.stats = stats.clone();
        self.state = SessionState::Completed;
        self.previous_stars = Some(stats.stars);

        self.emit(UiEvent::Feedback(Feedback::Winner));
        self.emit(UiEvent::ScoreFinalized { stats, bonus });

        let delivered = Arc::new(AtomicBool::new(false));
        self.last_report = Some(PendingReport {
            summary: summary.clone(),
            delivered: delivered.clone(),
        });
        Ok(self.spawn_report(summary, delivered))
    }

    /// Send the last completion report again after a failure.
    ///
    /// Refused once the gateway has accepted the report.
    pub fn retry_report(&self) -> Result<JoinHandle<ReportOutcome>, SessionError> {
        let report = self
            .last_report
            .as_ref()
            .ok_or(SessionError::NothingToReport)?;
        if report.delivered.load(Ordering::SeqCst) {
            return Err(SessionError::AlreadyReported);
        }
        Ok(self.spawn_report(report.summary.clone(), report.delivered.clone()))
    }

    fn spawn_report(
        &self,
        summary: CompletionSummary,
        delivered: Arc<AtomicBool>,
    ) -> JoinHandle<ReportOutcome> {
        let collaborators = self.collaborators.clone();
        tokio::spawn(report_completion(collaborators, summary, delivered))
    }

    /// Deal a fresh board and clear all counters.
    ///
    /// Pending timers of the old board are cancelled, so nothing from the
    /// previous deal can fire into the new one.
    pub fn reset_game(&mut self) -> Result<(), SessionError> {
        self.engine.reset();
        self.engine.build_deck(&self.setup.symbols, &mut self.rng)?;
        self.stats = GameStats::default();
        self.state = SessionState::Ready;
        self.game_started = false;
        self.used_help = false;
        self.exit_pending = false;
        debug!("session reset");
        self.emit(UiEvent::SessionReset);
        Ok(())
    }

    /// Ask to leave the session.
    ///
    /// Unfinished progress is never discarded silently: if the player has
    /// made an attempt, the UI is asked to confirm first.
    pub fn request_exit(&mut self) -> ExitDecision {
        if self.state == SessionState::Playing && self.stats.total_attempts > 0 {
            self.exit_pending = true;
            self.emit(UiEvent::ConfirmExit);
            ExitDecision::ConfirmRequired
        } else {
            ExitDecision::Exit
        }
    }

    /// The player confirmed leaving.
    pub fn confirm_exit(&mut self) -> Result<(), SessionError> {
        if !self.exit_pending {
            return Err(SessionError::InvalidState(self.state));
        }
        self.exit_pending = false;
        self.engine.reset();
        self.state = SessionState::Abandoned;
        info!(attempts = self.stats.total_attempts, "session abandoned");
        self.emit(UiEvent::Feedback(Feedback::Loser));
        Ok(())
    }

    /// The player chose to keep playing.
    pub fn cancel_exit(&mut self) {
        self.exit_pending = false;
    }

    fn emit(&self, event: UiEvent) {
        if self.collaborators.ui.send(event).is_err() {
            debug!("ui sink dropped");
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session stats; finalized once completed.
    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    /// The board.
    pub fn deck(&self) -> &[Card] {
        self.engine.deck()
    }

    /// Underlying engine.
    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    /// True once the preview was started.
    pub fn game_started(&self) -> bool {
        self.game_started
    }

    /// An exit confirmation is outstanding.
    pub fn exit_pending(&self) -> bool {
        self.exit_pending
    }
}

/// Report a completion and queue what it unlocked.
async fn report_completion(
    collaborators: SessionCollaborators,
    summary: CompletionSummary,
    delivered: Arc<AtomicBool>,
) -> ReportOutcome {
    match collaborators.gateway.record_completion(&summary).await {
        Ok(achievements) => {
            delivered.store(true, Ordering::SeqCst);
            let count = achievements.len();
            for achievement in achievements {
                info!(id = %achievement.id, points = achievement.points, "achievement unlocked");
                if let Err(e) = collaborators.notifications.enqueue(achievement) {
                    warn!(error = %e, "could not queue achievement notification");
                }
            }
            ReportOutcome::Delivered(count)
        }
        Err(e) => {
            warn!(error = %e, "failed to record completion");
            let warning = UiEvent::PersistenceWarning {
                message: "Your progress could not be saved right now.".to_string(),
            };
            if collaborators.ui.send(warning).is_err() {
                debug!("ui sink dropped");
            }
            ReportOutcome::Failed(e)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
