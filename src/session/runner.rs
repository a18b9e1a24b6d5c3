//! Real-Time Session Runner
//!
//! Drives a [`GameSessionController`] against the tokio clock. The runner task
//! is the only writer of the controller: UI commands arrive over a channel
//! and engine timers are serviced by sleeping until the next deadline, so
//! the engine sees the same single-threaded ordering it would in a UI event
//! loop, even on a multi-threaded runtime.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, instrument, warn};

use crate::core::timer::Millis;
use crate::game::card::{Card, CardId};
use crate::game::engine::{EnginePhase, FlipOutcome};
use crate::game::stats::GameStats;
use crate::session::controller::{
    ExitDecision, GameSessionController, SessionError, SessionState,
};

/// Read-only view of a running session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Lifecycle state.
    pub state: SessionState,
    /// Engine phase.
    pub phase: EnginePhase,
    /// Board.
    pub deck: Vec<Card>,
    /// Counters.
    pub stats: GameStats,
    /// Preview started.
    pub game_started: bool,
}

/// Command for the runner task.
#[derive(Debug)]
pub enum RunnerCommand {
    /// Start the preview.
    Start(oneshot::Sender<Result<(), SessionError>>),
    /// Flip a card.
    Flip(CardId, oneshot::Sender<FlipOutcome>),
    /// Player asked for a hint.
    UseHint,
    /// Deal a fresh board.
    Reset(oneshot::Sender<Result<(), SessionError>>),
    /// Player wants to leave.
    RequestExit(oneshot::Sender<ExitDecision>),
    /// Player confirmed leaving.
    ConfirmExit(oneshot::Sender<Result<(), SessionError>>),
    /// Player chose to stay.
    CancelExit,
    /// Retry a failed completion report.
    RetryReport,
    /// Read the current state.
    Snapshot(oneshot::Sender<SessionSnapshot>),
    /// Stop the runner and hand the controller back.
    Shutdown,
}

/// Handle to a running session.
#[derive(Clone, Debug)]
pub struct RunnerHandle {
    tx: mpsc::Sender<RunnerCommand>,
}

impl RunnerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RunnerCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(build(reply_tx)).await?;
        reply_rx.await.map_err(|_| SessionError::RunnerClosed)
    }

    async fn send(&self, cmd: RunnerCommand) -> Result<(), SessionError> {
        self.tx.send(cmd).await.map_err(|_| SessionError::RunnerClosed)
    }

    /// Start the preview.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(RunnerCommand::Start).await?
    }

    /// Flip a card.
    pub async fn flip(&self, card_id: CardId) -> Result<FlipOutcome, SessionError> {
        self.request(|reply| RunnerCommand::Flip(card_id, reply)).await
    }

    /// Record hint usage.
    pub async fn use_hint(&self) -> Result<(), SessionError> {
        self.send(RunnerCommand::UseHint).await
    }

    /// Deal a fresh board.
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.request(RunnerCommand::Reset).await?
    }

    /// Ask to leave.
    pub async fn request_exit(&self) -> Result<ExitDecision, SessionError> {
        self.request(RunnerCommand::RequestExit).await
    }

    /// Confirm leaving.
    pub async fn confirm_exit(&self) -> Result<(), SessionError> {
        self.request(RunnerCommand::ConfirmExit).await?
    }

    /// Stay in the session.
    pub async fn cancel_exit(&self) -> Result<(), SessionError> {
        self.send(RunnerCommand::CancelExit).await
    }

    /// Retry a failed completion report.
    pub async fn retry_report(&self) -> Result<(), SessionError> {
        self.send(RunnerCommand::RetryReport).await
    }

    /// Current state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(RunnerCommand::Snapshot).await
    }

    /// Stop the runner.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(RunnerCommand::Shutdown).await
    }
}

/// Owns a controller and runs it in real time.
pub struct SessionRunner {
    controller: GameSessionController,
    origin: Instant,
}

impl SessionRunner {
    /// Spawn the runner task.
    ///
    /// The task ends on [`RunnerCommand::Shutdown`] or when every handle is
    /// dropped, and yields the controller back.
    pub fn spawn(controller: GameSessionController) -> (RunnerHandle, JoinHandle<GameSessionController>) {
        let (tx, rx) = mpsc::channel(64);
        let runner = Self {
            controller,
            origin: Instant::now(),
        };
        (RunnerHandle { tx }, tokio::spawn(runner.run(rx)))
    }

    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }

    #[instrument(skip_all)]
    async fn run(mut self, mut rx: mpsc::Receiver<RunnerCommand>) -> GameSessionController {
        loop {
            let deadline = self
                .controller
                .next_deadline()
                .map(|ms| self.origin + Duration::from_millis(ms));

            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(RunnerCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                _ = async move {
                    match deadline {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => {
                    // a completion report runs detached; its outcome reaches the UI as events
                    let now = self.now_ms();
                    self.controller.advance(now);
                }
            }
        }

        debug!("session runner stopped");
        self.controller
    }

    fn handle(&mut self, cmd: RunnerCommand) {
        let now = self.now_ms();
        // timers due before this command must run first
        self.controller.advance(now);

        match cmd {
            RunnerCommand::Start(reply) => {
                let _ = reply.send(self.controller.start_game(now));
            }
            RunnerCommand::Flip(card_id, reply) => {
                let _ = reply.send(self.controller.flip(card_id, now));
            }
            RunnerCommand::UseHint => self.controller.use_hint(),
            RunnerCommand::Reset(reply) => {
                let _ = reply.send(self.controller.reset_game());
            }
            RunnerCommand::RequestExit(reply) => {
                let _ = reply.send(self.controller.request_exit());
            }
            RunnerCommand::ConfirmExit(reply) => {
                let _ = reply.send(self.controller.confirm_exit());
            }
            RunnerCommand::CancelExit => self.controller.cancel_exit(),
            RunnerCommand::RetryReport => {
                if let Err(e) = self.controller.retry_report() {
                    warn!(error = %e, "retry ignored");
                }
            }
            RunnerCommand::Snapshot(reply) => {
                let _ = reply.send(SessionSnapshot {
                    state: self.controller.state(),
                    phase: self.controller.engine().phase(),
                    deck: self.controller.deck().to_vec(),
                    stats: self.controller.stats().clone(),
                    game_started: self.controller.game_started(),
                });
            }
            RunnerCommand::Shutdown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{EngineConfig, NotificationConfig};
    use crate::core::rng::DeterministicRng;
    use crate::game::events::Feedback;
    use crate::notify::queue::{NotificationQueueManager, NotificationSignal};
    use crate::session::controller::{SessionCollaborators, SessionSetup, UiEvent};
    use crate::session::gateway::InMemoryGateway;

    fn spawn_session(
        symbols: &[&str],
    ) -> (
        RunnerHandle,
        JoinHandle<GameSessionController>,
        mpsc::UnboundedReceiver<UiEvent>,
        mpsc::UnboundedReceiver<NotificationSignal>,
    ) {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (notifications, _) = NotificationQueueManager::spawn(&NotificationConfig::default(), signal_tx);

        let controller = GameSessionController::with_rng(
            [3; 16],
            EngineConfig::default(),
            SessionSetup::memory_match("shapes", symbols.iter().map(|s| s.to_string()).collect()),
            SessionCollaborators {
                gateway: Arc::new(InMemoryGateway::default()),
                notifications,
                ui: ui_tx,
            },
            DeterministicRng::new(11),
        )
        .unwrap();

        let (handle, task) = SessionRunner::spawn(controller);
        (handle, task, ui_rx, signal_rx)
    }

    fn pair_ids(deck: &[Card], symbol: &str) -> [CardId; 2] {
        let ids: Vec<_> = deck.iter().filter(|c| c.symbol == symbol).map(|c| c.id).collect();
        [ids[0], ids[1]]
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_ends_in_real_time() {
        let (handle, _task, _ui, _signals) = spawn_session(&["circle", "square"]);
        handle.start().await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, EnginePhase::Previewing);
        assert!(snapshot.deck.iter().all(|c| c.face_up));

        tokio::time::sleep(Duration::from_millis(4001)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, EnginePhase::Active);
        assert!(snapshot.deck.iter().all(|c| !c.face_up));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_taps_are_locked_out() {
        let (handle, _task, _ui, _signals) = spawn_session(&["circle", "square"]);
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(4001)).await;

        let deck = handle.snapshot().await.unwrap().deck;
        let [c1, _] = pair_ids(&deck, "circle");
        let [s1, s2] = pair_ids(&deck, "square");

        assert_eq!(handle.flip(c1).await.unwrap(), FlipOutcome::Revealed);
        assert_eq!(handle.flip(s1).await.unwrap(), FlipOutcome::PairSelected { matched: false });
        assert!(matches!(handle.flip(s2).await.unwrap(), FlipOutcome::Ignored(_)));

        tokio::time::sleep(Duration::from_millis(1201)).await;
        assert_eq!(handle.flip(s2).await.unwrap(), FlipOutcome::Revealed);

        let stats = handle.snapshot().await.unwrap().stats;
        assert_eq!(stats.flip_count, 3);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_session_through_runner() {
        let (handle, task, mut ui, mut signals) = spawn_session(&["circle", "square"]);
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(4001)).await;

        let deck = handle.snapshot().await.unwrap().deck;
        for symbol in ["circle", "square"] {
            let [a, b] = pair_ids(&deck, symbol);
            handle.flip(a).await.unwrap();
            handle.flip(b).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1201)).await;
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Completed);
        assert_eq!(snapshot.stats.stars, 3);

        let mut saw_winner = false;
        while let Ok(event) = ui.try_recv() {
            saw_winner |= event == UiEvent::Feedback(Feedback::Winner);
        }
        assert!(saw_winner);

        assert!(matches!(signals.recv().await, Some(NotificationSignal::Show(_))));

        handle.shutdown().await.unwrap();
        let controller = task.await.unwrap();
        assert_eq!(controller.state(), SessionState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_runner_reports_error() {
        let (handle, task, _ui, _signals) = spawn_session(&["circle"]);
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(matches!(handle.flip(0).await, Err(SessionError::RunnerClosed)));
    }
}
