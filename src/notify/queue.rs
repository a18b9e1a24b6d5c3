//! Achievement Notification Queue
//!
//! Delivers unlocked achievements to the UI one at a time, in the order they
//! were enqueued. A single task owns the queue; callers talk to it through a
//! cloneable [`NotificationHandle`], so producers on any task can enqueue
//! without further locking.
//!
//! ## Delivery rules
//!
//! - At most one entry is visible at any instant.
//! - An entry stays visible until the UI reports it dismissed.
//! - After a dismissal the queue waits the settle delay before showing the
//!   next entry. Entries enqueued during the settle delay wait for it too.
//! - Nothing is dropped while the manager is running.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::session::gateway::Achievement;

/// Signal sent to the UI layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSignal {
    /// Show this achievement.
    Show(Achievement),
    /// The visible achievement was dismissed.
    Hide {
        /// Dismissed achievement id.
        achievement_id: String,
    },
}

/// A queued achievement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEntry {
    /// The achievement.
    pub achievement: Achievement,
    /// Currently on screen.
    pub visible: bool,
}

/// Point-in-time view of the queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Entries in delivery order; only the head can be visible.
    pub entries: Vec<NotificationEntry>,
    /// A settle delay is running.
    pub settling: bool,
    /// Entries shown so far.
    pub shown_total: u64,
}

impl QueueSnapshot {
    /// The visible entry.
    pub fn visible(&self) -> Option<&Achievement> {
        self.entries
            .iter()
            .find(|e| e.visible)
            .map(|e| &e.achievement)
    }

    /// Entries still waiting.
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| !e.visible).count()
    }
}

/// Notification queue errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// The manager task has stopped.
    #[error("notification queue is closed")]
    Closed,
}

enum Command {
    Enqueue(Achievement),
    Dismissed,
    Snapshot(oneshot::Sender<QueueSnapshot>),
}

/// Handle to a running [`NotificationQueueManager`].
#[derive(Clone, Debug)]
pub struct NotificationHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl NotificationHandle {
    /// Append an achievement to the queue.
    pub fn enqueue(&self, achievement: Achievement) -> Result<(), NotificationError> {
        self.tx
            .send(Command::Enqueue(achievement))
            .map_err(|_| NotificationError::Closed)
    }

    /// Report that the visible notification was dismissed.
    pub fn on_dismissed(&self) -> Result<(), NotificationError> {
        self.tx
            .send(Command::Dismissed)
            .map_err(|_| NotificationError::Closed)
    }

    /// Current queue contents.
    pub async fn snapshot(&self) -> Result<QueueSnapshot, NotificationError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(reply_tx))
            .map_err(|_| NotificationError::Closed)?;
        reply_rx.await.map_err(|_| NotificationError::Closed)
    }
}

/// Serializes delivery of achievement notifications.
pub struct NotificationQueueManager {
    settle_delay: Duration,
    queue: VecDeque<NotificationEntry>,
    settle_until: Option<Instant>,
    shown_total: u64,
    ui_tx: mpsc::UnboundedSender<NotificationSignal>,
}

impl NotificationQueueManager {
    /// Start the manager task.
    ///
    /// The task runs until every handle is dropped.
    pub fn spawn(
        config: &NotificationConfig,
        ui_tx: mpsc::UnboundedSender<NotificationSignal>,
    ) -> (NotificationHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            queue: VecDeque::new(),
            settle_until: None,
            shown_total: 0,
            ui_tx,
        };
        let task = tokio::spawn(manager.run(rx));
        (NotificationHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            let settle = self.settle_until;
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = async move {
                    match settle {
                        Some(deadline) => sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.settle_until = None;
                    self.promote_head();
                }
            }
        }

        if !self.queue.is_empty() {
            warn!(remaining = self.queue.len(), "notification queue closed with entries left");
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue(achievement) => self.enqueue(achievement),
            Command::Dismissed => self.on_dismissed(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn enqueue(&mut self, achievement: Achievement) {
        debug!(id = %achievement.id, queued = self.queue.len(), "notification enqueued");
        self.queue.push_back(NotificationEntry {
            achievement,
            visible: false,
        });
        self.promote_head();
    }

    fn on_dismissed(&mut self) {
        let head_visible = self.queue.front().is_some_and(|e| e.visible);
        if !head_visible {
            debug!("dismiss with nothing visible ignored");
            return;
        }

        if let Some(entry) = self.queue.pop_front() {
            let _ = self.ui_tx.send(NotificationSignal::Hide {
                achievement_id: entry.achievement.id,
            });
        }
        self.settle_until = Some(Instant::now() + self.settle_delay);
    }

    /// Show the head if nothing is visible and no settle delay is running.
    fn promote_head(&mut self) {
        if self.settle_until.is_some() {
            return;
        }
        let Some(head) = self.queue.front_mut() else {
            return;
        };
        if head.visible {
            return;
        }

        head.visible = true;
        self.shown_total += 1;
        info!(id = %head.achievement.id, title = %head.achievement.title, "showing achievement");
        if self.ui_tx.send(NotificationSignal::Show(head.achievement.clone())).is_err() {
            warn!("notification sink dropped");
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.queue.iter().cloned().collect(),
            settling: self.settle_until.is_some(),
            shown_total: self.shown_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn achievement(id: &str) -> Achievement {
        Achievement {
            id: id.to_string(),
            title: id.to_uppercase(),
            description: String::new(),
            points: 10,
            progress: 1,
            target: 1,
            unlocked: true,
            unlocked_at: None,
        }
    }

    fn start() -> (NotificationHandle, mpsc::UnboundedReceiver<NotificationSignal>) {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (handle, _task) = NotificationQueueManager::spawn(&NotificationConfig::default(), ui_tx);
        (handle, ui_rx)
    }

    fn shown_id(signal: Option<NotificationSignal>) -> String {
        match signal {
            Some(NotificationSignal::Show(a)) => a.id,
            other => panic!("expected show, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_while_idle_shows_immediately() {
        let (handle, mut ui) = start();
        handle.enqueue(achievement("a")).unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.visible().map(|a| a.id.as_str()), Some("a"));
        assert_eq!(shown_id(ui.recv().await), "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_enqueues_show_one_at_a_time() {
        let (handle, mut ui) = start();
        for id in ["a", "b", "c"] {
            handle.enqueue(achievement(id)).unwrap();
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.entries.iter().filter(|e| e.visible).count(), 1);
        assert_eq!(snapshot.pending(), 2);
        assert_eq!(shown_id(ui.recv().await), "a");

        for expected in ["b", "c"] {
            // nothing new appears without a dismissal
            tokio::time::sleep(Duration::from_secs(10)).await;
            assert!(ui.try_recv().is_err());

            handle.on_dismissed().unwrap();
            assert!(matches!(ui.recv().await, Some(NotificationSignal::Hide { .. })));

            let snapshot = handle.snapshot().await.unwrap();
            assert!(snapshot.settling);
            assert!(snapshot.visible().is_none());

            assert_eq!(shown_id(ui.recv().await), expected);
        }

        handle.on_dismissed().unwrap();
        assert!(matches!(ui.recv().await, Some(NotificationSignal::Hide { .. })));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.shown_total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_is_respected() {
        let (handle, mut ui) = start();
        handle.enqueue(achievement("a")).unwrap();
        handle.enqueue(achievement("b")).unwrap();
        assert_eq!(shown_id(ui.recv().await), "a");

        handle.on_dismissed().unwrap();
        assert!(matches!(ui.recv().await, Some(NotificationSignal::Hide { .. })));
        let hidden_at = Instant::now();

        assert_eq!(shown_id(ui.recv().await), "b");
        assert!(Instant::now() - hidden_at >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_during_settle_waits() {
        let (handle, mut ui) = start();
        handle.enqueue(achievement("a")).unwrap();
        assert_eq!(shown_id(ui.recv().await), "a");

        handle.on_dismissed().unwrap();
        assert!(matches!(ui.recv().await, Some(NotificationSignal::Hide { .. })));

        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.enqueue(achievement("late")).unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.visible().is_none());
        assert_eq!(snapshot.pending(), 1);

        assert_eq!(shown_id(ui.recv().await), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_with_nothing_visible_is_ignored() {
        let (handle, mut ui) = start();
        handle.on_dismissed().unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.settling);

        handle.enqueue(achievement("a")).unwrap();
        assert_eq!(shown_id(ui.recv().await), "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_producers_nothing_dropped() {
        let (handle, mut ui) = start();

        let mut producers = Vec::new();
        for p in 0..4 {
            let handle = handle.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..5 {
                    handle.enqueue(achievement(&format!("p{p}-{i}"))).unwrap();
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let mut shown = Vec::new();
        while shown.len() < 20 {
            match ui.recv().await {
                Some(NotificationSignal::Show(a)) => {
                    shown.push(a.id);
                    let snapshot = handle.snapshot().await.unwrap();
                    assert_eq!(snapshot.entries.iter().filter(|e| e.visible).count(), 1);
                    handle.on_dismissed().unwrap();
                }
                Some(NotificationSignal::Hide { .. }) => {}
                None => panic!("ui channel closed"),
            }
        }

        shown.sort();
        shown.dedup();
        assert_eq!(shown.len(), 20);
    }
}
