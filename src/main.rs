//! Memory Match Demo
//!
//! Plays one scripted memory-match session end to end: deck, preview,
//! a player who remembers every card it sees, scoring, achievement reporting and
//! notification delivery.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use memory_match::{
    Config, VERSION,
    game::card::{Card, CardId},
    notify::queue::{NotificationQueueManager, NotificationSignal},
    session::controller::{
        GameSessionController, ReportOutcome, SessionCollaborators, SessionSetup, UiEvent,
    },
    session::gateway::InMemoryGateway,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("loading config")?;

    info!("Memory Match Engine v{}", VERSION);
    info!("Preview: {} ms, input lock: {} ms", config.engine.preview_ms, config.engine.input_lock_ms);

    demo_session(&config).await
}

/// Run a scripted session on virtual time.
async fn demo_session(config: &Config) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let gateway = Arc::new(InMemoryGateway::default());
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
    let (notifications, _queue_task) = NotificationQueueManager::spawn(&config.notification, signal_tx);

    let symbols = ["cat", "dog", "owl", "fox", "bee", "elk"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut controller = GameSessionController::new(
        config.engine.clone(),
        SessionSetup::memory_match("animals-1", symbols),
        SessionCollaborators {
            gateway: gateway.clone(),
            notifications: notifications.clone(),
            ui: ui_tx,
        },
    )?;
    info!("Session: {}", hex::encode(&controller.id()[..4]));

    controller.start_game(0)?;
    let mut now = config.engine.preview_ms;
    let mut memory: BTreeMap<String, BTreeSet<CardId>> = BTreeMap::new();

    let report = loop {
        if let Some(report) = controller.advance(now) {
            break report;
        }
        match choose_pair(controller.deck(), &mut memory) {
            Some((a, b)) => {
                controller.flip(a, now);
                controller.flip(b, now);
                now += config.engine.input_lock_ms;
            }
            None => match controller.next_deadline() {
                Some(deadline) => now = deadline,
                None => bail!("session stalled at {} ms", now),
            },
        }
    };

    while let Ok(event) = ui_rx.try_recv() {
        match event {
            UiEvent::ScoreFinalized { stats, bonus } => {
                info!(
                    "Score: {} stars, {}% efficiency, {} errors, {} flips, {} ms",
                    stats.stars, stats.efficiency_percent, stats.errors, stats.flip_count,
                    stats.completion_time_ms
                );
                if let Some(message) = bonus.message() {
                    info!("Bonus: {}", message);
                }
            }
            other => debug!(?other, "ui event"),
        }
    }

    let unlocked = match report.await? {
        ReportOutcome::Delivered(count) => count,
        ReportOutcome::Failed(e) => bail!("completion report failed: {e}"),
    };
    info!("=== {} Achievements Unlocked ===", unlocked);

    let mut shown = 0;
    while shown < unlocked {
        match signal_rx.recv().await {
            Some(NotificationSignal::Show(achievement)) => {
                info!("🏆 {} (+{} points): {}", achievement.title, achievement.points, achievement.description);
                shown += 1;
                tokio::time::sleep(Duration::from_millis(200)).await;
                notifications.on_dismissed()?;
            }
            Some(NotificationSignal::Hide { .. }) => {}
            None => break,
        }
    }

    info!("Total points: {}", gateway.total_points().await);
    Ok(())
}

/// Pick the next two cards for a player who remembers every card it has seen.
fn choose_pair(
    deck: &[Card],
    memory: &mut BTreeMap<String, BTreeSet<CardId>>,
) -> Option<(CardId, CardId)> {
    for ids in memory.values_mut() {
        ids.retain(|id| !deck[*id].matched);
    }

    if let Some(ids) = memory.values().find(|ids| ids.len() == 2) {
        let mut it = ids.iter().copied();
        return Some((it.next()?, it.next()?));
    }

    let unseen: Vec<&Card> = deck
        .iter()
        .filter(|c| !c.matched && !c.face_up && !memory.values().any(|ids| ids.contains(&c.id)))
        .collect();

    let first = unseen.first()?;
    memory.entry(first.symbol.clone()).or_default().insert(first.id);
    if let Some(&partner) = memory[&first.symbol].iter().find(|&&id| id != first.id) {
        return Some((first.id, partner));
    }

    let second = unseen.get(1)?;
    memory.entry(second.symbol.clone()).or_default().insert(second.id);
    Some((first.id, second.id))
}
