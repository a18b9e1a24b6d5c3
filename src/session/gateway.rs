//! Achievement Gateway
//!
//! The engine reports each finished session to an [`AchievementGateway`],
//! which owns achievement state and answers with whatever was newly unlocked.
//! Remote implementations live outside this crate; [`InMemoryGateway`] keeps
//! everything in process for tests, demos and offline play.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::timer::Millis;

/// An achievement as reported by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    /// Stable identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Display description.
    pub description: String,
    /// Points awarded on unlock.
    pub points: u32,
    /// Progress towards `target`.
    pub progress: u32,
    /// Progress needed to unlock.
    pub target: u32,
    /// Unlock state.
    pub unlocked: bool,
    /// Unlock time.
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// What the gateway learns about a finished session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    /// Unique per finished session; repeated reports carry the same id.
    pub completion_id: String,
    /// Final star rating.
    pub stars: u8,
    /// Finished without errors.
    pub is_perfect: bool,
    /// Active play time.
    pub completion_time_ms: Millis,
    /// Mismatched pairs.
    pub errors: u32,
    /// Activity the session belonged to.
    pub activity_type: String,
    /// Better star rating than the previous session.
    pub showed_improvement: bool,
    /// A hint was used.
    pub used_help: bool,
    /// Ran over the time budget.
    pub took_time: bool,
}

/// Gateway errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Backend could not be reached.
    #[error("achievement service unavailable: {0}")]
    Unavailable(String),
    /// Backend refused the report.
    #[error("completion rejected: {0}")]
    Rejected(String),
}

/// Persists session results and reports newly unlocked achievements.
///
/// Implementations must tolerate the same summary being sent more than once:
/// a repeated `completion_id` is acknowledged without counting again.
/// Callers retry after a failure.
#[async_trait]
pub trait AchievementGateway: Send + Sync {
    /// Record a finished session.
    ///
    /// Returns newly unlocked achievements, in the order they should be
    /// shown.
    async fn record_completion(
        &self,
        summary: &CompletionSummary,
    ) -> Result<Vec<Achievement>, GatewayError>;
}

// =============================================================================
// IN-MEMORY GATEWAY
// =============================================================================

/// What counts towards an achievement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AchievementRule {
    /// Any finished session.
    SessionsCompleted,
    /// Sessions with no errors.
    PerfectRuns,
    /// Sessions rated three stars.
    ThreeStarSessions,
    /// Sessions finished under the given time.
    FinishedUnder(Millis),
    /// Sessions finished without a hint.
    NoHelp,
    /// Sessions that beat the previous rating.
    Improvements,
}

impl AchievementRule {
    fn counts(&self, summary: &CompletionSummary) -> bool {
        match self {
            Self::SessionsCompleted => true,
            Self::PerfectRuns => summary.is_perfect,
            Self::ThreeStarSessions => summary.stars == 3,
            Self::FinishedUnder(limit) => summary.completion_time_ms < *limit,
            Self::NoHelp => !summary.used_help,
            Self::Improvements => summary.showed_improvement,
        }
    }
}

/// Catalog entry for the in-memory gateway.
#[derive(Clone, Debug)]
pub struct AchievementDefinition {
    /// Achievement as it starts (locked, zero progress).
    pub achievement: Achievement,
    /// What advances its progress.
    pub rule: AchievementRule,
}

impl AchievementDefinition {
    /// Define a locked achievement.
    pub fn new(
        id: &str,
        title: &str,
        description: &str,
        points: u32,
        target: u32,
        rule: AchievementRule,
    ) -> Self {
        Self {
            achievement: Achievement {
                id: id.to_string(),
                title: title.to_string(),
                description: description.to_string(),
                points,
                progress: 0,
                target,
                unlocked: false,
                unlocked_at: None,
            },
            rule,
        }
    }
}

/// Catalog shipped with the game.
pub fn default_catalog() -> Vec<AchievementDefinition> {
    vec![
        AchievementDefinition::new("first_game", "First Steps", "Finish your first memory game", 10, 1, AchievementRule::SessionsCompleted),
        AchievementDefinition::new("perfect_memory", "Perfect Memory", "Finish a game without any mistakes", 25, 1, AchievementRule::PerfectRuns),
        AchievementDefinition::new("three_stars", "Superstar", "Earn three stars", 20, 1, AchievementRule::ThreeStarSessions),
        AchievementDefinition::new("speedster", "Speedster", "Finish a game in under 30 seconds", 20, 1, AchievementRule::FinishedUnder(30_000)),
        AchievementDefinition::new("getting_better", "Getting Better", "Beat your last rating", 15, 1, AchievementRule::Improvements),
        AchievementDefinition::new("on_my_own", "On My Own", "Finish three games without hints", 30, 3, AchievementRule::NoHelp),
        AchievementDefinition::new("memory_master", "Memory Master", "Finish five games", 50, 5, AchievementRule::SessionsCompleted),
    ]
}

#[derive(Debug, Default)]
struct GatewayState {
    catalog: Vec<AchievementDefinition>,
    completions: Vec<CompletionSummary>,
    recorded_ids: BTreeSet<String>,
}

/// Gateway keeping all achievement progress in process.
#[derive(Debug)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
    failures_pending: AtomicU32,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl InMemoryGateway {
    /// Create a gateway over `catalog`.
    pub fn new(catalog: Vec<AchievementDefinition>) -> Self {
        Self {
            state: Mutex::new(GatewayState {
                catalog,
                completions: Vec::new(),
                recorded_ids: BTreeSet::new(),
            }),
            failures_pending: AtomicU32::new(0),
        }
    }

    /// Make the next `count` calls fail with [`GatewayError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Current state of every achievement.
    pub async fn achievements(&self) -> Vec<Achievement> {
        let state = self.state.lock().await;
        state.catalog.iter().map(|d| d.achievement.clone()).collect()
    }

    /// Sum of points of unlocked achievements.
    pub async fn total_points(&self) -> u32 {
        let state = self.state.lock().await;
        state
            .catalog
            .iter()
            .filter(|d| d.achievement.unlocked)
            .map(|d| d.achievement.points)
            .sum()
    }

    /// Number of completions recorded.
    pub async fn completion_count(&self) -> usize {
        self.state.lock().await.completions.len()
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AchievementGateway for InMemoryGateway {
    async fn record_completion(
        &self,
        summary: &CompletionSummary,
    ) -> Result<Vec<Achievement>, GatewayError> {
        if self.take_failure() {
            return Err(GatewayError::Unavailable("injected failure".to_string()));
        }

        let mut state = self.state.lock().await;
        if !state.recorded_ids.insert(summary.completion_id.clone()) {
            debug!(id = %summary.completion_id, "duplicate completion ignored");
            return Ok(Vec::new());
        }
        state.completions.push(summary.clone());

        let now = Utc::now();
        let mut unlocked = Vec::new();
        for definition in &mut state.catalog {
            let achievement = &mut definition.achievement;
            if achievement.unlocked || !definition.rule.counts(summary) {
                continue;
            }
            achievement.progress += 1;
            if achievement.progress >= achievement.target {
                achievement.unlocked = true;
                achievement.unlocked_at = Some(now);
                unlocked.push(achievement.clone());
            }
        }

        debug!(unlocked = unlocked.len(), "completion recorded");
        Ok(unlocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, stars: u8, is_perfect: bool) -> CompletionSummary {
        CompletionSummary {
            completion_id: id.to_string(),
            stars,
            is_perfect,
            completion_time_ms: 45_000,
            errors: if is_perfect { 0 } else { 3 },
            activity_type: "memory-match".to_string(),
            showed_improvement: false,
            used_help: true,
            took_time: false,
        }
    }

    fn ids(achievements: &[Achievement]) -> Vec<&str> {
        achievements.iter().map(|a| a.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_first_completion_unlocks_in_catalog_order() {
        let gateway = InMemoryGateway::default();

        let unlocked = gateway.record_completion(&summary("s-1", 3, true)).await.unwrap();
        assert_eq!(ids(&unlocked), vec!["first_game", "perfect_memory", "three_stars"]);
        assert!(unlocked.iter().all(|a| a.unlocked && a.unlocked_at.is_some()));
        assert_eq!(gateway.total_points().await, 55);
    }

    #[tokio::test]
    async fn test_unlocks_are_reported_once() {
        let gateway = InMemoryGateway::default();
        gateway.record_completion(&summary("s-1", 1, false)).await.unwrap();

        let second = gateway.record_completion(&summary("s-2", 1, false)).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(gateway.completion_count().await, 2);
    }

    #[tokio::test]
    async fn test_progress_towards_target() {
        let gateway = InMemoryGateway::default();
        for n in 0..4 {
            gateway.record_completion(&summary(&format!("s-{n}"), 1, false)).await.unwrap();
        }

        let master = gateway
            .achievements()
            .await
            .into_iter()
            .find(|a| a.id == "memory_master")
            .unwrap();
        assert_eq!(master.progress, 4);
        assert!(!master.unlocked);

        let fifth = gateway.record_completion(&summary("s-4", 1, false)).await.unwrap();
        assert_eq!(ids(&fifth), vec!["memory_master"]);
    }

    #[tokio::test]
    async fn test_injected_failure_records_nothing() {
        let gateway = InMemoryGateway::default();
        gateway.fail_next(1);

        let result = gateway.record_completion(&summary("s-1", 3, true)).await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert_eq!(gateway.completion_count().await, 0);

        // retry succeeds
        let unlocked = gateway.record_completion(&summary("s-1", 3, true)).await.unwrap();
        assert!(!unlocked.is_empty());
        assert_eq!(gateway.completion_count().await, 1);
    }

    #[tokio::test]
    async fn test_repeated_completion_id_counts_once() {
        let gateway = InMemoryGateway::default();
        let report = summary("s-1", 1, false);

        let first = gateway.record_completion(&report).await.unwrap();
        assert_eq!(ids(&first), vec!["first_game"]);

        let again = gateway.record_completion(&report).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(gateway.completion_count().await, 1);

        let master = gateway
            .achievements()
            .await
            .into_iter()
            .find(|a| a.id == "memory_master")
            .unwrap();
        assert_eq!(master.progress, 1);
    }

    #[test]
    fn test_summary_wire_format() {
        let json = serde_json::to_value(summary("s-9", 2, false)).unwrap();
        assert_eq!(json["completionId"], "s-9");
        assert_eq!(json["isPerfect"], false);
        assert_eq!(json["completionTimeMs"], 45_000);
        assert_eq!(json["activityType"], "memory-match");
        assert_eq!(json["showedImprovement"], false);
    }
}
