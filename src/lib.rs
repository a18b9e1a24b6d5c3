//! # Memory Match Engine
//!
//! Game session and achievement notification engine for a memory-matching
//! minigame.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MEMORY MATCH ENGINE                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xorshift128+ and Fisher-Yates      │
//! │  └── timer.rs    - Virtual-time timer queue                  │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── card.rs     - Cards and deck construction               │
//! │  ├── stats.rs    - Session counters                          │
//! │  ├── scoring.rs  - Stars, efficiency, bonus                  │
//! │  ├── events.rs   - Engine events and feedback cues           │
//! │  └── engine.rs   - Flip/evaluate/match state machine         │
//! │                                                              │
//! │  session/        - Session lifecycle (async)                 │
//! │  ├── gateway.rs  - Achievement persistence contract          │
//! │  ├── controller.rs - Scoring, reporting, exit guard          │
//! │  └── runner.rs   - Real-time driver                          │
//! │                                                              │
//! │  notify/         - Notification delivery (async)             │
//! │  └── queue.rs    - FIFO, one-at-a-time achievement queue     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flow
//!
//! UI input → `MatchEngine::flip` → engine completion →
//! `GameSessionController::complete_game` → scoring →
//! `AchievementGateway::record_completion` → `NotificationHandle::enqueue` →
//! UI shows one notification at a time.
//!
//! The `core/` and `game/` modules never read the wall clock: every command
//! takes the current time in milliseconds, so a session replays identically
//! from the same seed and inputs.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod notify;
pub mod session;

// Re-export commonly used types
pub use config::{Config, EngineConfig, NotificationConfig};
pub use crate::core::rng::DeterministicRng;
pub use game::engine::{MatchEngine, EnginePhase, FlipOutcome};
pub use game::stats::GameStats;
pub use notify::queue::{NotificationHandle, NotificationQueueManager, NotificationSignal};
pub use session::controller::{GameSessionController, UiEvent};
pub use session::gateway::{Achievement, AchievementGateway, InMemoryGateway};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
