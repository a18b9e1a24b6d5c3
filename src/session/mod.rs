//! Session Layer
//!
//! Wraps the deterministic engine for one activity session and talks to the
//! outside world: the achievement gateway, the notification queue and the UI.
//!
//! - `gateway`: achievement persistence contract and an in-memory gateway
//! - `controller`: session lifecycle, scoring, completion reporting
//! - `runner`: real-time async driver for a controller

pub mod gateway;
pub mod controller;
pub mod runner;

pub use gateway::{Achievement, AchievementGateway, CompletionSummary, GatewayError, InMemoryGateway};
pub use controller::{
    ExitDecision, GameSessionController, ReportOutcome, SessionCollaborators, SessionError,
    SessionId, SessionSetup, SessionState, UiEvent,
};
pub use runner::{RunnerHandle, SessionRunner, SessionSnapshot};
