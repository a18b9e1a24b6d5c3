//! Engine Configuration
//!
//! Pacing constants for the match engine and the notification queue.
//! The defaults are tuned values that define the game's difficulty and
//! pacing for players; change them only with product sign-off.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::timer::Millis;

/// Timing configuration for one memory-match session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long every card is shown face-up before play starts.
    pub preview_ms: Millis,
    /// Delay before a matching pair is confirmed.
    pub match_confirm_ms: Millis,
    /// Delay before a mismatched pair flips back face-down.
    pub mismatch_flip_back_ms: Millis,
    /// Input lock after a pair is selected, whatever the outcome.
    pub input_lock_ms: Millis,
    /// Pause after the last match before the session completes.
    pub completion_grace_ms: Millis,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preview_ms: 4000,
            match_confirm_ms: 500,
            mismatch_flip_back_ms: 1000,
            input_lock_ms: 1200,
            completion_grace_ms: 1000,
        }
    }
}

/// Configuration for the achievement notification queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Pause between hiding one notification and showing the next.
    pub settle_delay_ms: Millis,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { settle_delay_ms: 1000 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Match engine timing.
    pub engine: EngineConfig,
    /// Notification queue timing.
    pub notification: NotificationConfig,
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    /// An environment variable held a non-numeric value.
    #[error("invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

impl Config {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Reads `MEMORY_PREVIEW_MS` and `MEMORY_SETTLE_DELAY_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = read_env_ms("MEMORY_PREVIEW_MS")? {
            config.engine.preview_ms = ms;
        }
        if let Some(ms) = read_env_ms("MEMORY_SETTLE_DELAY_MS")? {
            config.notification.settle_delay_ms = ms;
        }
        Ok(config)
    }

    /// Parse config from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn read_env_ms(var: &'static str) -> Result<Option<Millis>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pacing() {
        let config = Config::default();
        assert_eq!(config.engine.preview_ms, 4000);
        assert_eq!(config.engine.match_confirm_ms, 500);
        assert_eq!(config.engine.mismatch_flip_back_ms, 1000);
        assert_eq!(config.engine.input_lock_ms, 1200);
        assert_eq!(config.engine.completion_grace_ms, 1000);
        assert_eq!(config.notification.settle_delay_ms, 1000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "engine": { "preview_ms": 2500 } }"#).unwrap();
        assert_eq!(config.engine.preview_ms, 2500);
        assert_eq!(config.engine.input_lock_ms, 1200);
        assert_eq!(config.notification, NotificationConfig::default());
    }

    #[test]
    fn test_invalid_json() {
        let result = Config::from_json("{ not json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }
}
