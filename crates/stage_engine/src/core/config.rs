//! # Unified Configuration System
//!
//! All runtime configuration lives here. Every section has serde defaults so a
//! partial file (or an empty one) still produces a usable [`EngineConfig`].
//!
//! ## Configuration Categories
//!
//! - **Scheduler Config**: subscription limits, autostart
//! - **Stage Config**: loading indicator, pruning of destroyed objects
//! - **Time Config**: delta-time clamps
//! - **Logging Config**: logger filter and format

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// # Scheduler Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of live subscriptions across both phases
    pub max_subscriptions: usize,
    /// Whether the scheduler starts running as soon as the engine is built
    pub autostart: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            // slotmap keys carry a 32-bit index
            max_subscriptions: u32::MAX as usize - 1,
            autostart: true,
        }
    }
}

/// # Stage Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Ask the renderer to show its loading indicator while a stage loads
    pub show_loading_indicator: bool,
    /// Drop destroyed game objects from the active stage after every tick
    pub prune_destroyed_objects: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            show_loading_indicator: true,
            prune_destroyed_objects: true,
        }
    }
}

/// # Time Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Lower clamp for a tick's delta time, in milliseconds
    pub min_delta_ms: f32,
    /// Upper clamp for a tick's delta time, in milliseconds
    pub max_delta_ms: f32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            min_delta_ms: 0.1,
            max_delta_ms: 250.0,
        }
    }
}

impl TimeConfig {
    /// The delta clamps as durations, `(min, max)`
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if a clamp is negative, not finite, too large
    /// for a [`Duration`], or if the clamps are inverted.
    pub fn clamps(&self) -> Result<(Duration, Duration), ConfigError> {
        let to_duration = |field: &str, ms: f32| {
            Duration::try_from_secs_f32(ms / 1000.0).map_err(|e| {
                ConfigError::Invalid(format!("time.{field} ({ms}) is not a valid duration: {e}"))
            })
        };
        let min = to_duration("min_delta_ms", self.min_delta_ms)?;
        let max = to_duration("max_delta_ms", self.max_delta_ms)?;
        if min > max {
            return Err(ConfigError::Invalid(format!(
                "time.min_delta_ms ({}) exceeds time.max_delta_ms ({})",
                self.min_delta_ms, self.max_delta_ms
            )));
        }
        Ok((min, max))
    }
}

/// # Logging Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter string, `RUST_LOG` is used when absent
    pub filter: Option<String>,
    /// Prefix records with a millisecond timestamp
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            timestamps: true,
        }
    }
}

/// # Engine Configuration
///
/// Top-level configuration; this is the structure hosts load from disk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stage activated by [`crate::Engine::run`] before the first frame
    pub initial_stage: Option<String>,
    /// Frame scheduler settings
    pub scheduler: SchedulerConfig,
    /// Stage lifecycle settings
    pub stages: StageConfig,
    /// Frame timing settings
    pub time: TimeConfig,
    /// Logger settings
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Set the stage to activate on startup
    pub fn with_initial_stage(mut self, name: impl Into<String>) -> Self {
        self.initial_stage = Some(name.into());
        self
    }

    /// Set the logger filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.logging.filter = Some(filter.into());
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.max_subscriptions == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.max_subscriptions must be at least 1".to_string(),
            ));
        }

        self.time.clamps()?;

        if let Some(name) = &self.initial_stage {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("initial_stage cannot be blank".to_string()));
            }
        }

        Ok(())
    }
}

impl Config for EngineConfig {}
