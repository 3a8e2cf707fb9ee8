//! # Core Engine Module
//!
//! Shared abstractions used throughout the engine.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration for all engine subsystems
//! - **Foundation**: Low-level utilities (timing, logging)
//! - **ECS**: Lifecycle, components, game objects and the frame scheduler

pub mod config;

// Re-export sibling modules for convenience
pub use crate::ecs;
pub use crate::foundation;

pub use config::{
    Config, ConfigError, EngineConfig, LoggingConfig, SchedulerConfig, StageConfig, TimeConfig,
};
