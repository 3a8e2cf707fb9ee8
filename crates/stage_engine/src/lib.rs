//! # Stage Engine
//!
//! A stage lifecycle and frame-scheduling runtime.
//!
//! ## Features
//!
//! - **Stages**: named scenes with an asynchronous load, swapped without
//!   leaking per-frame callbacks or rendering a torn-down scene
//! - **Frame Scheduling**: ordered pre-render and post-render callbacks
//!   around one render per tick
//! - **Game Objects**: entities with ordered components and
//!   `awake`/`start`/`update`/`late_update` hooks
//! - **Renderer Agnostic**: rendering is a [`SceneRenderer`](scene::SceneRenderer)
//!   collaborator; a headless one is included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stage_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         engine.add_stage("main", |stage: &mut Stage, _scene| {
//!             stage.add_game_object(GameObject::builder().named("player"))?;
//!             Ok(())
//!         })?;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, engine: &mut Engine, report: &TickReport) -> Result<(), AppError> {
//!         if report.frame.frame_index >= 600 {
//!             engine.quit();
//!         }
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default().with_initial_stage("main");
//!     Engine::run(config, HeadlessRenderer::new(), &mut MyApp)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod config;
pub mod core;

pub mod ecs;
pub mod foundation;
pub mod scene;

mod application;
mod engine;

pub use application::{AppError, AppEvent, Application};
pub use engine::{Engine, EngineError, TickReport};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{Config, EngineConfig, LoggingConfig, SchedulerConfig, StageConfig, TimeConfig},
        ecs::{
            Component, ComponentRef, FramePhase, FrameScheduler, GameObject, GameObjectBuilder,
            Lifecycle, LifecycleContext, SubscriptionHandle,
        },
        foundation::time::{FrameTime, Stopwatch},
        scene::{
            Activation, HeadlessRenderer, SceneHandle, SceneRenderer, Stage, StageError, StageState,
        },
        AppError, AppEvent, Application, Engine, EngineError, TickReport,
    };
}
