//! Application trait and lifecycle management

use crate::engine::{Engine, EngineError, TickReport};
use crate::scene::StageError;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive the engine with [`Engine::run`].
pub trait Application {
    /// Initialize the application
    ///
    /// Called once after the engine is built and before the first tick. Register
    /// stages here; the configured initial stage is activated right after.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// Called after every tick with what the tick did.
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `report` - Outcome of the tick that just ran
    fn update(&mut self, engine: &mut Engine, report: &TickReport) -> Result<(), AppError>;

    /// Handle application events
    ///
    /// Called for every event posted with [`Engine::post_event`], before the
    /// next tick.
    fn handle_event(&mut self, engine: &mut Engine, event: AppEvent) -> Result<(), AppError> {
        // Default implementation forwards to engine
        engine.handle_event(&event);
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called once the main loop ends, before the engine disposes the active
    /// stage.
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Stage registration or activation failed
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}

/// Application events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Output surface was resized
    WindowResized {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },

    /// The host asked the application to close
    CloseRequested,
}
