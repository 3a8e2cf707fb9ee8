//! Rendering collaborator abstraction
//!
//! The runtime never builds scenes itself. It asks a [`SceneRenderer`] to
//! create one per stage, to draw the active one once per tick, and to tear it
//! down when the stage is superseded.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Handle to a scene owned by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneHandle(pub u64);

impl fmt::Display for SceneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// In-flight scene construction
///
/// Polled once per tick without blocking; dropping it cancels the load.
pub type SceneLoad = Pin<Box<dyn Future<Output = RenderResult<SceneHandle>>>>;

/// Rendering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Scene construction or content import failed
    #[error("scene creation failed: {0}")]
    SceneCreation(String),

    /// The handle does not name a live scene
    #[error("unknown {0}")]
    UnknownScene(SceneHandle),

    /// Releasing a scene failed
    #[error("scene disposal failed: {0}")]
    Disposal(String),

    /// Drawing a frame failed
    #[error("render failed: {0}")]
    Render(String),
}

/// Rendering capability consumed by the runtime
pub trait SceneRenderer {
    /// Start building the scene for `stage`
    ///
    /// The returned future may stay pending across many ticks while content
    /// is imported; the previous stage keeps rendering meanwhile.
    fn create_scene(&mut self, stage: &str) -> SceneLoad;

    /// Release a scene and everything it owns
    fn dispose_scene(&mut self, scene: SceneHandle) -> RenderResult<()>;

    /// Draw one frame of `scene`
    fn render_once(&mut self, scene: SceneHandle) -> RenderResult<()>;

    /// Show a loading indicator while a stage loads
    fn show_loading_indicator(&mut self) {}

    /// Hide the loading indicator
    fn hide_loading_indicator(&mut self) {}

    /// The output surface changed size
    fn resize(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }
}
