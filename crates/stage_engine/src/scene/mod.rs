//! Stage management
//!
//! Bridges gameplay objects and the rendering collaborator:
//!
//! ```text
//! StageRegistry (names -> stages, one active)
//!      ↓
//! Stage (game objects + one renderer scene)
//!      ↓
//! SceneRenderer (creates, draws and disposes scenes)
//! ```

pub mod headless;
pub mod registry;
pub mod renderer;
pub mod stage;

pub use headless::{HeadlessRenderer, LoadPlan};
pub use registry::{Activation, LoadOutcome, StageRegistry};
pub use renderer::{RenderError, RenderResult, SceneHandle, SceneLoad, SceneRenderer};
pub use stage::{Stage, StageError, StageSetup, StageState, PLACEHOLDER_STAGE};
