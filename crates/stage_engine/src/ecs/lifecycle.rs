//! Lifecycle hooks shared by every component
//!
//! All hooks default to no-ops, so a component only implements the ones it
//! cares about. Hooks are dispatched by the owning [`GameObject`]:
//!
//! - `awake` once, when the owning stage finishes loading (or immediately if
//!   the object or component is added to a stage that already runs)
//! - `start` once, after every object of the stage has been awoken
//! - `update` every tick, in the pre-render phase
//! - `late_update` every tick, in the post-render phase

use super::game_object::GameObject;
use crate::foundation::time::FrameTime;

/// Context handed to every lifecycle hook
pub struct LifecycleContext<'a> {
    object: &'a GameObject,
    frame: FrameTime,
}

impl<'a> LifecycleContext<'a> {
    pub(crate) fn new(object: &'a GameObject, frame: FrameTime) -> Self {
        Self { object, frame }
    }

    /// The game object that owns the component being dispatched
    ///
    /// Through it a hook can disable or destroy its owner, attach components,
    /// or reach sibling components. The component currently running is
    /// mutably borrowed, so looking itself up yields `None`.
    pub fn object(&self) -> &'a GameObject {
        self.object
    }

    /// Timing of the tick this hook runs in
    pub fn frame(&self) -> FrameTime {
        self.frame
    }

    /// Shorthand for `frame().delta_time`
    pub fn delta_time(&self) -> f32 {
        self.frame.delta_time
    }
}

/// Per-frame lifecycle capability
pub trait Lifecycle {
    /// Called once before any `start`
    fn awake(&mut self, _ctx: &LifecycleContext<'_>) {}

    /// Called once before the first `update`
    fn start(&mut self, _ctx: &LifecycleContext<'_>) {}

    /// Called every tick before the scene renders
    fn update(&mut self, _ctx: &LifecycleContext<'_>) {}

    /// Called every tick after the scene renders
    fn late_update(&mut self, _ctx: &LifecycleContext<'_>) {}
}

/// Identifies a hook for fan-out code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// [`Lifecycle::awake`]
    Awake,
    /// [`Lifecycle::start`]
    Start,
    /// [`Lifecycle::update`]
    Update,
    /// [`Lifecycle::late_update`]
    LateUpdate,
}

impl Hook {
    pub(crate) fn invoke<L: Lifecycle + ?Sized>(self, target: &mut L, ctx: &LifecycleContext<'_>) {
        match self {
            Self::Awake => target.awake(ctx),
            Self::Start => target.start(ctx),
            Self::Update => target.update(ctx),
            Self::LateUpdate => target.late_update(ctx),
        }
    }

    /// Per-tick hooks wait for `start`
    pub(crate) fn is_per_tick(self) -> bool {
        matches!(self, Self::Update | Self::LateUpdate)
    }
}
