//! Game objects, components and per-frame scheduling
//!
//! Game objects subscribe themselves to the [`FrameScheduler`] while enabled
//! and fan lifecycle hooks out to their components in attachment order.

pub mod component;
pub mod game_object;
pub mod lifecycle;
pub mod scheduler;

pub use component::{AsAny, Component, ComponentRef, PendingComponent};
pub use game_object::{GameObject, GameObjectBuilder, ObjectId, ObjectState};
pub use lifecycle::{Hook, Lifecycle, LifecycleContext};
pub use scheduler::{FramePhase, FrameScheduler, SchedulerError, SubscriptionHandle, TickStats};
