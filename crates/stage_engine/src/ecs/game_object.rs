//! GameObject: an entity owning an ordered set of components
//!
//! A game object subscribes itself to the [`FrameScheduler`] while it is
//! enabled: one pre-render callback running `update` and one post-render
//! callback running `late_update`. Both fan out to the attached components in
//! attachment order.
//!
//! `GameObject` is a cheap, cloneable handle. The owning [`Stage`] keeps one
//! clone; the scheduler callbacks only hold weak references, so dropping the
//! stage's handle releases the object.
//!
//! [`Stage`]: crate::scene::Stage

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::component::{Attached, Component, ComponentRef, PendingComponent};
use super::lifecycle::{Hook, LifecycleContext};
use super::scheduler::{FramePhase, FrameScheduler, SchedulerError, SubscriptionHandle};
use crate::foundation::time::FrameTime;

/// Identifier of a game object, unique within its stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Lifecycle state of a game object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Alive; may be enabled or disabled
    Created,
    /// Terminal; every lifecycle call is a no-op
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
struct Subscriptions {
    pre_render: SubscriptionHandle,
    post_render: SubscriptionHandle,
}

struct ObjectInner {
    id: ObjectId,
    name: Option<String>,
    scheduler: FrameScheduler,
    enabled: Cell<bool>,
    state: Cell<ObjectState>,
    awoken: Cell<bool>,
    started: Cell<bool>,
    subscriptions: Cell<Option<Subscriptions>>,
    components: RefCell<Vec<Attached>>,
}

/// Entity with its own enable/subscribe state
#[derive(Clone)]
pub struct GameObject {
    inner: Rc<ObjectInner>,
}

impl GameObject {
    /// Start describing a game object to add to a stage
    pub fn builder() -> GameObjectBuilder {
        GameObjectBuilder::new()
    }

    pub(crate) fn create(
        id: ObjectId,
        builder: GameObjectBuilder,
        scheduler: FrameScheduler,
    ) -> Result<Self, SchedulerError> {
        let GameObjectBuilder { name, enabled, components } = builder;
        let object = Self {
            inner: Rc::new(ObjectInner {
                id,
                name,
                scheduler,
                enabled: Cell::new(false),
                state: Cell::new(ObjectState::Created),
                awoken: Cell::new(false),
                started: Cell::new(false),
                subscriptions: Cell::new(None),
                components: RefCell::new(components.into_iter().map(|c| c.0).collect()),
            }),
        };
        object.set_enabled(enabled)?;
        Ok(object)
    }

    /// Stage-unique identifier
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Optional name given at construction
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ObjectState {
        self.inner.state.get()
    }

    /// Whether [`destroy`](Self::destroy) has run
    pub fn is_destroyed(&self) -> bool {
        self.state() == ObjectState::Destroyed
    }

    /// Whether the object is enabled (and therefore subscribed)
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    /// Handles of the pre-render and post-render subscriptions, if any
    pub fn subscriptions(&self) -> Option<(SubscriptionHandle, SubscriptionHandle)> {
        self.inner
            .subscriptions
            .get()
            .map(|s| (s.pre_render, s.post_render))
    }

    /// Whether two handles refer to the same object
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Enable or disable per-frame dispatch
    ///
    /// Enabling registers exactly one pre-render and one post-render callback;
    /// disabling removes both. Setting the current value again does nothing,
    /// and so does enabling a destroyed object.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), SchedulerError> {
        if enabled == self.is_enabled() {
            return Ok(());
        }
        if enabled {
            if self.is_destroyed() {
                log::debug!("{self:?}: ignoring enable of destroyed object");
                return Ok(());
            }
            self.subscribe()?;
        } else {
            self.inner.unsubscribe();
        }
        self.inner.enabled.set(enabled);
        Ok(())
    }

    fn subscribe(&self) -> Result<(), SchedulerError> {
        let scheduler = &self.inner.scheduler;

        let weak = Rc::downgrade(&self.inner);
        let pre_render = scheduler.subscribe(FramePhase::PreRender, move |frame| {
            if let Some(object) = upgrade(&weak) {
                object.update(frame);
            }
        })?;

        let weak = Rc::downgrade(&self.inner);
        let post_render = scheduler.subscribe(FramePhase::PostRender, move |frame| {
            if let Some(object) = upgrade(&weak) {
                object.late_update(frame);
            }
        });
        let post_render = match post_render {
            Ok(handle) => handle,
            Err(e) => {
                scheduler.unsubscribe(pre_render);
                return Err(e);
            }
        };

        self.inner.subscriptions.set(Some(Subscriptions {
            pre_render,
            post_render,
        }));
        Ok(())
    }

    /// Disable the object and move it to [`ObjectState::Destroyed`]
    ///
    /// Destroying twice is a no-op. Components are released here; a hook that
    /// is running at the time finishes normally.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            log::trace!("{self:?}: already destroyed");
            return;
        }
        self.inner.unsubscribe();
        self.inner.enabled.set(false);
        self.inner.state.set(ObjectState::Destroyed);
        self.inner.components.borrow_mut().clear();
        log::trace!("{self:?}: destroyed");
    }

    /// Attach a component at the end of the dispatch order
    ///
    /// If the object has already been awoken (or started), the component gets
    /// its `awake` (and `start`) right away. Components attached while a hook
    /// is running are dispatched from the next tick on. Attaching to a
    /// destroyed object drops the component.
    pub fn add_component<C: Component>(&self, component: C) -> ComponentRef<C> {
        let (attached, handle) = ComponentRef::attach(component);

        if self.is_destroyed() {
            log::debug!("{self:?}: dropping {} added after destroy", attached.type_name());
            return handle;
        }

        self.inner.components.borrow_mut().push(attached.clone());

        let frame = self.inner.scheduler.latest_frame();
        if self.inner.awoken.get() {
            self.invoke(&attached, Hook::Awake, frame);
        }
        if self.inner.started.get() {
            self.invoke(&attached, Hook::Start, frame);
        }
        handle
    }

    /// First component of type `T`, in attachment order
    ///
    /// This is a linear scan over the attached components.
    pub fn component<T: Component>(&self) -> Option<ComponentRef<T>> {
        self.inner
            .components
            .borrow()
            .iter()
            .find_map(ComponentRef::from_attached)
    }

    /// Every component of type `T`, in attachment order (linear scan)
    pub fn components_of_type<T: Component>(&self) -> Vec<ComponentRef<T>> {
        self.inner
            .components
            .borrow()
            .iter()
            .filter_map(ComponentRef::from_attached)
            .collect()
    }

    /// Run `f` on the first component of type `T`
    pub fn with_component<T: Component, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.component::<T>()?.with(f)
    }

    /// Run `f` on the first component of type `T`, mutably
    pub fn with_component_mut<T: Component, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.component::<T>()?.with_mut(f)
    }

    /// Whether a component of type `T` is attached
    pub fn has_component<T: Component>(&self) -> bool {
        self.inner.components.borrow().iter().any(Attached::is::<T>)
    }

    /// Number of attached components
    pub fn component_count(&self) -> usize {
        self.inner.components.borrow().len()
    }

    /// Run `awake` on every component, once
    pub fn awake(&self, frame: FrameTime) {
        if self.is_destroyed() || self.inner.awoken.replace(true) {
            return;
        }
        self.dispatch(Hook::Awake, frame);
    }

    /// Run `start` on every component, once
    pub fn start(&self, frame: FrameTime) {
        if self.is_destroyed() || self.inner.started.replace(true) {
            return;
        }
        self.dispatch(Hook::Start, frame);
    }

    /// Run `update` on every component
    ///
    /// Does nothing until the object has been started.
    pub fn update(&self, frame: &FrameTime) {
        self.dispatch(Hook::Update, *frame);
    }

    /// Run `late_update` on every component
    pub fn late_update(&self, frame: &FrameTime) {
        self.dispatch(Hook::LateUpdate, *frame);
    }

    fn dispatch(&self, hook: Hook, frame: FrameTime) {
        if self.is_destroyed() {
            return;
        }
        if hook.is_per_tick() && !self.inner.started.get() {
            return;
        }

        // Snapshot so hooks can attach components or destroy the object.
        let components: Vec<Attached> = self.inner.components.borrow().clone();
        for attached in &components {
            if self.is_destroyed() {
                break;
            }
            self.invoke(attached, hook, frame);
        }
    }

    fn invoke(&self, attached: &Attached, hook: Hook, frame: FrameTime) {
        let ctx = LifecycleContext::new(self, frame);
        match attached.cell().try_borrow_mut() {
            Ok(mut component) => hook.invoke(&mut *component, &ctx),
            Err(_) => log::warn!(
                "{self:?}: skipping {hook:?} on {}, it is already running",
                attached.type_name()
            ),
        }
    }
}

impl ObjectInner {
    fn unsubscribe(&self) {
        if let Some(subscriptions) = self.subscriptions.take() {
            self.scheduler.unsubscribe(subscriptions.pre_render);
            self.scheduler.unsubscribe(subscriptions.post_render);
        }
    }
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn upgrade(weak: &Weak<ObjectInner>) -> Option<GameObject> {
    weak.upgrade().map(|inner| GameObject { inner })
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "GameObject#{}({name})", self.id().0),
            None => write!(f, "GameObject#{}", self.id().0),
        }
    }
}

/// Description of a game object to create
///
/// Components given here are attached at construction, in order.
pub struct GameObjectBuilder {
    name: Option<String>,
    enabled: bool,
    components: Vec<PendingComponent>,
}

impl GameObjectBuilder {
    /// Unnamed, enabled, no components
    pub fn new() -> Self {
        Self {
            name: None,
            enabled: true,
            components: Vec::new(),
        }
    }

    /// Give the object a name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set whether the object starts enabled
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Attach a component at construction
    pub fn with_component<C: Component>(mut self, component: C) -> Self {
        self.components.push(PendingComponent::new(component));
        self
    }
}

impl Default for GameObjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}
