//! Frame Scheduling
//!
//! Owns the per-frame callback lists and drives one logical frame per host
//! tick: pre-render callbacks, one render of the current scene, post-render
//! callbacks. Both lists keep registration order.
//!
//! Each phase dispatches over a snapshot taken when the phase begins, so a
//! callback may subscribe or unsubscribe anything (itself included) and the
//! change only shows up on the next tick.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::core::config::SchedulerConfig;
use crate::foundation::time::FrameTime;
use crate::scene::renderer::{SceneHandle, SceneRenderer};

new_key_type! {
    /// Opaque handle to a frame subscription
    ///
    /// Handles are generational: once a subscription is removed its handle
    /// never matches a later subscription.
    pub struct SubscriptionHandle;
}

/// Phase of a frame a callback runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// Before the scene renders
    PreRender,
    /// After the scene renders
    PostRender,
}

/// Scheduler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// No more subscriptions can be handed out
    #[error("subscription handle space exhausted ({limit} live subscriptions)")]
    HandleSpaceExhausted {
        /// Configured limit that was hit
        limit: usize,
    },
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickStats {
    /// Pre-render callbacks invoked
    pub pre_render: usize,
    /// Post-render callbacks invoked
    pub post_render: usize,
    /// Whether the renderer was asked to draw a scene and succeeded
    pub rendered: bool,
    /// The scheduler was stopped, nothing ran
    pub skipped: bool,
}

type FrameCallback = Rc<dyn Fn(&FrameTime)>;

struct Subscription {
    phase: FramePhase,
    callback: FrameCallback,
}

struct SchedulerState {
    subscriptions: SlotMap<SubscriptionHandle, Subscription>,
    pre_render: Vec<SubscriptionHandle>,
    post_render: Vec<SubscriptionHandle>,
    scene: Option<SceneHandle>,
    running: bool,
    max_subscriptions: usize,
    latest_frame: FrameTime,
}

impl SchedulerState {
    fn order(&self, phase: FramePhase) -> &[SubscriptionHandle] {
        match phase {
            FramePhase::PreRender => &self.pre_render,
            FramePhase::PostRender => &self.post_render,
        }
    }

    fn order_mut(&mut self, phase: FramePhase) -> &mut Vec<SubscriptionHandle> {
        match phase {
            FramePhase::PreRender => &mut self.pre_render,
            FramePhase::PostRender => &mut self.post_render,
        }
    }
}

/// Per-tick dispatcher of pre-render and post-render callbacks
///
/// Cloning yields another handle to the same scheduler; game objects keep one
/// so they can (un)subscribe themselves.
#[derive(Clone)]
pub struct FrameScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl FrameScheduler {
    /// Create a scheduler; it starts running if the config says so
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(SchedulerState {
                subscriptions: SlotMap::with_key(),
                pre_render: Vec::new(),
                post_render: Vec::new(),
                scene: None,
                running: config.autostart,
                max_subscriptions: config.max_subscriptions,
                latest_frame: FrameTime::default(),
            })),
        }
    }

    /// Register `callback` to run once per tick in `phase`
    ///
    /// A callback registered while a tick is in progress first runs on the
    /// next tick.
    pub fn subscribe<F>(&self, phase: FramePhase, callback: F) -> Result<SubscriptionHandle, SchedulerError>
    where
        F: Fn(&FrameTime) + 'static,
    {
        let mut state = self.state.borrow_mut();
        if state.subscriptions.len() >= state.max_subscriptions {
            return Err(SchedulerError::HandleSpaceExhausted {
                limit: state.max_subscriptions,
            });
        }

        let handle = state.subscriptions.insert(Subscription {
            phase,
            callback: Rc::new(callback),
        });
        state.order_mut(phase).push(handle);
        log::trace!("subscribed {handle:?} to {phase:?}");
        Ok(handle)
    }

    /// Remove a subscription
    ///
    /// Unknown or already removed handles are ignored. Returns whether a
    /// subscription was actually removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut state = self.state.borrow_mut();
        match state.subscriptions.remove(handle) {
            Some(subscription) => {
                state.order_mut(subscription.phase).retain(|&h| h != handle);
                log::trace!("unsubscribed {handle:?} from {:?}", subscription.phase);
                true
            }
            None => {
                log::debug!("ignoring unsubscribe of unknown handle {handle:?}");
                false
            }
        }
    }

    /// Whether `handle` refers to a live subscription
    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.state.borrow().subscriptions.contains_key(handle)
    }

    /// Number of live subscriptions in `phase`
    pub fn subscription_count(&self, phase: FramePhase) -> usize {
        self.state.borrow().order(phase).len()
    }

    /// Resume ticking
    pub fn start(&self) {
        let mut state = self.state.borrow_mut();
        if !state.running {
            log::debug!("frame scheduler started");
            state.running = true;
        }
    }

    /// Stop ticking; `run_tick` does nothing until `start` is called
    pub fn stop(&self) {
        let mut state = self.state.borrow_mut();
        if state.running {
            log::debug!("frame scheduler stopped");
            state.running = false;
        }
    }

    /// Whether ticks are currently dispatched
    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Scene rendered between the two phases
    pub fn scene(&self) -> Option<SceneHandle> {
        self.state.borrow().scene
    }

    pub(crate) fn set_scene(&self, scene: Option<SceneHandle>) {
        self.state.borrow_mut().scene = scene;
    }

    /// Timing of the most recent tick
    pub fn latest_frame(&self) -> FrameTime {
        self.state.borrow().latest_frame
    }

    pub(crate) fn record_frame(&self, frame: FrameTime) {
        self.state.borrow_mut().latest_frame = frame;
    }

    /// Run one frame: pre-render callbacks, render, post-render callbacks
    ///
    /// If a callback stops the scheduler, the remaining steps of the tick are
    /// skipped.
    pub fn run_tick(&self, frame: FrameTime, renderer: &mut dyn SceneRenderer) -> TickStats {
        if !self.is_running() {
            return TickStats {
                skipped: true,
                ..TickStats::default()
            };
        }
        self.record_frame(frame);

        let mut stats = TickStats {
            pre_render: self.dispatch(FramePhase::PreRender, &frame),
            ..TickStats::default()
        };

        if !self.is_running() {
            return stats;
        }
        if let Some(scene) = self.scene() {
            match renderer.render_once(scene) {
                Ok(()) => stats.rendered = true,
                Err(e) => log::warn!("frame {}: rendering {scene:?} failed: {e}", frame.frame_index),
            }
        }

        if self.is_running() {
            stats.post_render = self.dispatch(FramePhase::PostRender, &frame);
        }
        stats
    }

    fn dispatch(&self, phase: FramePhase, frame: &FrameTime) -> usize {
        // The borrow ends before any callback runs.
        let snapshot: Vec<FrameCallback> = {
            let state = self.state.borrow();
            state
                .order(phase)
                .iter()
                .filter_map(|&handle| state.subscriptions.get(handle))
                .map(|subscription| Rc::clone(&subscription.callback))
                .collect()
        };

        for callback in &snapshot {
            callback(frame);
        }
        snapshot.len()
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FrameScheduler")
            .field("pre_render", &state.pre_render.len())
            .field("post_render", &state.post_render.len())
            .field("scene", &state.scene)
            .field("running", &state.running)
            .finish()
    }
}
