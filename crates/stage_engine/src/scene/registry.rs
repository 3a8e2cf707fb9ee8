//! Stage registry and the stage swap protocol
//!
//! The registry maps names to stages and tracks which one is active. Exactly
//! one stage is active at any time; before the first activation that is a
//! placeholder without a scene.
//!
//! Activating an unloaded stage starts an asynchronous scene load. The load is
//! polled once per tick while the previous stage keeps running. When it
//! resolves, the swap happens in one step:
//!
//! 1. stop the scheduler
//! 2. run the stage's setup
//! 3. dispose the previous stage (objects destroyed, scene released)
//! 4. make the new stage active, then awake and start its objects
//! 5. resume the scheduler if it was running
//!
//! Only one load is in flight at a time. Requesting another stage while a load
//! is pending cancels the pending load.

use std::collections::HashMap;
use std::future::Future;
use std::task::{Context, Poll, Waker};

use crate::core::config::StageConfig;
use crate::ecs::scheduler::FrameScheduler;
use crate::foundation::time::Stopwatch;

use super::renderer::{SceneHandle, SceneLoad, SceneRenderer};
use super::stage::{Stage, StageError, StageSetup, StageState};

/// Result of [`StageRegistry::set_active_stage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The stage is now active
    Activated,
    /// The scene is still loading; the previous stage stays active
    Pending,
}

/// Outcome of a load that resolved during [`StageRegistry::poll_pending`]
pub type LoadOutcome = Result<String, StageError>;

struct StageEntry {
    stage: Stage,
    setup: Box<dyn StageSetup>,
}

struct PendingLoad {
    name: String,
    load: SceneLoad,
    stopwatch: Stopwatch,
    indicator: bool,
}

/// Named stages plus the single active one
pub struct StageRegistry {
    config: StageConfig,
    stages: HashMap<String, StageEntry>,
    order: Vec<String>,
    active: Option<String>,
    placeholder: Stage,
    pending: Option<PendingLoad>,
}

impl StageRegistry {
    /// Create an empty registry; the placeholder stage is active
    pub fn new(config: StageConfig) -> Self {
        Self {
            config,
            stages: HashMap::new(),
            order: Vec::new(),
            active: None,
            placeholder: Stage::placeholder(),
            pending: None,
        }
    }

    /// Register a stage populated by a closure
    ///
    /// # Errors
    ///
    /// [`StageError::DuplicateStageName`] if `name` is taken; the existing
    /// registration is kept.
    pub fn add_stage<F>(&mut self, name: impl Into<String>, setup: F) -> Result<(), StageError>
    where
        F: FnMut(&mut Stage, SceneHandle) -> Result<(), StageError> + 'static,
    {
        self.add_stage_with(name, setup)
    }

    /// Register a stage populated by any [`StageSetup`]
    ///
    /// # Errors
    ///
    /// [`StageError::DuplicateStageName`] if `name` is taken.
    pub fn add_stage_with(
        &mut self,
        name: impl Into<String>,
        setup: impl StageSetup + 'static,
    ) -> Result<(), StageError> {
        let name = name.into();
        if self.stages.contains_key(&name) {
            return Err(StageError::DuplicateStageName(name));
        }
        log::debug!("registered stage '{name}'");
        self.stages.insert(
            name.clone(),
            StageEntry {
                stage: Stage::new(name.clone()),
                setup: Box::new(setup),
            },
        );
        self.order.push(name);
        Ok(())
    }

    /// Whether a stage named `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Registered names, in registration order
    pub fn stage_names(&self) -> &[String] {
        &self.order
    }

    /// Look up a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name).map(|entry| &entry.stage)
    }

    /// Look up a stage by name, mutably
    pub fn stage_mut(&mut self, name: &str) -> Option<&mut Stage> {
        self.stages.get_mut(name).map(|entry| &mut entry.stage)
    }

    /// The active stage (the placeholder before the first activation)
    pub fn active_stage(&self) -> &Stage {
        self.active
            .as_deref()
            .and_then(|name| self.stages.get(name))
            .map_or(&self.placeholder, |entry| &entry.stage)
    }

    /// The active stage, mutably
    pub fn active_stage_mut(&mut self) -> &mut Stage {
        match self.active.as_deref().and_then(|name| self.stages.get_mut(name)) {
            Some(entry) => &mut entry.stage,
            None => &mut self.placeholder,
        }
    }

    /// Name of the active stage, `None` while the placeholder is active
    pub fn active_stage_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Name of the stage whose load is in flight
    pub fn pending_stage(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.name.as_str())
    }

    /// Make `name` the active stage
    ///
    /// An unloaded stage starts loading and is polled once right away; if the
    /// scene is not ready yet this returns [`Activation::Pending`] and the
    /// load completes in a later [`poll_pending`](Self::poll_pending). A
    /// disposed stage is rebuilt from its setup.
    ///
    /// # Errors
    ///
    /// [`StageError::StageNotFound`] if `name` is not registered, or
    /// [`StageError::StageLoadFailure`] if the load failed immediately. The
    /// active stage is unchanged in both cases.
    pub fn set_active_stage(
        &mut self,
        name: &str,
        scheduler: &FrameScheduler,
        renderer: &mut dyn SceneRenderer,
    ) -> Result<Activation, StageError> {
        if !self.stages.contains_key(name) {
            log::warn!("cannot activate unknown stage '{name}'");
            return Err(StageError::StageNotFound(name.to_string()));
        }

        if self.pending_stage() == Some(name) {
            return Ok(Activation::Pending);
        }
        self.cancel_pending(renderer);

        if self.active.as_deref() == Some(name) {
            log::debug!("stage '{name}' is already active");
            return Ok(Activation::Activated);
        }

        let Some(entry) = self.stages.get_mut(name) else {
            return Err(StageError::StageNotFound(name.to_string()));
        };
        if entry.stage.state() == StageState::Disposed {
            log::debug!("rebuilding disposed stage '{name}'");
            entry.stage = Stage::new(name);
        }
        entry.stage.begin_load(scheduler);

        log::info!("loading stage '{name}'");
        let indicator = self.config.show_loading_indicator;
        if indicator {
            renderer.show_loading_indicator();
        }
        self.pending = Some(PendingLoad {
            name: name.to_string(),
            load: renderer.create_scene(name),
            stopwatch: Stopwatch::start_new(),
            indicator,
        });

        match self.poll_pending(scheduler, renderer) {
            None => Ok(Activation::Pending),
            Some(Ok(_)) => Ok(Activation::Activated),
            Some(Err(e)) => Err(e),
        }
    }

    /// Poll the in-flight load once without blocking
    ///
    /// Returns `None` if nothing resolved, otherwise the name of the stage
    /// that became active or the load error.
    pub fn poll_pending(
        &mut self,
        scheduler: &FrameScheduler,
        renderer: &mut dyn SceneRenderer,
    ) -> Option<LoadOutcome> {
        let mut pending = self.pending.take()?;

        let mut cx = Context::from_waker(Waker::noop());
        let result = match pending.load.as_mut().poll(&mut cx) {
            Poll::Pending => {
                self.pending = Some(pending);
                return None;
            }
            Poll::Ready(result) => result,
        };

        if pending.indicator {
            renderer.hide_loading_indicator();
        }
        let PendingLoad { name, stopwatch, .. } = pending;

        let outcome = match result {
            Ok(scene) => self.complete(&name, scene, scheduler, renderer),
            Err(e) => {
                if let Some(entry) = self.stages.get_mut(&name) {
                    entry.stage.abort_load(renderer, None);
                }
                Err(StageError::StageLoadFailure {
                    name: name.clone(),
                    reason: e.to_string(),
                })
            }
        };

        match &outcome {
            Ok(()) => log::info!(
                "stage '{name}' active after {:.1} ms",
                stopwatch.elapsed_millis()
            ),
            Err(e) => log::warn!("{e}"),
        }
        Some(outcome.map(|()| name))
    }

    fn complete(
        &mut self,
        name: &str,
        scene: SceneHandle,
        scheduler: &FrameScheduler,
        renderer: &mut dyn SceneRenderer,
    ) -> Result<(), StageError> {
        let was_running = scheduler.is_running();
        scheduler.stop();

        let populated = match self.stages.get_mut(name) {
            Some(StageEntry { stage, setup }) => match setup.populate(stage, scene) {
                Ok(()) => Ok(()),
                Err(e) => {
                    stage.abort_load(renderer, Some(scene));
                    Err(StageError::StageLoadFailure {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })
                }
            },
            None => {
                if let Err(e) = renderer.dispose_scene(scene) {
                    log::warn!("releasing {scene} of vanished stage '{name}': {e}");
                }
                Err(StageError::StageNotFound(name.to_string()))
            }
        };
        if let Err(e) = populated {
            if was_running {
                scheduler.start();
            }
            return Err(e);
        }

        scheduler.set_scene(None);
        self.active_stage_mut().dispose(renderer);
        self.active = Some(name.to_string());

        let frame = scheduler.latest_frame();
        self.active_stage_mut().activate(scene, frame);
        scheduler.set_scene(Some(scene));

        if was_running {
            scheduler.start();
        }
        Ok(())
    }

    fn cancel_pending(&mut self, renderer: &mut dyn SceneRenderer) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        log::info!("cancelling load of stage '{}'", pending.name);
        if pending.indicator {
            renderer.hide_loading_indicator();
        }
        // Dropping the future cancels the load.
        drop(pending.load);
        if let Some(entry) = self.stages.get_mut(&pending.name) {
            entry.stage.abort_load(renderer, None);
        }
    }

    /// Drop destroyed game objects from the active stage, if configured
    pub fn prune_active(&mut self) -> usize {
        if !self.config.prune_destroyed_objects {
            return 0;
        }
        self.active_stage_mut().prune_destroyed()
    }

    /// Cancel any load and dispose the active stage
    ///
    /// Afterwards the placeholder is active again.
    pub fn shutdown(&mut self, scheduler: &FrameScheduler, renderer: &mut dyn SceneRenderer) {
        self.cancel_pending(renderer);
        scheduler.set_scene(None);
        if let Some(name) = self.active.take() {
            if let Some(entry) = self.stages.get_mut(&name) {
                entry.stage.dispose(renderer);
            }
            log::info!("stage '{name}' shut down");
        }
        self.placeholder = Stage::placeholder();
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.order)
            .field("active", &self.active)
            .field("pending", &self.pending_stage())
            .finish()
    }
}
