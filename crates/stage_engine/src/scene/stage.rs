//! Stage: a named lifecycle container
//!
//! A stage owns the game objects of one logical scene plus the renderer scene
//! created for it. Its state moves `Unloaded -> Loading -> Active -> Disposed`;
//! a failed load goes back from `Loading` to `Unloaded` so it can be retried.
//!
//! Game objects can only be added while the stage is `Loading` or `Active`.
//! Objects added to an `Active` stage are awoken and started right away.

use std::fmt;

use thiserror::Error;

use crate::ecs::game_object::{GameObject, GameObjectBuilder, ObjectId};
use crate::ecs::scheduler::{FrameScheduler, SchedulerError};
use crate::foundation::time::FrameTime;
use crate::scene::renderer::{SceneHandle, SceneRenderer};

/// Name reported by the stage that is active before any real activation
pub const PLACEHOLDER_STAGE: &str = "<none>";

/// Stage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A stage with this name is already registered
    #[error("stage '{0}' is already registered")]
    DuplicateStageName(String),

    /// No stage with this name is registered
    #[error("stage '{0}' is not registered")]
    StageNotFound(String),

    /// Scene creation or setup failed; the stage is back to `Unloaded`
    #[error("stage '{name}' failed to load: {reason}")]
    StageLoadFailure {
        /// Stage that failed
        name: String,
        /// Underlying error, rendered
        reason: String,
    },

    /// Game objects were added outside `Loading` / `Active`
    #[error("stage '{stage}' does not accept game objects while {state:?}")]
    NotAcceptingObjects {
        /// Stage that refused the object
        stage: String,
        /// State it was in
        state: StageState,
    },

    /// A stage setup reported an error of its own
    #[error("stage setup failed: {0}")]
    Setup(String),

    /// A game object could not subscribe to the scheduler
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Lifecycle state of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageState {
    /// Registered, nothing created yet
    Unloaded,
    /// Scene creation in flight, or setup running
    Loading,
    /// The stage being ticked and rendered
    Active,
    /// Superseded; terminal for this instance
    Disposed,
}

/// Populates a stage once its scene exists
///
/// Runs while the stage is `Loading`, after the renderer resolved the scene
/// and before the stage becomes active. Returning an error fails the load.
pub trait StageSetup {
    /// Add the stage's game objects
    fn populate(&mut self, stage: &mut Stage, scene: SceneHandle) -> Result<(), StageError>;
}

impl<F> StageSetup for F
where
    F: FnMut(&mut Stage, SceneHandle) -> Result<(), StageError>,
{
    fn populate(&mut self, stage: &mut Stage, scene: SceneHandle) -> Result<(), StageError> {
        self(stage, scene)
    }
}

/// A named lifecycle container of game objects
pub struct Stage {
    name: String,
    state: StageState,
    scene: Option<SceneHandle>,
    objects: Vec<GameObject>,
    scheduler: Option<FrameScheduler>,
    next_id: u64,
}

impl Stage {
    /// Create an unloaded stage
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: StageState::Unloaded,
            scene: None,
            objects: Vec::new(),
            scheduler: None,
            next_id: 1,
        }
    }

    /// Stage that stands in as active before the first activation
    ///
    /// It has no scene and refuses game objects.
    pub(crate) fn placeholder() -> Self {
        Self {
            state: StageState::Active,
            ..Self::new(PLACEHOLDER_STAGE)
        }
    }

    /// Registry key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Renderer scene, present only while the stage is active
    pub fn scene(&self) -> Option<SceneHandle> {
        self.scene
    }

    /// Game objects in insertion order
    pub fn game_objects(&self) -> &[GameObject] {
        &self.objects
    }

    /// Number of game objects, destroyed ones not yet pruned included
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// First game object named `name`
    pub fn find_game_object(&self, name: &str) -> Option<GameObject> {
        self.objects
            .iter()
            .find(|object| object.name() == Some(name))
            .cloned()
    }

    /// Create a game object from `builder` and append it to the stage
    ///
    /// # Errors
    ///
    /// [`StageError::NotAcceptingObjects`] unless the stage is loading or
    /// active, [`StageError::Scheduler`] if the object could not subscribe.
    pub fn add_game_object(&mut self, builder: GameObjectBuilder) -> Result<GameObject, StageError> {
        let scheduler = match (&self.scheduler, self.state) {
            (Some(scheduler), StageState::Loading | StageState::Active) => scheduler.clone(),
            _ => {
                return Err(StageError::NotAcceptingObjects {
                    stage: self.name.clone(),
                    state: self.state,
                })
            }
        };

        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let frame = scheduler.latest_frame();
        let object = GameObject::create(id, builder, scheduler)?;
        log::debug!("stage '{}': added {object:?}", self.name);
        self.objects.push(object.clone());

        if self.state == StageState::Active {
            object.awake(frame);
            object.start(frame);
        }
        Ok(object)
    }

    /// Remove `object` from the stage and destroy it
    ///
    /// Returns `false` if the object does not belong to this stage.
    pub fn remove_game_object(&mut self, object: &GameObject) -> bool {
        let Some(index) = self.objects.iter().position(|o| o.ptr_eq(object)) else {
            return false;
        };
        let removed = self.objects.remove(index);
        removed.destroy();
        true
    }

    /// Drop destroyed game objects, returning how many were removed
    pub fn prune_destroyed(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|object| !object.is_destroyed());
        before - self.objects.len()
    }

    /// Awake every game object, in insertion order
    pub fn awake(&self, frame: FrameTime) {
        for object in self.objects.clone() {
            object.awake(frame);
        }
    }

    /// Start every game object, in insertion order
    pub fn start(&self, frame: FrameTime) {
        for object in self.objects.clone() {
            object.start(frame);
        }
    }

    /// Update every game object directly, bypassing the scheduler
    pub fn update(&self, frame: &FrameTime) {
        for object in self.objects.clone() {
            object.update(frame);
        }
    }

    /// Late-update every game object directly, bypassing the scheduler
    pub fn late_update(&self, frame: &FrameTime) {
        for object in self.objects.clone() {
            object.late_update(frame);
        }
    }

    pub(crate) fn begin_load(&mut self, scheduler: &FrameScheduler) {
        self.state = StageState::Loading;
        self.scheduler = Some(scheduler.clone());
    }

    /// Enter `Active` with `scene`, then awake and start every object
    pub(crate) fn activate(&mut self, scene: SceneHandle, frame: FrameTime) {
        self.scene = Some(scene);
        self.state = StageState::Active;
        self.awake(frame);
        self.start(frame);
    }

    /// Undo a load, returning to `Unloaded`
    pub(crate) fn abort_load(&mut self, renderer: &mut dyn SceneRenderer, scene: Option<SceneHandle>) {
        self.destroy_objects();
        if let Some(scene) = scene {
            if let Err(e) = renderer.dispose_scene(scene) {
                log::warn!("stage '{}': releasing {scene} after failed load: {e}", self.name);
            }
        }
        self.scheduler = None;
        self.scene = None;
        self.state = StageState::Unloaded;
    }

    /// Destroy every object and release the scene
    ///
    /// Teardown errors are logged, never returned.
    pub(crate) fn dispose(&mut self, renderer: &mut dyn SceneRenderer) {
        if self.state == StageState::Disposed {
            return;
        }
        let destroyed = self.destroy_objects();
        if let Some(scene) = self.scene.take() {
            if let Err(e) = renderer.dispose_scene(scene) {
                log::warn!("stage '{}': disposing {scene} failed: {e}", self.name);
            }
        }
        self.scheduler = None;
        self.state = StageState::Disposed;
        log::debug!("stage '{}' disposed ({destroyed} objects)", self.name);
    }

    fn destroy_objects(&mut self) -> usize {
        let objects = std::mem::take(&mut self.objects);
        for object in &objects {
            object.destroy();
        }
        objects.len()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("scene", &self.scene)
            .field("objects", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SchedulerConfig;
    use crate::ecs::component::Component;
    use crate::ecs::lifecycle::{Lifecycle, LifecycleContext};
    use crate::ecs::scheduler::FramePhase;
    use crate::scene::headless::HeadlessRenderer;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Appends "<tag>:<hook>" to a shared journal
    struct Journal {
        tag: &'static str,
        entries: Rc<RefCell<Vec<String>>>,
    }

    impl Journal {
        fn record(&self, hook: &str) {
            self.entries.borrow_mut().push(format!("{}:{hook}", self.tag));
        }
    }

    impl Lifecycle for Journal {
        fn awake(&mut self, _ctx: &LifecycleContext<'_>) {
            self.record("awake");
        }
        fn start(&mut self, _ctx: &LifecycleContext<'_>) {
            self.record("start");
        }
        fn update(&mut self, _ctx: &LifecycleContext<'_>) {
            self.record("update");
        }
    }
    impl Component for Journal {}

    fn loading_stage(scheduler: &FrameScheduler) -> Stage {
        let mut stage = Stage::new("arena");
        stage.begin_load(scheduler);
        stage
    }

    fn journaled(tag: &'static str, entries: &Rc<RefCell<Vec<String>>>) -> GameObjectBuilder {
        GameObject::builder().named(tag).with_component(Journal {
            tag,
            entries: Rc::clone(entries),
        })
    }

    #[test]
    fn test_unloaded_stage_rejects_objects() {
        let mut stage = Stage::new("arena");
        let err = stage.add_game_object(GameObject::builder()).unwrap_err();
        assert_eq!(
            err,
            StageError::NotAcceptingObjects {
                stage: "arena".into(),
                state: StageState::Unloaded,
            }
        );
        assert!(Stage::placeholder().add_game_object(GameObject::builder()).is_err());
    }

    #[test]
    fn test_activation_awakes_all_before_starting_any() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let mut renderer = HeadlessRenderer::new();
        let entries = Rc::new(RefCell::new(Vec::new()));

        let mut stage = loading_stage(&scheduler);
        stage.add_game_object(journaled("a", &entries)).unwrap();
        stage.add_game_object(journaled("b", &entries)).unwrap();
        assert!(entries.borrow().is_empty());

        stage.activate(renderer.create_scene_now("arena"), FrameTime::default());
        assert_eq!(*entries.borrow(), vec!["a:awake", "b:awake", "a:start", "b:start"]);
    }

    #[test]
    fn test_object_added_to_active_stage_starts_immediately() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let mut renderer = HeadlessRenderer::new();
        let entries = Rc::new(RefCell::new(Vec::new()));

        let mut stage = loading_stage(&scheduler);
        stage.activate(renderer.create_scene_now("arena"), FrameTime::default());
        stage.add_game_object(journaled("late", &entries)).unwrap();

        assert_eq!(*entries.borrow(), vec!["late:awake", "late:start"]);
    }

    #[test]
    fn test_fan_out_follows_insertion_order() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let entries = Rc::new(RefCell::new(Vec::new()));

        let mut stage = loading_stage(&scheduler);
        for tag in ["first", "second", "third"] {
            stage.add_game_object(journaled(tag, &entries)).unwrap();
        }
        // Not started yet, so nothing updates.
        stage.update(&FrameTime::default());
        assert!(entries.borrow().is_empty());

        stage.activate(HeadlessRenderer::new().create_scene_now("arena"), FrameTime::default());
        entries.borrow_mut().clear();
        stage.update(&FrameTime::default());

        assert_eq!(
            *entries.borrow(),
            vec!["first:update", "second:update", "third:update"]
        );
    }

    #[test]
    fn test_remove_destroys_object() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let mut stage = loading_stage(&scheduler);
        let keep = stage.add_game_object(GameObject::builder().named("keep")).unwrap();
        let gone = stage.add_game_object(GameObject::builder().named("gone")).unwrap();

        assert!(stage.remove_game_object(&gone));
        assert!(!stage.remove_game_object(&gone));
        assert!(gone.is_destroyed());
        assert!(!keep.is_destroyed());
        assert_eq!(stage.object_count(), 1);
        assert!(stage.find_game_object("gone").is_none());
        assert!(stage.find_game_object("keep").unwrap().ptr_eq(&keep));
        assert_eq!(scheduler.subscription_count(FramePhase::PreRender), 1);
    }

    #[test]
    fn test_prune_drops_only_destroyed_objects() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let mut stage = loading_stage(&scheduler);
        let a = stage.add_game_object(GameObject::builder()).unwrap();
        stage.add_game_object(GameObject::builder()).unwrap();
        a.destroy();

        assert_eq!(stage.prune_destroyed(), 1);
        assert_eq!(stage.prune_destroyed(), 0);
        assert_eq!(stage.object_count(), 1);
    }

    #[test]
    fn test_dispose_destroys_objects_and_releases_scene() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let mut renderer = HeadlessRenderer::new();
        let mut stage = loading_stage(&scheduler);
        let object = stage.add_game_object(GameObject::builder()).unwrap();
        let scene = renderer.create_scene_now("arena");
        stage.activate(scene, FrameTime::default());

        stage.dispose(&mut renderer);
        stage.dispose(&mut renderer);

        assert_eq!(stage.state(), StageState::Disposed);
        assert!(stage.scene().is_none());
        assert!(object.is_destroyed());
        assert_eq!(scheduler.subscription_count(FramePhase::PreRender), 0);
        assert_eq!(renderer.dispose_count(scene), 1);
        assert!(stage.add_game_object(GameObject::builder()).is_err());
    }

    #[test]
    fn test_failed_disposal_still_completes() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let mut renderer = HeadlessRenderer::new();
        renderer.fail_disposals(true);
        let mut stage = loading_stage(&scheduler);
        stage.activate(renderer.create_scene_now("arena"), FrameTime::default());

        stage.dispose(&mut renderer);
        assert_eq!(stage.state(), StageState::Disposed);
    }

    #[test]
    fn test_abort_returns_to_unloaded() {
        let scheduler = FrameScheduler::new(&SchedulerConfig::default());
        let mut renderer = HeadlessRenderer::new();
        let mut stage = loading_stage(&scheduler);
        let object = stage.add_game_object(GameObject::builder()).unwrap();
        let scene = renderer.create_scene_now("arena");

        stage.abort_load(&mut renderer, Some(scene));

        assert_eq!(stage.state(), StageState::Unloaded);
        assert!(object.is_destroyed());
        assert_eq!(stage.object_count(), 0);
        assert!(!renderer.is_live(scene));
    }
}
