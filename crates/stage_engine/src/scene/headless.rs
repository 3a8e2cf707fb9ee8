//! Headless renderer
//!
//! A [`SceneRenderer`] that draws nothing and records every call. Loads can be
//! scripted per stage to stay pending for a number of polls or to fail, which
//! makes it the renderer of choice for tests, tools and the demo binary.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use super::renderer::{RenderError, RenderResult, SceneHandle, SceneLoad, SceneRenderer};

/// Scripted outcome of the next load of a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// Resolve on the first poll
    Ready,
    /// Stay pending for this many polls, then resolve
    Delay(u32),
    /// Fail on the first poll with this reason
    Fail(String),
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_scene: u64,
    live: BTreeMap<SceneHandle, String>,
    created: Vec<(String, SceneHandle)>,
    disposed: Vec<SceneHandle>,
    renders: Vec<SceneHandle>,
    plans: HashMap<String, VecDeque<LoadPlan>>,
    failing_disposals: bool,
    indicator_visible: bool,
    indicator_shown: usize,
    size: Option<(u32, u32)>,
}

impl HeadlessState {
    fn allocate(&mut self, stage: &str) -> SceneHandle {
        self.next_scene += 1;
        let scene = SceneHandle(self.next_scene);
        self.live.insert(scene, stage.to_string());
        self.created.push((stage.to_string(), scene));
        scene
    }
}

/// Renderer that records instead of drawing
///
/// Clones share state, so a test can keep one clone while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderer {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessRenderer {
    /// Create a renderer whose loads all resolve immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next load of `stage`
    pub fn plan_load(&self, stage: impl Into<String>, plan: LoadPlan) {
        self.state
            .borrow_mut()
            .plans
            .entry(stage.into())
            .or_default()
            .push_back(plan);
    }

    /// Make every following disposal report an error (the scene is still released)
    pub fn fail_disposals(&self, failing: bool) {
        self.state.borrow_mut().failing_disposals = failing;
    }

    /// Create a scene synchronously, bypassing load plans
    pub fn create_scene_now(&mut self, stage: &str) -> SceneHandle {
        self.state.borrow_mut().allocate(stage)
    }

    /// Scenes created so far, with the stage they were created for
    pub fn created_scenes(&self) -> Vec<(String, SceneHandle)> {
        self.state.borrow().created.clone()
    }

    /// Scenes created for `stage`, oldest first
    pub fn scenes_for(&self, stage: &str) -> Vec<SceneHandle> {
        self.state
            .borrow()
            .created
            .iter()
            .filter(|(name, _)| name == stage)
            .map(|&(_, scene)| scene)
            .collect()
    }

    /// Whether `scene` exists and has not been disposed
    pub fn is_live(&self, scene: SceneHandle) -> bool {
        self.state.borrow().live.contains_key(&scene)
    }

    /// How many times disposal was requested for `scene`
    pub fn dispose_count(&self, scene: SceneHandle) -> usize {
        self.state.borrow().disposed.iter().filter(|&&s| s == scene).count()
    }

    /// How many frames of `scene` were drawn
    pub fn render_count(&self, scene: SceneHandle) -> usize {
        self.state.borrow().renders.iter().filter(|&&s| s == scene).count()
    }

    /// Every drawn frame, in order
    pub fn renders(&self) -> Vec<SceneHandle> {
        self.state.borrow().renders.clone()
    }

    /// Whether the loading indicator is currently shown
    pub fn loading_indicator_visible(&self) -> bool {
        self.state.borrow().indicator_visible
    }

    /// How many times the loading indicator was shown
    pub fn loading_indicator_shown(&self) -> usize {
        self.state.borrow().indicator_shown
    }

    /// Last size passed to `resize`
    pub fn size(&self) -> Option<(u32, u32)> {
        self.state.borrow().size
    }
}

impl SceneRenderer for HeadlessRenderer {
    fn create_scene(&mut self, stage: &str) -> SceneLoad {
        let plan = self
            .state
            .borrow_mut()
            .plans
            .get_mut(stage)
            .and_then(VecDeque::pop_front)
            .unwrap_or(LoadPlan::Ready);
        log::debug!("headless: creating scene for '{stage}' ({plan:?})");

        let (remaining, failure) = match plan {
            LoadPlan::Ready => (0, None),
            LoadPlan::Delay(polls) => (polls, None),
            LoadPlan::Fail(reason) => (0, Some(reason)),
        };
        Box::pin(HeadlessLoad {
            state: Rc::clone(&self.state),
            stage: stage.to_string(),
            remaining,
            failure,
        })
    }

    fn dispose_scene(&mut self, scene: SceneHandle) -> RenderResult<()> {
        let mut state = self.state.borrow_mut();
        state.disposed.push(scene);
        if state.live.remove(&scene).is_none() {
            return Err(RenderError::UnknownScene(scene));
        }
        if state.failing_disposals {
            return Err(RenderError::Disposal(format!("{scene} did not release cleanly")));
        }
        Ok(())
    }

    fn render_once(&mut self, scene: SceneHandle) -> RenderResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.live.contains_key(&scene) {
            return Err(RenderError::UnknownScene(scene));
        }
        state.renders.push(scene);
        Ok(())
    }

    fn show_loading_indicator(&mut self) {
        let mut state = self.state.borrow_mut();
        state.indicator_visible = true;
        state.indicator_shown += 1;
    }

    fn hide_loading_indicator(&mut self) {
        self.state.borrow_mut().indicator_visible = false;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.state.borrow_mut().size = Some((width, height));
    }
}

struct HeadlessLoad {
    state: Rc<RefCell<HeadlessState>>,
    stage: String,
    remaining: u32,
    failure: Option<String>,
}

impl Future for HeadlessLoad {
    type Output = RenderResult<SceneHandle>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.remaining > 0 {
            self.remaining -= 1;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        if let Some(reason) = self.failure.take() {
            return Poll::Ready(Err(RenderError::SceneCreation(reason)));
        }
        let scene = self.state.borrow_mut().allocate(&self.stage);
        Poll::Ready(Ok(scene))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::Waker;

    fn poll(load: &mut SceneLoad) -> Poll<RenderResult<SceneHandle>> {
        load.as_mut().poll(&mut Context::from_waker(Waker::noop()))
    }

    #[test]
    fn test_delayed_load_resolves_after_polls() {
        let mut renderer = HeadlessRenderer::new();
        renderer.plan_load("arena", LoadPlan::Delay(2));

        let mut load = renderer.create_scene("arena");
        assert!(poll(&mut load).is_pending());
        assert!(poll(&mut load).is_pending());
        let Poll::Ready(Ok(scene)) = poll(&mut load) else {
            panic!("load should have resolved");
        };
        assert!(renderer.is_live(scene));
        assert_eq!(renderer.scenes_for("arena"), vec![scene]);
    }

    #[test]
    fn test_failed_load_creates_nothing() {
        let mut renderer = HeadlessRenderer::new();
        renderer.plan_load("arena", LoadPlan::Fail("missing mesh".into()));

        let mut load = renderer.create_scene("arena");
        assert!(matches!(poll(&mut load), Poll::Ready(Err(RenderError::SceneCreation(_)))));
        assert!(renderer.created_scenes().is_empty());

        // Plans are consumed; the retry uses the default.
        let mut retry = renderer.create_scene("arena");
        assert!(matches!(poll(&mut retry), Poll::Ready(Ok(_))));
    }

    #[test]
    fn test_disposed_scene_cannot_render() {
        let mut renderer = HeadlessRenderer::new();
        let scene = renderer.create_scene_now("menu");

        renderer.render_once(scene).unwrap();
        renderer.dispose_scene(scene).unwrap();

        assert_eq!(renderer.render_once(scene), Err(RenderError::UnknownScene(scene)));
        assert_eq!(renderer.dispose_scene(scene), Err(RenderError::UnknownScene(scene)));
        assert_eq!(renderer.render_count(scene), 1);
        assert_eq!(renderer.dispose_count(scene), 2);
    }

    #[test]
    fn test_failing_disposal_still_releases() {
        let mut renderer = HeadlessRenderer::new();
        let scene = renderer.create_scene_now("menu");
        renderer.fail_disposals(true);

        assert!(matches!(renderer.dispose_scene(scene), Err(RenderError::Disposal(_))));
        assert!(!renderer.is_live(scene));
    }
}
