//! Core engine implementation

use std::collections::VecDeque;
use std::time::Duration;

use crate::{
    application::{AppEvent, Application},
    config::ConfigError,
    core::config::EngineConfig,
    ecs::scheduler::FrameScheduler,
    foundation::{
        logging,
        time::{FrameClock, FrameTime},
    },
    scene::{Activation, LoadOutcome, SceneHandle, SceneRenderer, Stage, StageError, StageRegistry},
};
use thiserror::Error;

/// Main engine struct
///
/// The engine owns the frame scheduler, the stage registry, the renderer and
/// the frame clock. It is built once and passed by reference; there is no
/// global instance.
pub struct Engine {
    /// Frame scheduler shared with every game object
    scheduler: FrameScheduler,

    /// Named stages and the active one
    stages: StageRegistry,

    /// Rendering collaborator
    renderer: Box<dyn SceneRenderer>,

    /// Frame timing
    clock: FrameClock,

    /// Engine configuration
    config: EngineConfig,

    /// Events waiting for the application
    events: VecDeque<AppEvent>,

    /// Whether the main loop should continue running
    running: bool,
}

/// What one engine tick did
#[derive(Debug)]
pub struct TickReport {
    /// Timing of the tick
    pub frame: FrameTime,
    /// Pre-render callbacks invoked
    pub dispatched_pre: usize,
    /// Post-render callbacks invoked
    pub dispatched_post: usize,
    /// Whether a scene was drawn
    pub rendered: bool,
    /// The scheduler was stopped, no callbacks ran
    pub skipped: bool,
    /// Destroyed game objects dropped from the active stage after the tick
    pub pruned: usize,
    /// A stage load that resolved at the start of this tick
    pub transition: Option<LoadOutcome>,
}

impl Engine {
    /// Create a new engine instance
    ///
    /// Validates `config` and initializes logging from it. No stage is active
    /// until [`set_active_stage`](Self::set_active_stage) is called.
    pub fn new(config: EngineConfig, renderer: impl SceneRenderer + 'static) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init_logging(&config.logging);
        log::info!("Initializing engine...");

        Ok(Self {
            scheduler: FrameScheduler::new(&config.scheduler),
            stages: StageRegistry::new(config.stages.clone()),
            renderer: Box::new(renderer),
            clock: FrameClock::from_config(&config.time)?,
            config,
            events: VecDeque::new(),
            running: true,
        })
    }

    /// Run the engine main loop with the given application
    ///
    /// Each iteration hands queued events to the application, ticks once and
    /// then calls [`Application::update`]. The loop ends after
    /// [`quit`](Self::quit) or an [`AppEvent::CloseRequested`].
    pub fn run<A: Application>(
        config: EngineConfig,
        renderer: impl SceneRenderer + 'static,
        app: &mut A,
    ) -> Result<(), EngineError> {
        let mut engine = Self::new(config, renderer)?;

        app.initialize(&mut engine)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {e}")))?;

        if let Some(initial) = engine.config.initial_stage.clone() {
            engine.set_active_stage(&initial)?;
        }

        log::info!("Starting main loop...");

        while engine.running {
            while let Some(event) = engine.events.pop_front() {
                app.handle_event(&mut engine, event)
                    .map_err(|e| EngineError::ApplicationError(format!("App event: {e}")))?;
            }
            if !engine.running {
                break;
            }

            let report = engine.tick();
            app.update(&mut engine, &report)
                .map_err(|e| EngineError::ApplicationError(format!("App update: {e}")))?;
        }

        // Cleanup
        app.cleanup(&mut engine);
        engine.shutdown();

        log::info!("Engine shutdown complete");
        Ok(())
    }

    /// Register a stage populated by `setup` once its scene exists
    pub fn add_stage<F>(&mut self, name: impl Into<String>, setup: F) -> Result<(), StageError>
    where
        F: FnMut(&mut Stage, SceneHandle) -> Result<(), StageError> + 'static,
    {
        self.stages.add_stage(name, setup)
    }

    /// Switch to the stage named `name`
    ///
    /// See [`StageRegistry::set_active_stage`].
    pub fn set_active_stage(&mut self, name: &str) -> Result<Activation, StageError> {
        self.stages
            .set_active_stage(name, &self.scheduler, self.renderer.as_mut())
    }

    /// Resume per-frame dispatch
    pub fn start_scheduler(&self) {
        self.scheduler.start();
    }

    /// Pause per-frame dispatch; ticks still poll pending stage loads
    pub fn stop_scheduler(&self) {
        self.scheduler.stop();
    }

    /// Advance one frame, timed by the wall clock
    pub fn tick(&mut self) -> TickReport {
        let frame = self.clock.tick();
        self.advance(frame)
    }

    /// Advance one frame with an explicit delta (clamped like wall-clock deltas)
    pub fn tick_with(&mut self, delta: Duration) -> TickReport {
        let frame = self.clock.tick_with(delta);
        self.advance(frame)
    }

    fn advance(&mut self, frame: FrameTime) -> TickReport {
        let transition = self
            .stages
            .poll_pending(&self.scheduler, self.renderer.as_mut());
        let stats = self.scheduler.run_tick(frame, self.renderer.as_mut());
        let pruned = self.stages.prune_active();

        TickReport {
            frame,
            dispatched_pre: stats.pre_render,
            dispatched_post: stats.post_render,
            rendered: stats.rendered,
            skipped: stats.skipped,
            pruned,
            transition,
        }
    }

    /// Forward a new output size to the renderer
    pub fn resize(&mut self, width: u32, height: u32) {
        log::debug!("resize to {width}x{height}");
        self.renderer.resize(width, height);
    }

    /// Queue an event for the application
    pub fn post_event(&mut self, event: AppEvent) {
        self.events.push_back(event);
    }

    /// Handle an application event
    pub fn handle_event(&mut self, event: &AppEvent) {
        match *event {
            AppEvent::WindowResized { width, height } => self.resize(width, height),
            AppEvent::CloseRequested => self.quit(),
        }
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the main loop should keep running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the scheduler and dispose the active stage
    pub fn shutdown(&mut self) {
        self.running = false;
        self.scheduler.stop();
        self.stages
            .shutdown(&self.scheduler, self.renderer.as_mut());
    }

    /// Get the frame scheduler
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Get the stage registry
    pub fn stages(&self) -> &StageRegistry {
        &self.stages
    }

    /// Get mutable access to the stage registry
    pub fn stages_mut(&mut self) -> &mut StageRegistry {
        &mut self.stages
    }

    /// Get the active stage
    pub fn active_stage(&self) -> &Stage {
        self.stages.active_stage()
    }

    /// Get mutable access to the active stage
    pub fn active_stage_mut(&mut self) -> &mut Stage {
        self.stages.active_stage_mut()
    }

    /// Get the engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Timing of the most recent tick
    pub fn latest_frame(&self) -> FrameTime {
        self.clock.latest()
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stage registration or activation error
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Component;
    use crate::ecs::game_object::GameObject;
    use crate::ecs::lifecycle::{Lifecycle, LifecycleContext};
    use crate::scene::{HeadlessRenderer, LoadPlan};
    use approx::assert_relative_eq;

    #[derive(Default)]
    struct Spin {
        updates: u32,
        angle: f32,
    }

    impl Lifecycle for Spin {
        fn update(&mut self, ctx: &LifecycleContext<'_>) {
            self.updates += 1;
            self.angle += 90.0 * ctx.delta_time();
        }
    }
    impl Component for Spin {}

    fn spinning_stage(stage: &mut Stage, _scene: SceneHandle) -> Result<(), StageError> {
        stage.add_game_object(GameObject::builder().named("spinner").with_component(Spin::default()))?;
        Ok(())
    }

    fn engine() -> (Engine, HeadlessRenderer) {
        let renderer = HeadlessRenderer::new();
        let engine = Engine::new(EngineConfig::default(), renderer.clone()).unwrap();
        (engine, renderer)
    }

    fn spin(engine: &Engine) -> (u32, f32) {
        engine
            .active_stage()
            .find_game_object("spinner")
            .and_then(|o| o.with_component::<Spin, _>(|s| (s.updates, s.angle)))
            .unwrap()
    }

    #[test]
    fn test_tick_dispatches_and_renders_active_stage() {
        let (mut engine, renderer) = engine();
        engine.add_stage("main", spinning_stage).unwrap();
        engine.set_active_stage("main").unwrap();

        let report = engine.tick_with(Duration::from_millis(500));
        assert_eq!(report.dispatched_pre, 1);
        assert_eq!(report.dispatched_post, 1);
        assert!(report.rendered);
        assert!(report.transition.is_none());

        let scene = engine.active_stage().scene().unwrap();
        assert_eq!(renderer.render_count(scene), 1);

        // 500 ms is clamped to the default 250 ms ceiling.
        let (updates, angle) = spin(&engine);
        assert_eq!(updates, 1);
        assert_relative_eq!(angle, 22.5, epsilon = 1e-4);
    }

    #[test]
    fn test_pending_load_reports_transition() {
        let (mut engine, renderer) = engine();
        engine.add_stage("main", spinning_stage).unwrap();
        renderer.plan_load("main", LoadPlan::Delay(1));

        assert_eq!(engine.set_active_stage("main"), Ok(Activation::Pending));
        let first = engine.tick_with(Duration::from_millis(16));
        assert_eq!(first.transition, Some(Ok("main".to_string())));
        // The swap happens before dispatch, so the new stage ticks right away.
        assert_eq!(first.dispatched_pre, 1);
        assert!(first.rendered);
    }

    #[test]
    fn test_stopped_scheduler_skips_tick() {
        let (mut engine, renderer) = engine();
        engine.add_stage("main", spinning_stage).unwrap();
        engine.set_active_stage("main").unwrap();
        engine.stop_scheduler();

        let report = engine.tick_with(Duration::from_millis(16));
        assert!(report.skipped);
        assert!(renderer.renders().is_empty());
        assert_eq!(spin(&engine).0, 0);

        engine.start_scheduler();
        assert!(!engine.tick_with(Duration::from_millis(16)).skipped);
        assert_eq!(spin(&engine).0, 1);
    }

    #[test]
    fn test_destroyed_objects_are_pruned_after_tick() {
        let (mut engine, _) = engine();
        engine.add_stage("main", spinning_stage).unwrap();
        engine.set_active_stage("main").unwrap();

        engine.active_stage().game_objects()[0].destroy();
        let report = engine.tick_with(Duration::from_millis(16));
        assert_eq!(report.pruned, 1);
        assert_eq!(engine.active_stage().object_count(), 0);
    }

    #[test]
    fn test_events_resize_and_quit() {
        let (mut engine, renderer) = engine();
        engine.handle_event(&AppEvent::WindowResized { width: 800, height: 600 });
        assert_eq!(renderer.size(), Some((800, 600)));

        engine.handle_event(&AppEvent::CloseRequested);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.time.min_delta_ms = 500.0;
        let result = Engine::new(config, HeadlessRenderer::new());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_unrepresentable_delta_clamp_is_rejected() {
        let mut config = EngineConfig::default();
        config.time.max_delta_ms = 1.0e25;
        let result = Engine::new(config, HeadlessRenderer::new());
        assert!(matches!(result, Err(EngineError::Config(ConfigError::Invalid(_)))));
    }
}
