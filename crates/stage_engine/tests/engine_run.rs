//! The engine main loop driven by an application, on the headless renderer.

use std::time::Duration;

use stage_engine::prelude::*;
use stage_engine::scene::LoadPlan;

#[derive(Default)]
struct Journal {
    entries: Vec<String>,
}

/// Adds a `Trail` to its owner on its first update
struct Sprout;

impl Lifecycle for Sprout {
    fn update(&mut self, ctx: &LifecycleContext<'_>) {
        if !ctx.object().has_component::<Trail>() {
            ctx.object().add_component(Trail::default());
        }
    }
}

impl Component for Sprout {}

#[derive(Default)]
struct Trail {
    awoken: bool,
    started: bool,
    updates: u32,
}

impl Lifecycle for Trail {
    fn awake(&mut self, _ctx: &LifecycleContext<'_>) {
        self.awoken = true;
    }

    fn start(&mut self, _ctx: &LifecycleContext<'_>) {
        self.started = true;
    }

    fn update(&mut self, _ctx: &LifecycleContext<'_>) {
        self.updates += 1;
    }
}

impl Component for Trail {}

struct TourApp {
    renderer: HeadlessRenderer,
    journal: Journal,
    arena_frames: u32,
    cleaned_up: bool,
}

impl TourApp {
    fn new(renderer: HeadlessRenderer) -> Self {
        Self {
            renderer,
            journal: Journal::default(),
            arena_frames: 0,
            cleaned_up: false,
        }
    }
}

impl Application for TourApp {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        engine.add_stage("menu", |stage: &mut Stage, _| {
            stage.add_game_object(GameObject::builder().named("cursor"))?;
            Ok(())
        })?;
        engine.add_stage("arena", |stage: &mut Stage, _| {
            stage.add_game_object(GameObject::builder().named("player"))?;
            stage.add_game_object(GameObject::builder().named("enemy"))?;
            Ok(())
        })?;
        self.renderer.plan_load("arena", LoadPlan::Delay(2));
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, report: &TickReport) -> Result<(), AppError> {
        if let Some(Ok(stage)) = &report.transition {
            self.journal.entries.push(format!("activated {stage}"));
        }

        let active = engine.stages().active_stage_name().map(str::to_owned);
        match active.as_deref() {
            Some("menu") if report.frame.frame_index == 2 => {
                let activation = engine.set_active_stage("arena")?;
                self.journal.entries.push(format!("arena {activation:?}"));
                engine.post_event(AppEvent::WindowResized { width: 640, height: 480 });
            }
            Some("arena") => {
                self.arena_frames += 1;
                if self.arena_frames == 2 {
                    engine.post_event(AppEvent::CloseRequested);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_event(&mut self, engine: &mut Engine, event: AppEvent) -> Result<(), AppError> {
        self.journal.entries.push(format!("{event:?}"));
        engine.handle_event(&event);
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        self.cleaned_up = true;
        assert_eq!(engine.active_stage().object_count(), 2);
    }
}

#[test]
fn run_loop_switches_stages_and_quits() {
    let renderer = HeadlessRenderer::new();
    let mut app = TourApp::new(renderer.clone());
    let config = EngineConfig::default().with_initial_stage("menu");

    Engine::run(config, renderer.clone(), &mut app).unwrap();

    assert_eq!(
        app.journal.entries,
        vec![
            "arena Pending".to_string(),
            "WindowResized { width: 640, height: 480 }".to_string(),
            "activated arena".to_string(),
            "CloseRequested".to_string(),
        ]
    );
    assert!(app.cleaned_up);
    assert_eq!(app.arena_frames, 2);
    assert_eq!(renderer.size(), Some((640, 480)));

    // Shutdown disposed whatever was still active.
    let arena = renderer.scenes_for("arena")[0];
    let menu = renderer.scenes_for("menu")[0];
    assert_eq!(renderer.dispose_count(menu), 1);
    assert_eq!(renderer.dispose_count(arena), 1);
    assert_eq!(renderer.loading_indicator_shown(), 2);
    assert!(!renderer.loading_indicator_visible());
}

struct FailingApp;

impl Application for FailingApp {
    fn initialize(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
        Ok(())
    }

    fn update(&mut self, _engine: &mut Engine, _report: &TickReport) -> Result<(), AppError> {
        Err(AppError::Custom("out of lives".into()))
    }

    fn cleanup(&mut self, _engine: &mut Engine) {}
}

#[test]
fn run_propagates_application_errors() {
    let result = Engine::run(EngineConfig::default(), HeadlessRenderer::new(), &mut FailingApp);
    match result {
        Err(EngineError::ApplicationError(message)) => assert!(message.contains("out of lives")),
        other => panic!("expected an application error, got {other:?}"),
    }
}

#[test]
fn run_reports_missing_initial_stage() {
    let config = EngineConfig::default().with_initial_stage("nowhere");
    let result = Engine::run(config, HeadlessRenderer::new(), &mut FailingApp);
    assert!(matches!(
        result,
        Err(EngineError::Stage(StageError::StageNotFound(ref name))) if name == "nowhere"
    ));
}

#[test]
fn component_added_mid_update_joins_next_tick() {
    let mut engine = Engine::new(EngineConfig::default(), HeadlessRenderer::new()).unwrap();
    engine
        .add_stage("garden", |stage: &mut Stage, _| {
            stage.add_game_object(GameObject::builder().named("seed").with_component(Sprout))?;
            Ok(())
        })
        .unwrap();
    engine.set_active_stage("garden").unwrap();

    engine.tick_with(Duration::from_millis(16));
    let seed = engine.active_stage().find_game_object("seed").unwrap();
    let trail = seed.component::<Trail>().unwrap();
    // Caught up on awake and start, but missed the update that added it.
    assert_eq!(trail.with(|t| (t.awoken, t.started, t.updates)), Some((true, true, 0)));

    engine.tick_with(Duration::from_millis(16));
    assert_eq!(trail.with(|t| t.updates), Some(1));
    assert_eq!(seed.component_count(), 2);
}
