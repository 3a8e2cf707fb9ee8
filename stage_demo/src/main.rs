//! Headless stage demo
//!
//! Runs a title stage for a few frames, then loads an asteroid field whose
//! scene takes several frames to build. Asteroids drift and expire; the demo
//! quits once the field is empty or after a frame cap.
//!
//! Usage: `stage_demo [config.toml|config.ron]`

use std::time::Duration;

use rand::Rng;
use stage_engine::config::ConfigError;
use stage_engine::prelude::*;
use stage_engine::scene::LoadPlan;
use thiserror::Error;

// Configuration constants
const ASTEROID_COUNT: usize = 12;
const TITLE_FRAMES: u64 = 30;
const MAX_FRAMES: u64 = 2_000;
const FRAME_TIME: Duration = Duration::from_millis(16);

#[derive(Error, Debug)]
enum DemoError {
    #[error("failed to load config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Moves its owner along a straight line
struct Drift {
    position: [f32; 2],
    velocity: [f32; 2],
}

impl Lifecycle for Drift {
    fn update(&mut self, ctx: &LifecycleContext<'_>) {
        let dt = ctx.delta_time();
        self.position[0] += self.velocity[0] * dt;
        self.position[1] += self.velocity[1] * dt;
    }
}

impl Component for Drift {}

/// Destroys its owner once its time runs out
struct Lifetime {
    remaining: f32,
}

impl Lifecycle for Lifetime {
    fn late_update(&mut self, ctx: &LifecycleContext<'_>) {
        self.remaining -= ctx.delta_time();
        if self.remaining <= 0.0 {
            let object = ctx.object();
            if let Some(position) = object.with_component::<Drift, _>(|d| d.position) {
                log::debug!("{object:?} expired at ({:.1}, {:.1})", position[0], position[1]);
            }
            object.destroy();
        }
    }
}

impl Component for Lifetime {}

/// Logs when the title stage comes up
struct Banner;

impl Lifecycle for Banner {
    fn start(&mut self, _ctx: &LifecycleContext<'_>) {
        log::info!("== STAGE DEMO ==");
    }
}

impl Component for Banner {}

struct StageDemoApp {
    renderer: HeadlessRenderer,
    field_cleared: bool,
}

impl StageDemoApp {
    fn new(renderer: HeadlessRenderer) -> Self {
        Self {
            renderer,
            field_cleared: false,
        }
    }
}

impl Application for StageDemoApp {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        engine.add_stage("title", |stage: &mut Stage, _scene| {
            stage.add_game_object(GameObject::builder().named("banner").with_component(Banner))?;
            Ok(())
        })?;

        engine.add_stage("asteroids", |stage: &mut Stage, scene| {
            let mut rng = rand::thread_rng();
            for i in 0..ASTEROID_COUNT {
                let drift = Drift {
                    position: [rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)],
                    velocity: [rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)],
                };
                let lifetime = Lifetime {
                    remaining: rng.gen_range(0.5..3.0),
                };
                stage.add_game_object(
                    GameObject::builder()
                        .named(format!("asteroid-{i}"))
                        .with_component(drift)
                        .with_component(lifetime),
                )?;
            }
            log::info!("spawned {ASTEROID_COUNT} asteroids into {scene}");
            Ok(())
        })?;

        // Pretend the field takes a while to import.
        self.renderer.plan_load("asteroids", LoadPlan::Delay(10));
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, report: &TickReport) -> Result<(), AppError> {
        match &report.transition {
            Some(Ok(stage)) => log::info!("frame {}: '{stage}' is live", report.frame.frame_index),
            Some(Err(e)) => return Err(AppError::Custom(e.to_string())),
            None => {}
        }

        let active = engine.stages().active_stage_name().map(str::to_owned);
        match active.as_deref() {
            Some("title") if report.frame.frame_index == TITLE_FRAMES => {
                let activation = engine.set_active_stage("asteroids")?;
                log::info!("requested asteroid field: {activation:?}");
            }
            Some("asteroids") if engine.active_stage().object_count() == 0 => {
                self.field_cleared = true;
                log::info!("asteroid field cleared at frame {}", report.frame.frame_index);
                engine.post_event(AppEvent::CloseRequested);
            }
            _ => {}
        }

        if report.frame.frame_index >= MAX_FRAMES {
            log::warn!("frame cap reached, quitting");
            engine.quit();
        }

        // No vsync to pace us.
        std::thread::sleep(FRAME_TIME);
        Ok(())
    }

    fn cleanup(&mut self, _engine: &mut Engine) {
        log::info!(
            "rendered {} frames, field cleared: {}",
            self.renderer.renders().len(),
            self.field_cleared
        );
    }
}

fn main() -> Result<(), DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    let config = if config.initial_stage.is_some() {
        config
    } else {
        config.with_initial_stage("title")
    };

    let renderer = HeadlessRenderer::new();
    let mut app = StageDemoApp::new(renderer.clone());
    Engine::run(config, renderer, &mut app)?;
    Ok(())
}
