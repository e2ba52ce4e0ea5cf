use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use franz::agent::{ControlLoop, Decider, HttpDecider, RunArtifacts, ScriptedDecider};
use franz::coords::CoordinateSpace;
use franz::input::Injector;
use franz::logging;
use franz::overlay::{AttentionManager, Hud};
use franz::platform::create_platform;
use franz::settings::{CliArgs, Settings};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let mut settings = Settings::load(args.settings_path())
        .with_context(|| format!("load settings from {}", args.settings_path()))?;
    args.apply(&mut settings);
    logging::init(settings.debug_logging, settings.log_file.as_ref().map(PathBuf::from));

    let platform = create_platform(settings.headless)?;
    let screen = platform.screen.screen_size();
    let headless = platform.name == "headless";
    if headless && settings.start_paused {
        tracing::info!("headless run has no pause button; starting unpaused");
    }

    let hud = Hud::open(
        platform.surfaces.clone(),
        screen,
        &settings.hud,
        settings.start_paused && !headless,
        &settings.initial_story,
    )?;
    let markers = AttentionManager::new(
        platform.surfaces.clone(),
        CoordinateSpace::new(screen),
        settings.markers.clone(),
    );
    let injector = Injector::new(platform.input.clone(), settings.input);

    let bounds = settings.story_bounds();
    let decider: Box<dyn Decider> = if settings.test_mode {
        tracing::info!("test mode: using scripted decisions");
        Box::new(ScriptedDecider::new(bounds))
    } else {
        Box::new(HttpDecider::new(settings.decision.clone(), bounds)?)
    };

    let artifacts = settings.dump_dir.as_deref().and_then(|dir| {
        match RunArtifacts::create(Path::new(dir)) {
            Ok(run) => {
                tracing::info!(dir = %run.dir().display(), "saving run artifacts");
                Some(run)
            }
            Err(err) => {
                tracing::warn!(error = %err, "run artifacts disabled");
                None
            }
        }
    });

    tracing::info!(
        platform = platform.name,
        screen = ?screen,
        resolution = %settings.resolution,
        "starting"
    );
    let steps = ControlLoop::new(
        &hud,
        markers,
        injector,
        platform.screen.as_ref(),
        decider,
        artifacts,
        settings.loop_config(),
        &settings.initial_story,
    )
    .run();

    hud.close();
    tracing::info!(steps, "exiting");
    Ok(())
}
