use std::env;
use std::time::Duration;

use engine::{resolve_app_paths, AppError, GameSettings, ImageCache};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::demo::{DemoDirector, DemoTiming};

pub(crate) const DEMO_SECONDS_ENV_VAR: &str = "SPRITE_ENGINE_DEMO_SECONDS";

pub(crate) struct AppWiring {
    pub(crate) settings: GameSettings,
    pub(crate) director: DemoDirector,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Sprite Engine Startup ===");

    let paths = resolve_app_paths()?;
    let settings = GameSettings::load_or_default(&paths.settings_file)?;
    info!(
        root = %paths.root.display(),
        assets_dir = %paths.assets_dir.display(),
        settings_file = %paths.settings_file.display(),
        fps = settings.fps,
        max_frame_skips = settings.max_frame_skips,
        "startup"
    );

    let timing = DemoTiming {
        exit_after: parse_demo_seconds(env::var(DEMO_SECONDS_ENV_VAR).ok().as_deref()),
        ..DemoTiming::default()
    };
    let director = DemoDirector::new(ImageCache::new(&paths.assets_dir), &settings, timing);

    Ok(AppWiring { settings, director })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_demo_seconds(raw: Option<&str>) -> Option<Duration> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f32>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => {
            Some(Duration::from_secs_f32(seconds))
        }
        _ => {
            warn!(
                env_var = DEMO_SECONDS_ENV_VAR,
                value = raw,
                "invalid demo duration; running until closed"
            );
            None
        }
    }
}
