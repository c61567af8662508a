use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const FPS_ENV_VAR: &str = "SPRITE_ENGINE_FPS";
pub const MAX_FRAME_SKIPS_ENV_VAR: &str = "SPRITE_ENGINE_MAX_FRAME_SKIPS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings at {field}: {source}")]
    Parse {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Engine-wide settings. Every field has a default, so a settings file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameSettings {
    pub window_title: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub fps: u32,
    /// Most update-only passes a tick may run to catch up.
    pub max_frame_skips: u32,
    pub background_color: [u8; 4],
    pub font_color: [u8; 4],
    pub metrics_log_interval_ms: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            window_title: "Sprite Engine".to_string(),
            screen_width: 800,
            screen_height: 600,
            fps: 60,
            max_frame_skips: 5,
            background_color: [0, 0, 0, 255],
            font_color: [0, 0, 0, 255],
            metrics_log_interval_ms: 1000,
        }
    }
}

impl GameSettings {
    pub fn from_json_str(raw: &str) -> Result<Self, SettingsError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            SettingsError::Parse {
                field: if path.is_empty() { ".".to_string() } else { path },
                source: error.into_inner(),
            }
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Uses the file when present, defaults otherwise; env overrides apply
    /// in both cases.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        let settings = if path.is_file() {
            Self::from_json_file(path)?
        } else {
            Self::default()
        };
        Ok(settings.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(fps) = read_u32_env(FPS_ENV_VAR) {
            self.fps = fps;
        }
        if let Some(skips) = read_u32_env(MAX_FRAME_SKIPS_ENV_VAR) {
            self.max_frame_skips = skips;
        }
        self
    }

    /// `1000 / fps` milliseconds; fps below one counts as one.
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }

    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_log_interval_ms.max(1))
    }
}

fn read_u32_env(var: &'static str) -> Option<u32> {
    match env::var(var) {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(
                    env_var = var,
                    value = value.as_str(),
                    "invalid settings env var value; keeping configured value"
                );
                None
            }
        },
        Err(env::VarError::NotPresent) => None,
        Err(error) => {
            warn!(env_var = var, error = %error, "unable to read settings env var");
            None
        }
    }
}
