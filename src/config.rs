use crate::engine::SimulatedEngineConfig;
use crate::session::RecorderOptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variables override file settings, e.g.
/// `AUDIO_RECORDER_ENGINE__MAX_DURATION_MS=5000`
pub const ENV_PREFIX: &str = "AUDIO_RECORDER";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    /// Defaults for every recorder; missing keys keep the built-in defaults
    #[serde(default)]
    pub recorder: RecorderOptions,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// Filter used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "audio-recorder".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where relative recording paths land; `~` is expanded
    pub output_dir: String,
    pub max_duration_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            max_duration_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.output_dir).as_ref())
    }

    pub fn simulated(&self) -> SimulatedEngineConfig {
        SimulatedEngineConfig {
            output_dir: self.output_dir(),
            max_duration_ms: self.max_duration_ms,
        }
    }
}

impl Config {
    /// Load `path` (extension optional, file optional) layered under the environment
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Invalid config in {}", path))
    }
}
