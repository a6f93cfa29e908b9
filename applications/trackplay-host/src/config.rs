/// Host configuration
use crate::error::{HostError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use trackplay_playback::PlaybackConfig;

/// Looked up in the working directory when no file is given
pub const DEFAULT_CONFIG_FILE: &str = "trackplay.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub sim: SimSettings,

    #[serde(default)]
    pub log: LogSettings,
}

/// Timing of the simulated engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimSettings {
    /// Clock resolution in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// How long "preparing" a source takes
    #[serde(default = "default_prepare_ms")]
    pub prepare_ms: u64,

    /// Used to estimate how many bytes a remote track occupies in the cache
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogSettings {
    /// `EnvFilter` directives; `RUST_LOG` wins when set
    #[serde(default)]
    pub filter: Option<String>,
}

impl HostConfig {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `trackplay.toml` is used if
    /// present. Variables like `TRACKPLAY_SIM__TICK_MS` override the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(HostError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (prefixed with TRACKPLAY_)
        settings = settings.add_source(
            config::Environment::with_prefix("TRACKPLAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if playback.event_buffer == 0 {
            return Err(HostError::Config(
                "playback.event_buffer must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&playback.volume) {
            return Err(HostError::Config(format!(
                "playback.volume must be within 0.0-1.0, got {}",
                playback.volume
            )));
        }

        if !(0.0..=1.0).contains(&playback.volume_multiplier) {
            return Err(HostError::Config(format!(
                "playback.volume_multiplier must be within 0.0-1.0, got {}",
                playback.volume_multiplier
            )));
        }

        if self.sim.tick_ms == 0 {
            return Err(HostError::Config(
                "sim.tick_ms must be at least 1".to_string(),
            ));
        }

        if let Some(filter) = &self.log.filter {
            tracing_subscriber::EnvFilter::try_new(filter).map_err(|e| {
                HostError::Config(format!("log.filter '{}' is invalid: {}", filter, e))
            })?;
        }

        Ok(())
    }
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            prepare_ms: default_prepare_ms(),
            bitrate_kbps: default_bitrate_kbps(),
        }
    }
}

// Default values
fn default_tick_ms() -> u64 {
    100
}

fn default_prepare_ms() -> u64 {
    300
}

fn default_bitrate_kbps() -> u32 {
    128
}
