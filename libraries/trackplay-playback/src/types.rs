//! Core types for playback management

use crate::engine::RawState;
use crate::track::Track;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Playback state as seen by the controlling application
///
/// Derived from the engine's raw state and its play-when-ready flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivedState {
    /// Nothing prepared
    #[default]
    None,

    /// Loading while paused
    Connecting,

    /// Loading with intent to play
    Buffering,

    /// Rendering audio
    Playing,

    /// Ready but held
    Paused,

    /// Reached the end
    Stopped,
}

impl DerivedState {
    /// Map the engine's raw state and play-when-ready flag
    pub fn derive(raw: RawState, play_when_ready: bool) -> Self {
        match (raw, play_when_ready) {
            (RawState::Idle, _) => DerivedState::None,
            (RawState::Buffering, true) => DerivedState::Buffering,
            (RawState::Buffering, false) => DerivedState::Connecting,
            (RawState::Ready, true) => DerivedState::Playing,
            (RawState::Ready, false) => DerivedState::Paused,
            (RawState::Ended, _) => DerivedState::Stopped,
        }
    }
}

/// Configuration for playback manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Undelivered events kept before the oldest are dropped (default: 1024)
    pub event_buffer: usize,

    /// Initial user volume, 0.0-1.0 (default: 1.0)
    pub volume: f32,

    /// Initial volume multiplier, 0.0-1.0 (default: 1.0)
    pub volume_multiplier: f32,

    /// User agent handed to the source builder when a track has none
    pub user_agent: Option<String>,

    /// Byte budget of the source cache; 0 disables caching
    pub max_cache_bytes: u64,

    /// Where a source builder may keep cached media
    pub cache_dir: Option<PathBuf>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            event_buffer: 1024,
            volume: 1.0,
            volume_multiplier: 1.0,
            user_agent: None,
            max_cache_bytes: 0,
            cache_dir: None,
        }
    }
}

/// Detached view of everything a host may ask about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub state: DerivedState,
    pub queue: Vec<Track>,
    pub current_index: Option<usize>,
    pub current_track: Option<Track>,
    pub position_ms: u64,
    pub buffered_position_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: f32,
    pub rate: f32,
    pub auto_play: bool,
}
