//! Media engine abstraction
//!
//! The playback manager never decodes or renders audio itself. It drives an
//! engine through [`MediaEngine`] and learns what happened through
//! [`EngineEvent`] callbacks, which the binding feeds back into
//! [`PlaybackManager::handle_engine_event`](crate::PlaybackManager::handle_engine_event).

use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// Raw four-valued engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawState {
    /// Nothing prepared, or stopped with reset
    Idle,
    /// Prepared but not enough data to render
    Buffering,
    /// Able to render immediately
    Ready,
    /// Reached the end of the timeline
    Ended,
}

/// Speed and pitch applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParameters {
    pub speed: f32,
    pub pitch: f32,
}

impl Default for PlaybackParameters {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
        }
    }
}

/// Why the engine timeline changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineChangeReason {
    Prepared,
    Dynamic,
    Reset,
}

/// Why the playback position jumped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontinuityReason {
    /// Playback moved from one window to the next on its own
    PeriodTransition,
    Seek,
    SeekAdjustment,
    AdInsertion,
    /// Synthesized by the manager after a timeline change
    Internal,
}

/// One track group reported by the engine after preparation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackGroup {
    pub formats: Vec<Format>,
}

/// A single elementary stream format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Format {
    /// Metadata embedded in the container, if any
    pub metadata: Option<Metadata>,
}

/// Callbacks delivered by an engine binding
#[derive(Debug)]
pub enum EngineEvent {
    TimelineChanged {
        reason: TimelineChangeReason,
        is_empty: bool,
    },
    PositionDiscontinuity(DiscontinuityReason),
    TracksChanged(Vec<TrackGroup>),
    StateChanged {
        play_when_ready: bool,
        state: RawState,
    },
    PlayerError(EngineError),
    Metadata(Metadata),
}

/// Engine failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Loading or parsing the media failed
    Source,
    /// Decoding or output failed
    Renderer,
    /// Anything else
    Unexpected,
}

/// Error reported asynchronously by the engine
#[derive(Debug)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether a source error has [`BehindLiveWindow`] in its cause chain
    pub fn is_behind_live_window(&self) -> bool {
        if self.kind != EngineErrorKind::Source {
            return false;
        }

        let mut cause: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(err) = cause {
            if err.is::<BehindLiveWindow>() {
                return true;
            }
            cause = err.source();
        }
        false
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} error: {}", self.kind, self.message)
    }
}

impl StdError for EngineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// The live playback head fell out of the available window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("playback position is behind the live window")]
pub struct BehindLiveWindow;

/// What the playback manager needs from a media engine
///
/// Calls are synchronous and must not re-enter the manager. Engines report
/// changes later through [`EngineEvent`].
pub trait MediaEngine: Send {
    /// Engine-readable media source built from a track
    type Source: Send;

    /// Load a source, optionally resetting position and state
    fn prepare(&mut self, source: Self::Source, reset_position: bool, reset_state: bool);

    fn set_play_when_ready(&mut self, play_when_ready: bool);

    fn play_when_ready(&self) -> bool;

    /// Stop rendering; with `reset` the prepared source is released too
    fn stop(&mut self, reset: bool);

    fn seek_to(&mut self, position_ms: u64);

    /// Seek to the default position of a window, or of the current one
    fn seek_to_default_position(&mut self, window_index: Option<usize>) {
        let _ = window_index;
        self.seek_to(0);
    }

    fn playback_state(&self) -> RawState;

    /// Current window, `None` when the timeline is empty
    fn current_window_index(&self) -> Option<usize>;

    fn previous_window_index(&self) -> Option<usize> {
        self.current_window_index()
            .and_then(|index| index.checked_sub(1))
    }

    fn next_window_index(&self) -> Option<usize> {
        let next = self.current_window_index()? + 1;
        (next < self.window_count()).then_some(next)
    }

    fn window_count(&self) -> usize;

    /// Duration of a window, `None` when unknown
    fn window_duration_ms(&self, window_index: usize) -> Option<u64>;

    fn current_position_ms(&self) -> u64;

    fn buffered_position_ms(&self) -> u64;

    /// Duration of the current window, `None` when unknown
    fn duration_ms(&self) -> Option<u64>;

    /// Position within the current content, `None` when nothing is prepared
    fn content_position_ms(&self) -> Option<u64>;

    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters);

    fn playback_parameters(&self) -> PlaybackParameters;

    /// Free everything; the engine is not used afterwards
    fn release(&mut self);
}
