//! Trackplay - Playback Core
//!
//! Engine-agnostic queue and playback state machine for background audio.
//!
//! This crate provides:
//! - Track model with validated descriptors (id, url, type hint, duration)
//! - Identity-keyed queue (insert-or-replace, descending removal, O(1) lookup)
//! - Playback state machine driving any [`MediaEngine`]
//! - Derived six-valued playback state and lifecycle events
//! - ID3 and ICY stream metadata parsing
//! - Bounded, ordered event dispatcher
//! - Serialized executor thread ([`PlayerHandle`])
//!
//! # Architecture
//!
//! `trackplay-playback` never decodes or renders audio:
//! - The engine is reached through the [`MediaEngine`] trait
//! - Engine-readable sources come from a pluggable [`SourceBuilder`]
//! - Engine callbacks are fed back as [`EngineEvent`]s
//! - Everything the application learns arrives as a [`PlaybackEvent`]
//!
//! # Example: Tracks and commands
//!
//! ```rust
//! use trackplay_playback::{Command, Track, TrackDescriptor};
//!
//! let track = Track::new("intro", "https://cdn.example/intro.mp3")?
//!     .with_duration_ms(184_000)
//!     .with_presentation("title", "Intro");
//! assert!(track.is_remote());
//!
//! // Commands arrive from the host as tagged JSON
//! let command: Command = serde_json::from_str(
//!     r#"{ "command": "add", "track": { "id": "a", "url": "/music/a.flac" } }"#,
//! )?;
//! if let Command::Add { track, .. } = command {
//!     let track = Track::try_from(track)?;
//!     assert!(!track.is_remote());
//! }
//!
//! // Invalid descriptors are rejected up front
//! assert!(Track::from_descriptor(TrackDescriptor::new("", "http://x/a")).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Example: Derived state
//!
//! ```rust
//! use trackplay_playback::{DerivedState, RawState};
//!
//! assert_eq!(DerivedState::derive(RawState::Buffering, false), DerivedState::Connecting);
//! assert_eq!(DerivedState::derive(RawState::Ready, true), DerivedState::Playing);
//! ```

mod command;
pub mod engine;
mod error;
pub mod events;
mod handle;
mod manager;
pub mod metadata;
mod queue;
pub mod source;
mod surface;
mod track;
pub mod types;
mod volume;

// Public exports
pub use command::{Command, Reply};
pub use engine::{
    BehindLiveWindow, DiscontinuityReason, EngineError, EngineErrorKind, EngineEvent, Format,
    MediaEngine, PlaybackParameters, RawState, TimelineChangeReason, TrackGroup,
};
pub use error::{PlaybackError, Result};
pub use events::{ErrorCode, EventReceiver, EventSender, PlaybackEvent};
pub use handle::{EngineEventSink, PlayerHandle};
pub use manager::PlaybackManager;
pub use metadata::{MetadataEntry, MetadataSource, ReceivedMetadata};
pub use queue::{Insertion, Queue};
pub use source::{SourceBuilder, SourceCache, SourceContext, SourceError};
pub use surface::NowPlaying;
pub use track::{PitchAlgorithm, Track, TrackDescriptor, TrackType};
pub use types::{DerivedState, PlaybackConfig, PlayerSnapshot};
pub use volume::VolumeControl;
