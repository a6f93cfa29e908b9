//! Error types for playback management

use thiserror::Error;

/// Playback errors
///
/// Local validation failures only. Engine failures never come back through a
/// command; they are reported as [`PlaybackEvent::Error`](crate::PlaybackEvent::Error).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// Track description was rejected by the factory
    #[error("Invalid track: {reason}")]
    InvalidTrack { reason: String },

    /// Queue operation addressed an index outside the queue
    #[error("{op}: index {index} out of range (queue length {len})")]
    IndexOutOfRange {
        op: &'static str,
        index: usize,
        len: usize,
    },

    /// `skip_to` with an id that is not queued
    #[error("Track not in queue: {id}")]
    TrackNotInQueue { id: String },

    /// Skip requested with an empty queue or no current track
    #[error("{op}: queue is empty or nothing is current")]
    QueueEmpty { op: &'static str },

    /// Some elements of a batch failed; the others were applied
    #[error("{} of the batch failed", failures.len())]
    Partial { failures: Vec<(usize, PlaybackError)> },

    /// The player was destroyed
    #[error("Player has been destroyed")]
    Destroyed,
}

impl PlaybackError {
    pub(crate) fn invalid_track(reason: impl Into<String>) -> Self {
        Self::InvalidTrack {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for hosts
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTrack { .. } => "invalid_track",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::TrackNotInQueue { .. } => "track_not_in_queue",
            Self::QueueEmpty { .. } => "track_queue_empty",
            Self::Partial { .. } => "partial_failure",
            Self::Destroyed => "destroyed",
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
