//! Playback events
//!
//! Everything the controlling application learns about playback arrives as a
//! [`PlaybackEvent`] through the dispatcher channel created by [`channel`].
//! Events are delivered in emission order. The buffer is bounded; when it is
//! full the oldest event that is not a `StateChanged` is dropped, so the most
//! recent state always survives.

use crate::metadata::ReceivedMetadata;
use crate::track::Track;
use crate::types::DerivedState;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Events emitted by the playback manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlaybackEvent {
    /// Entered PLAYING
    Play,

    /// Entered PAUSED
    Pause,

    /// Entered STOPPED
    Stop,

    /// The current track played to its end
    End {
        track: Option<Track>,
        position_ms: u64,
    },

    /// Queue cleared and playback stopped
    Reset,

    /// Derived state changed
    StateChanged { state: DerivedState },

    /// The manager armed a different track (or none)
    TrackChanged {
        from: Option<Track>,
        position_at_switch_ms: u64,
        to: Option<Track>,
    },

    /// The engine crossed a track boundary
    TrackUpdate {
        previous: Option<Track>,
        position_ms: u64,
        next: Option<Track>,
        /// Whether `next` needs the network, so hosts can hold or release locks
        is_remote: bool,
    },

    /// Metadata embedded in the stream
    MetadataReceived(ReceivedMetadata),

    /// Asynchronous engine failure
    Error { code: ErrorCode, message: String },
}

impl PlaybackEvent {
    fn is_state_changed(&self) -> bool {
        matches!(self, PlaybackEvent::StateChanged { .. })
    }
}

/// Classification carried by [`PlaybackEvent::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    PlaybackSource,
    PlaybackRenderer,
    Playback,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PlaybackSource => "playback-source",
            ErrorCode::PlaybackRenderer => "playback-renderer",
            ErrorCode::Playback => "playback",
        }
    }
}

type LastState = Arc<Mutex<Option<DerivedState>>>;

/// Create a dispatcher channel holding at most `capacity` undelivered events
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let last_state = LastState::default();

    let sender = EventSender {
        tx: Some(tx),
        overflow: rx.clone(),
        last_state: Arc::clone(&last_state),
        dropped: 0,
    };
    let receiver = EventReceiver { rx, last_state };

    (sender, receiver)
}

/// Write side, owned by the playback manager
#[derive(Debug)]
pub struct EventSender {
    tx: Option<Sender<PlaybackEvent>>,
    /// Lets the producer evict from a full buffer
    overflow: Receiver<PlaybackEvent>,
    last_state: LastState,
    dropped: u64,
}

impl EventSender {
    /// Queue an event; returns false once the sender is closed
    pub fn emit(&mut self, event: PlaybackEvent) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            tracing::warn!("Event emitted after dispatcher closed: {:?}", event);
            return false;
        };

        if let PlaybackEvent::StateChanged { state } = &event {
            *self
                .last_state
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(*state);
        }

        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.evict_and_send(event);
                true
            }
            // The receiver went away; nobody is listening
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn evict_and_send(&mut self, event: PlaybackEvent) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };

        let mut pending: VecDeque<PlaybackEvent> = self.overflow.try_iter().collect();
        pending.push_back(event);

        // Oldest non-StateChanged goes first; if everything is a state change,
        // the oldest one goes, which is never the most recent
        let victim = pending
            .iter()
            .position(|e| !e.is_state_changed())
            .unwrap_or(0);
        if let Some(dropped) = pending.remove(victim) {
            self.dropped += 1;
            tracing::warn!(
                "Event buffer full, dropped {:?} ({} dropped so far)",
                dropped,
                self.dropped
            );
        }

        for event in pending {
            if tx.try_send(event).is_err() {
                self.dropped += 1;
            }
        }
    }

    /// Stop accepting events; buffered events stay readable
    pub fn close(&mut self) {
        self.tx = None;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Number of events dropped because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Read side, held by the controlling application
#[derive(Debug, Clone)]
pub struct EventReceiver {
    rx: Receiver<PlaybackEvent>,
    last_state: LastState,
}

impl EventReceiver {
    /// Block until the next event, `None` once closed and drained
    pub fn recv(&self) -> Option<PlaybackEvent> {
        self.rx.recv().ok()
    }

    /// Next event if one is buffered
    pub fn try_recv(&self) -> Option<PlaybackEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PlaybackEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take everything currently buffered
    pub fn drain(&self) -> Vec<PlaybackEvent> {
        self.rx.try_iter().collect()
    }

    /// Most recent `StateChanged` value, without consuming events
    pub fn last_state(&self) -> Option<DerivedState> {
        *self
            .last_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
