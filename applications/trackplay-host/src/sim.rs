//! Simulated media engine
//!
//! Keeps a clock instead of decoding audio: preparing takes `prepare_ms`,
//! playback advances the position every tick, and a track with a known
//! duration ends when the position reaches it. Callbacks go out through the
//! [`EngineEventSink`] exactly as a real engine binding would send them.

use crate::config::SimSettings;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use trackplay_playback::{
    DiscontinuityReason, EngineEvent, EngineEventSink, MediaEngine, MetadataEntry,
    PlaybackParameters, RawState, SourceContext, SourceError, TimelineChangeReason, Track,
};

/// How far ahead of the position the simulated buffer reaches
const BUFFER_AHEAD_MS: u64 = 30_000;

/// What the simulated engine plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSource {
    pub uri: String,
    pub duration_ms: Option<u64>,
    pub remote: bool,
}

impl SimSource {
    /// Build a source for `track`
    ///
    /// Remote tracks are accounted in the source cache when one is
    /// configured, using `bitrate_kbps` to estimate their size.
    pub fn build(
        track: &Track,
        context: &SourceContext,
        bitrate_kbps: u32,
    ) -> Result<Self, SourceError> {
        let uri = track.uri();
        match uri.scheme() {
            "http" | "https" | "file" => {}
            other => return Err(SourceError::UnsupportedScheme(other.to_string())),
        }

        if let Some(cache) = context.cache.as_ref().filter(|_| track.is_remote()) {
            let bytes = track.duration_ms().unwrap_or(0) * u64::from(bitrate_kbps) / 8;
            for evicted in cache.record(uri.as_str(), bytes) {
                tracing::debug!("Evicted {} from source cache", evicted);
            }
        }

        tracing::debug!(
            "Built source for {} (user agent: {})",
            uri,
            context.user_agent_for(track).unwrap_or("-")
        );

        Ok(Self {
            uri: uri.to_string(),
            duration_ms: track.duration_ms(),
            remote: track.is_remote(),
        })
    }
}

#[derive(Debug)]
struct SimState {
    source: Option<SimSource>,
    state: RawState,
    play_when_ready: bool,
    /// Remaining preparation time, `None` when not preparing
    preparing_ms: Option<u64>,
    prepared: bool,
    position_ms: u64,
    volume: f32,
    parameters: PlaybackParameters,
    released: bool,
}

impl SimState {
    fn buffered_ms(&self) -> u64 {
        let ahead = self.position_ms.saturating_add(BUFFER_AHEAD_MS);
        match self.source.as_ref().and_then(|s| s.duration_ms) {
            Some(duration) => ahead.min(duration),
            None => ahead,
        }
    }

    fn duration_ms(&self) -> Option<u64> {
        if self.prepared {
            self.source.as_ref().and_then(|s| s.duration_ms)
        } else {
            None
        }
    }
}

type Shared = Arc<Mutex<SimState>>;

fn lock(shared: &Shared) -> MutexGuard<'_, SimState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`MediaEngine`] driven by a clock thread
pub struct SimEngine {
    shared: Shared,
    sink: EngineEventSink,
    prepare_ms: u64,
}

/// Clock thread of a [`SimEngine`], started separately
pub struct SimTicker {
    shared: Shared,
    sink: EngineEventSink,
    tick_ms: u64,
}

impl SimEngine {
    /// Create new simulated engine and its (not yet running) clock
    pub fn new(sink: EngineEventSink, settings: &SimSettings) -> (Self, SimTicker) {
        let shared = Arc::new(Mutex::new(SimState {
            source: None,
            state: RawState::Idle,
            play_when_ready: false,
            preparing_ms: None,
            prepared: false,
            position_ms: 0,
            volume: 1.0,
            parameters: PlaybackParameters::default(),
            released: false,
        }));

        let engine = Self {
            shared: Arc::clone(&shared),
            sink: sink.clone(),
            prepare_ms: settings.prepare_ms,
        };
        let ticker = SimTicker {
            shared,
            sink,
            tick_ms: settings.tick_ms.max(1),
        };
        (engine, ticker)
    }

    /// Apply `f` and report a state callback if it changed the engine state
    fn transition(&self, f: impl FnOnce(&mut SimState)) {
        let (before, after) = {
            let mut state = lock(&self.shared);
            let before = (state.play_when_ready, state.state);
            f(&mut state);
            (before, (state.play_when_ready, state.state))
        };

        if before != after {
            let (play_when_ready, state) = after;
            self.sink.send(EngineEvent::StateChanged {
                play_when_ready,
                state,
            });
        }
    }
}

impl MediaEngine for SimEngine {
    type Source = SimSource;

    fn prepare(&mut self, source: SimSource, reset_position: bool, _reset_state: bool) {
        tracing::debug!("Sim: preparing {}", source.uri);
        let prepare_ms = self.prepare_ms;
        self.transition(|s| {
            s.source = Some(source);
            s.state = RawState::Buffering;
            s.preparing_ms = Some(prepare_ms);
            s.prepared = false;
            if reset_position {
                s.position_ms = 0;
            }
        });
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.transition(|s| s.play_when_ready = play_when_ready);
    }

    fn play_when_ready(&self) -> bool {
        lock(&self.shared).play_when_ready
    }

    fn stop(&mut self, reset: bool) {
        self.transition(|s| {
            s.state = RawState::Idle;
            s.preparing_ms = None;
            if reset {
                s.source = None;
                s.prepared = false;
                s.position_ms = 0;
            }
        });
    }

    fn seek_to(&mut self, position_ms: u64) {
        {
            let mut state = lock(&self.shared);
            let limit = state.duration_ms().unwrap_or(u64::MAX);
            state.position_ms = position_ms.min(limit);
        }
        self.sink
            .send(EngineEvent::PositionDiscontinuity(DiscontinuityReason::Seek));
    }

    fn playback_state(&self) -> RawState {
        lock(&self.shared).state
    }

    fn current_window_index(&self) -> Option<usize> {
        lock(&self.shared).prepared.then_some(0)
    }

    fn window_count(&self) -> usize {
        usize::from(lock(&self.shared).prepared)
    }

    fn window_duration_ms(&self, window_index: usize) -> Option<u64> {
        if window_index == 0 {
            lock(&self.shared).duration_ms()
        } else {
            None
        }
    }

    fn current_position_ms(&self) -> u64 {
        lock(&self.shared).position_ms
    }

    fn buffered_position_ms(&self) -> u64 {
        let state = lock(&self.shared);
        if state.prepared {
            state.buffered_ms()
        } else {
            0
        }
    }

    fn duration_ms(&self) -> Option<u64> {
        lock(&self.shared).duration_ms()
    }

    fn content_position_ms(&self) -> Option<u64> {
        let state = lock(&self.shared);
        state.prepared.then_some(state.position_ms)
    }

    fn set_volume(&mut self, volume: f32) {
        lock(&self.shared).volume = volume;
    }

    fn volume(&self) -> f32 {
        lock(&self.shared).volume
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        lock(&self.shared).parameters = parameters;
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        lock(&self.shared).parameters
    }

    fn release(&mut self) {
        tracing::debug!("Sim: released");
        let mut state = lock(&self.shared);
        state.released = true;
        state.source = None;
        state.prepared = false;
    }
}

impl SimTicker {
    /// Start the clock thread; it exits once the engine is released
    pub fn start(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("trackplay-sim".to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        let tick = Duration::from_millis(self.tick_ms);

        loop {
            thread::sleep(tick);

            let events = {
                let mut state = lock(&self.shared);
                if state.released {
                    break;
                }
                Self::advance(&mut state, self.tick_ms)
            };

            for event in events {
                if !self.sink.send(event) {
                    return;
                }
            }
        }

        tracing::debug!("Sim clock stopped");
    }

    /// Move the simulation forward by `elapsed_ms`
    fn advance(state: &mut SimState, elapsed_ms: u64) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        if let Some(remaining) = state.preparing_ms {
            if remaining > elapsed_ms {
                state.preparing_ms = Some(remaining - elapsed_ms);
                return events;
            }

            state.preparing_ms = None;
            state.prepared = true;
            state.state = RawState::Ready;
            events.push(EngineEvent::TimelineChanged {
                reason: TimelineChangeReason::Prepared,
                is_empty: false,
            });
            events.push(EngineEvent::StateChanged {
                play_when_ready: state.play_when_ready,
                state: RawState::Ready,
            });

            // Live streams announce themselves like an Icecast server would
            if let Some(source) = state.source.as_ref().filter(|s| s.duration_ms.is_none()) {
                events.push(EngineEvent::Metadata(vec![MetadataEntry::IcyHeaders {
                    name: Some("Trackplay Simulated Radio".to_string()),
                    url: Some(source.uri.clone()),
                    genre: None,
                    bitrate: None,
                }]));
            }
            return events;
        }

        if state.state != RawState::Ready || !state.play_when_ready {
            return events;
        }

        let step = (elapsed_ms as f32 * state.parameters.speed) as u64;
        state.position_ms = state.position_ms.saturating_add(step);

        if let Some(duration) = state.duration_ms() {
            if state.position_ms >= duration {
                state.position_ms = duration;
                state.state = RawState::Ended;
                events.push(EngineEvent::StateChanged {
                    play_when_ready: state.play_when_ready,
                    state: RawState::Ended,
                });
            }
        }

        events
    }
}
