//! Shared test helpers: a recording fake engine and manager builders

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use trackplay_playback::{
    EngineEvent, EventReceiver, MediaEngine, PlaybackConfig, PlaybackManager, PlaybackParameters,
    RawState, SourceContext, SourceError, TimelineChangeReason, Track,
};

/// Every call the manager made on the engine, in order
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Prepare {
        source: String,
        reset_position: bool,
        reset_state: bool,
    },
    SetPlayWhenReady(bool),
    Stop {
        reset: bool,
    },
    SeekTo(u64),
    SetVolume(f32),
    SetParameters(PlaybackParameters),
    Release,
}

#[derive(Debug)]
pub struct FakeState {
    pub calls: Vec<EngineCall>,
    pub play_when_ready: bool,
    pub state: RawState,
    pub window: Option<usize>,
    pub window_count: usize,
    pub window_durations: Vec<Option<u64>>,
    pub position_ms: u64,
    pub buffered_ms: u64,
    pub duration_ms: Option<u64>,
    pub volume: f32,
    pub parameters: PlaybackParameters,
    pub released: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            play_when_ready: false,
            state: RawState::Idle,
            window: None,
            window_count: 0,
            window_durations: Vec::new(),
            position_ms: 0,
            buffered_ms: 0,
            duration_ms: None,
            volume: 1.0,
            parameters: PlaybackParameters::default(),
            released: false,
        }
    }
}

/// Engine double that records calls; clones share state so tests keep a probe
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.with(|s| s.calls.clone())
    }

    pub fn take_calls(&self) -> Vec<EngineCall> {
        self.with(|s| std::mem::take(&mut s.calls))
    }

    pub fn prepared_sources(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Prepare { source, .. } => Some(source),
                _ => None,
            })
            .collect()
    }

    /// Finish preparation: one window of `duration_ms`
    pub fn finish_prepare(&self, duration_ms: Option<u64>) -> EngineEvent {
        self.with(|s| {
            s.window = Some(0);
            s.window_count = 1;
            s.window_durations = vec![duration_ms];
            s.duration_ms = duration_ms;
        });
        EngineEvent::TimelineChanged {
            reason: TimelineChangeReason::Prepared,
            is_empty: false,
        }
    }

    pub fn set_position(&self, position_ms: u64) {
        self.with(|s| s.position_ms = position_ms);
    }
}

impl MediaEngine for FakeEngine {
    type Source = String;

    fn prepare(&mut self, source: String, reset_position: bool, reset_state: bool) {
        self.with(|s| {
            s.calls.push(EngineCall::Prepare {
                source,
                reset_position,
                reset_state,
            });
            s.state = RawState::Buffering;
            s.window = None;
            s.window_count = 0;
            if reset_position {
                s.position_ms = 0;
            }
        });
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        self.with(|s| {
            s.calls.push(EngineCall::SetPlayWhenReady(play_when_ready));
            s.play_when_ready = play_when_ready;
        });
    }

    fn play_when_ready(&self) -> bool {
        self.with(|s| s.play_when_ready)
    }

    fn stop(&mut self, reset: bool) {
        self.with(|s| {
            s.calls.push(EngineCall::Stop { reset });
            s.state = RawState::Idle;
            if reset {
                s.window = None;
                s.window_count = 0;
                s.position_ms = 0;
            }
        });
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.with(|s| {
            s.calls.push(EngineCall::SeekTo(position_ms));
            s.position_ms = position_ms;
        });
    }

    fn playback_state(&self) -> RawState {
        self.with(|s| s.state)
    }

    fn current_window_index(&self) -> Option<usize> {
        self.with(|s| s.window)
    }

    fn window_count(&self) -> usize {
        self.with(|s| s.window_count)
    }

    fn window_duration_ms(&self, window_index: usize) -> Option<u64> {
        self.with(|s| s.window_durations.get(window_index).copied().flatten())
    }

    fn current_position_ms(&self) -> u64 {
        self.with(|s| s.position_ms)
    }

    fn buffered_position_ms(&self) -> u64 {
        self.with(|s| s.buffered_ms)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.with(|s| s.duration_ms)
    }

    fn content_position_ms(&self) -> Option<u64> {
        self.with(|s| s.window.map(|_| s.position_ms))
    }

    fn set_volume(&mut self, volume: f32) {
        self.with(|s| {
            s.calls.push(EngineCall::SetVolume(volume));
            s.volume = volume;
        });
    }

    fn volume(&self) -> f32 {
        self.with(|s| s.volume)
    }

    fn set_playback_parameters(&mut self, parameters: PlaybackParameters) {
        self.with(|s| {
            s.calls.push(EngineCall::SetParameters(parameters));
            s.parameters = parameters;
        });
    }

    fn playback_parameters(&self) -> PlaybackParameters {
        self.with(|s| s.parameters)
    }

    fn release(&mut self) {
        self.with(|s| {
            s.calls.push(EngineCall::Release);
            s.released = true;
        });
    }
}

// ===== Builders =====

/// Source builder that hands the url to the engine as a string
pub fn uri_builder(track: &Track, _context: &SourceContext) -> Result<String, SourceError> {
    Ok(track.uri().to_string())
}

pub fn track(id: &str) -> Track {
    Track::new(id, format!("https://cdn.example/{}.mp3", id)).unwrap()
}

pub fn local_track(id: &str) -> Track {
    Track::new(id, format!("file:///music/{}.flac", id)).unwrap()
}

pub fn source_of(id: &str) -> String {
    format!("https://cdn.example/{}.mp3", id)
}

/// Fresh manager over a fake engine, with construction calls cleared
pub fn new_manager() -> (PlaybackManager<FakeEngine>, EventReceiver, FakeEngine) {
    let engine = FakeEngine::default();
    let (manager, events) =
        PlaybackManager::new(PlaybackConfig::default(), engine.clone(), uri_builder);
    engine.take_calls();
    (manager, events, engine)
}

/// Manager with `ids` queued and nothing current
pub fn manager_with(ids: &[&str]) -> (PlaybackManager<FakeEngine>, EventReceiver, FakeEngine) {
    let (mut manager, events, engine) = new_manager();
    for id in ids {
        let index = manager.queue_len();
        manager.add(track(id), index).unwrap();
    }
    events.drain();
    engine.take_calls();
    (manager, events, engine)
}

/// Manager with `ids` queued and `current` armed
pub fn manager_at(
    ids: &[&str],
    current: &str,
) -> (PlaybackManager<FakeEngine>, EventReceiver, FakeEngine) {
    let (mut manager, events, engine) = manager_with(ids);
    manager.skip_to(current).unwrap();
    events.drain();
    engine.take_calls();
    (manager, events, engine)
}

/// Put the fake in `state` and deliver the matching callback
pub fn deliver_state(
    manager: &mut PlaybackManager<FakeEngine>,
    engine: &FakeEngine,
    play_when_ready: bool,
    state: RawState,
) {
    engine.with(|s| {
        s.state = state;
        s.play_when_ready = play_when_ready;
    });
    manager.handle_engine_event(EngineEvent::StateChanged {
        play_when_ready,
        state,
    });
}

pub fn queue_ids(manager: &PlaybackManager<FakeEngine>) -> Vec<String> {
    manager
        .queue()
        .unwrap()
        .iter()
        .map(|t| t.id().to_string())
        .collect()
}
