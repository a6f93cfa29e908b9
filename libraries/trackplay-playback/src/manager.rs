//! Playback manager - core state machine
//!
//! Owns the queue and the engine, turns commands into engine calls, and turns
//! engine callbacks into [`PlaybackEvent`]s. Everything here runs on one
//! logical executor: callers must serialize commands and engine callbacks
//! (see [`PlayerHandle`](crate::PlayerHandle)).

use crate::{
    engine::{
        DiscontinuityReason, EngineError, EngineErrorKind, EngineEvent, MediaEngine,
        PlaybackParameters, RawState, TimelineChangeReason,
    },
    error::{PlaybackError, Result},
    events::{self, ErrorCode, EventReceiver, EventSender, PlaybackEvent},
    metadata::{self, MetadataEntry},
    queue::{Insertion, Queue},
    source::{SourceBuilder, SourceCache, SourceContext},
    surface::NowPlaying,
    track::Track,
    types::{DerivedState, PlaybackConfig, PlayerSnapshot},
    volume::VolumeControl,
};
use std::sync::Arc;

/// Queue-and-playback state machine over a [`MediaEngine`]
pub struct PlaybackManager<E: MediaEngine> {
    engine: E,
    builder: Box<dyn SourceBuilder<E::Source>>,
    source_context: SourceContext,

    queue: Queue,

    /// Current queue position, `None` when nothing is armed
    current_index: Option<usize>,

    /// Keep playing once something is queued
    auto_play: bool,

    /// Engine window seen at the last position snapshot
    last_known_window: Option<usize>,

    /// Content position at the last snapshot, `None` when unknown
    last_known_position_ms: Option<u64>,

    previous_state: DerivedState,

    volume: VolumeControl,

    events: EventSender,

    now_playing: Option<Box<dyn NowPlaying>>,

    destroyed: bool,
}

impl<E: MediaEngine> PlaybackManager<E> {
    /// Create new playback manager
    ///
    /// Returns the manager and the receiving end of its event stream.
    pub fn new<B>(config: PlaybackConfig, mut engine: E, builder: B) -> (Self, EventReceiver)
    where
        B: SourceBuilder<E::Source> + 'static,
    {
        let (events, receiver) = events::channel(config.event_buffer);

        let volume = VolumeControl::new(config.volume, config.volume_multiplier);
        engine.set_volume(volume.engine_volume());

        let cache = (config.max_cache_bytes > 0)
            .then(|| Arc::new(SourceCache::new(config.max_cache_bytes)));

        let manager = Self {
            engine,
            builder: Box::new(builder),
            source_context: SourceContext {
                user_agent: config.user_agent,
                cache_dir: config.cache_dir,
                cache,
            },
            queue: Queue::new(),
            current_index: None,
            auto_play: false,
            last_known_window: None,
            last_known_position_ms: None,
            previous_state: DerivedState::None,
            volume,
            events,
            now_playing: None,
            destroyed: false,
        };

        (manager, receiver)
    }

    /// Install the hook that mirrors the current track to a host surface
    pub fn set_now_playing(&mut self, hook: impl NowPlaying + 'static) {
        self.now_playing = Some(Box::new(hook));
    }

    // ===== Transport =====

    /// Start or resume playback
    ///
    /// With an empty queue only the intent is recorded; the first track added
    /// later starts playing.
    pub fn play(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.auto_play = true;

        if self.queue.is_empty() {
            tracing::debug!("play() on empty queue, waiting for tracks");
            return Ok(());
        }

        self.set_current(Some(self.current_index.unwrap_or(0)));
        self.engine.set_play_when_ready(true);
        self.snapshot_position();
        Ok(())
    }

    /// Pause playback
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.snapshot_position();
        self.engine.set_play_when_ready(false);
        self.auto_play = false;
        Ok(())
    }

    /// Stop playback
    ///
    /// The engine drops its source; queue and current index are kept.
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.stop_engine();
        Ok(())
    }

    /// Clear the queue and stop
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_alive()?;

        let outgoing = self.current_track().cloned();
        self.queue.clear();
        self.stop_engine();

        if self.current_index.is_some() {
            self.arm(None, outgoing);
        }
        self.clear_last_known_position();

        self.emit(PlaybackEvent::Reset);
        Ok(())
    }

    /// Seek within the current track
    pub fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        self.ensure_alive()?;
        self.snapshot_position();
        self.engine.seek_to(position_ms);
        Ok(())
    }

    // ===== Navigation =====

    /// Make the track with this id current
    pub fn skip_to(&mut self, id: &str) -> Result<()> {
        self.ensure_alive()?;

        let index = self
            .queue
            .index_of(id)
            .ok_or_else(|| PlaybackError::TrackNotInQueue { id: id.to_string() })?;

        self.set_current(Some(index));
        Ok(())
    }

    /// Skip to next track, wrapping to the first after the last
    pub fn skip_to_next(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let current = self.navigable_index("skip_to_next")?;

        let next = if current + 1 >= self.queue.len() {
            0
        } else {
            current + 1
        };

        self.set_current(Some(next));
        Ok(())
    }

    /// Skip to previous track, wrapping to the last before the first
    pub fn skip_to_previous(&mut self) -> Result<()> {
        self.ensure_alive()?;
        let current = self.navigable_index("skip_to_previous")?;

        let previous = if current == 0 {
            self.queue.len() - 1
        } else {
            current - 1
        };

        self.set_current(Some(previous));
        Ok(())
    }

    fn navigable_index(&self, op: &'static str) -> Result<usize> {
        match self.current_index {
            Some(index) if !self.queue.is_empty() => Ok(index),
            _ => Err(PlaybackError::QueueEmpty { op }),
        }
    }

    // ===== Queue =====

    /// Insert `track` at `index`, or replace the queued track with its id
    ///
    /// Replacing the current track re-prepares it. Adding to an empty queue
    /// after a `play()` starts playback.
    pub fn add(&mut self, track: Track, index: usize) -> Result<()> {
        self.ensure_alive()?;
        let auto_play = self.auto_play && self.queue.is_empty();

        self.add_one(track, index)?;

        if auto_play {
            self.play()?;
        }
        Ok(())
    }

    /// Add several tracks starting at `index`
    ///
    /// The insertion point advances past every inserted track; replacements
    /// stay where they are and do not move it.
    pub fn add_many(&mut self, tracks: Vec<Track>, index: usize) -> Result<()> {
        self.ensure_alive()?;
        let auto_play = self.auto_play && self.queue.is_empty();

        if index > self.queue.len() {
            return Err(PlaybackError::IndexOutOfRange {
                op: "add_many",
                index,
                len: self.queue.len(),
            });
        }

        let mut cursor = index;
        let mut failures = Vec::new();
        for (position, track) in tracks.into_iter().enumerate() {
            match self.add_one(track, cursor) {
                Ok(Insertion::Inserted(_)) => cursor += 1,
                Ok(Insertion::Replaced(_)) => {}
                Err(e) => failures.push((position, e)),
            }
        }

        if auto_play && !self.queue.is_empty() {
            self.play()?;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PlaybackError::Partial { failures })
        }
    }

    fn add_one(&mut self, track: Track, index: usize) -> Result<Insertion> {
        // Capture the outgoing track before its slot is overwritten
        let outgoing = self
            .queue
            .index_of(track.id())
            .filter(|&j| Some(j) == self.current_index)
            .and_then(|j| self.queue.get(j).cloned());

        let insertion = self.queue.add(track, index)?;
        match insertion {
            Insertion::Inserted(at) => {
                if let Some(current) = self.current_index.filter(|&c| at <= c) {
                    self.current_index = Some(current + 1);
                }
            }
            Insertion::Replaced(at) => {
                if outgoing.is_some() {
                    tracing::debug!("Current track replaced at {}, re-preparing", at);
                    self.arm(Some(at), outgoing);
                }
            }
        }
        Ok(insertion)
    }

    /// Remove the tracks at `indices`
    ///
    /// Removing the current track stops the engine and leaves nothing current.
    pub fn remove(&mut self, indices: &[usize]) -> Result<()> {
        self.ensure_alive()?;

        let current_id = self.current_track().map(|t| t.id().to_string());
        let removed = self.queue.remove(indices)?;

        let removed_current = removed
            .into_iter()
            .find(|(index, _)| Some(*index) == self.current_index);

        if let Some((_, track)) = removed_current {
            self.arm(None, Some(track));
        } else if let Some(id) = current_id {
            // Follow the current track to its new position
            self.current_index = self.queue.index_of(&id);
        }
        Ok(())
    }

    /// Remove everything after the current track
    pub fn remove_upcoming(&mut self) -> Result<()> {
        self.ensure_alive()?;
        if let Some(current) = self.current_index {
            let dropped = self.queue.truncate_after(current);
            tracing::debug!("Removed {} upcoming tracks", dropped.len());
        }
        Ok(())
    }

    /// Replace the track at `index` without re-preparing it
    pub fn update(&mut self, index: usize, track: Track) -> Result<()> {
        self.ensure_alive()?;
        self.queue.replace(index, track)?;

        if self.current_index == Some(index) {
            self.refresh_now_playing();
        }
        Ok(())
    }

    // ===== Volume and rate =====

    /// Set user-visible volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.ensure_alive()?;
        let engine_volume = self.volume.set_volume(volume);
        self.engine.set_volume(engine_volume);
        Ok(())
    }

    /// User-visible volume
    pub fn volume(&self) -> Result<f32> {
        self.ensure_alive()?;
        Ok(self.volume.user_volume(self.engine.volume()))
    }

    /// Scale the engine volume without changing the user-visible one
    pub fn set_volume_multiplier(&mut self, multiplier: f32) -> Result<()> {
        self.ensure_alive()?;
        let engine_volume = self.volume.set_multiplier(multiplier);
        self.engine.set_volume(engine_volume);
        Ok(())
    }

    /// Set playback speed, keeping pitch
    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.ensure_alive()?;

        if !rate.is_finite() || rate <= 0.0 {
            tracing::warn!("Ignoring invalid playback rate {}", rate);
            return Ok(());
        }

        let pitch = self.engine.playback_parameters().pitch;
        self.engine
            .set_playback_parameters(PlaybackParameters { speed: rate, pitch });
        Ok(())
    }

    pub fn rate(&self) -> Result<f32> {
        self.ensure_alive()?;
        Ok(self.engine.playback_parameters().speed)
    }

    // ===== Queries =====

    pub fn position(&self) -> Result<u64> {
        self.ensure_alive()?;
        Ok(self.engine.current_position_ms())
    }

    pub fn buffered_position(&self) -> Result<u64> {
        self.ensure_alive()?;
        Ok(self.engine.buffered_position_ms())
    }

    /// Declared duration of the current track, else what the engine reports
    pub fn duration(&self) -> Result<Option<u64>> {
        self.ensure_alive()?;
        Ok(self
            .current_track()
            .and_then(Track::duration_ms)
            .or_else(|| self.engine.duration_ms()))
    }

    /// Current derived state
    pub fn state(&self) -> Result<DerivedState> {
        self.ensure_alive()?;
        Ok(self.derived_state())
    }

    /// Copy of the queue
    pub fn queue(&self) -> Result<Vec<Track>> {
        self.ensure_alive()?;
        Ok(self.queue.snapshot())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.queue.get(index))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    /// Detached view of the whole player
    pub fn snapshot(&self) -> Result<PlayerSnapshot> {
        self.ensure_alive()?;
        Ok(PlayerSnapshot {
            state: self.derived_state(),
            queue: self.queue.snapshot(),
            current_index: self.current_index,
            current_track: self.current_track().cloned(),
            position_ms: self.engine.current_position_ms(),
            buffered_position_ms: self.engine.buffered_position_ms(),
            duration_ms: self.duration()?,
            volume: self.volume()?,
            rate: self.rate()?,
            auto_play: self.auto_play,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Tear down: release the engine and stop emitting
    ///
    /// Events buffered before this call stay readable. Every later command
    /// fails with [`PlaybackError::Destroyed`].
    pub fn destroy(&mut self) -> Result<()> {
        self.ensure_alive()?;
        tracing::info!("Destroying playback manager");

        self.events.close();
        self.destroyed = true;

        self.queue.clear();
        self.current_index = None;
        self.auto_play = false;
        self.clear_last_known_position();

        self.engine.set_play_when_ready(false);
        self.engine.stop(true);
        self.engine.release();

        if let Some(cache) = &self.source_context.cache {
            cache.clear();
        }
        self.now_playing = None;
        Ok(())
    }

    // ===== Engine callbacks =====

    /// Feed one engine callback into the state machine
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.destroyed {
            tracing::debug!("Ignoring engine event after destroy: {:?}", event);
            return;
        }

        match event {
            EngineEvent::TimelineChanged { reason, is_empty } => {
                tracing::debug!("Timeline changed: {:?}", reason);
                if matches!(
                    reason,
                    TimelineChangeReason::Prepared | TimelineChangeReason::Dynamic
                ) && !is_empty
                {
                    self.on_position_discontinuity(DiscontinuityReason::Internal);
                }
            }
            EngineEvent::PositionDiscontinuity(reason) => self.on_position_discontinuity(reason),
            EngineEvent::TracksChanged(groups) => {
                for format in groups.iter().flat_map(|group| &group.formats) {
                    if let Some(metadata) = &format.metadata {
                        self.on_metadata(metadata);
                    }
                }
            }
            EngineEvent::StateChanged {
                play_when_ready,
                state,
            } => self.on_state_changed(play_when_ready, state),
            EngineEvent::PlayerError(error) => self.on_player_error(&error),
            EngineEvent::Metadata(metadata) => self.on_metadata(&metadata),
        }
    }

    fn on_position_discontinuity(&mut self, reason: DiscontinuityReason) {
        tracing::debug!("Position discontinuity: {:?}", reason);

        let window = self.engine.current_window_index();
        if window != self.last_known_window {
            // Queue position of window 0, the armed track
            let base = self
                .current_index
                .and_then(|current| current.checked_sub(self.last_known_window.unwrap_or(0)));
            let slot = |w: Option<usize>| base.zip(w).and_then(|(b, w)| b.checked_add(w));

            let previous_index = slot(self.last_known_window);
            let next_index = slot(window).filter(|&index| index < self.queue.len());

            // The previous track ended; report its full duration
            if reason == DiscontinuityReason::PeriodTransition {
                if let Some(last) = self.last_known_window {
                    if last >= self.engine.window_count() {
                        return;
                    }
                    if let Some(duration) = self.engine.window_duration_ms(last) {
                        self.last_known_position_ms = Some(duration);
                    }
                }
            }

            let previous = previous_index.and_then(|index| self.queue.get(index)).cloned();
            if next_index.is_some() && next_index != self.current_index {
                tracing::debug!("Engine moved on to queue position {:?}", next_index);
                self.current_index = next_index;
                self.refresh_now_playing();
            }
            let next = next_index.and_then(|index| self.queue.get(index)).cloned();

            let is_remote = next.as_ref().is_some_and(Track::is_remote);
            self.emit(PlaybackEvent::TrackUpdate {
                previous,
                position_ms: self.last_known_position_ms.unwrap_or(0),
                next,
                is_remote,
            });
        }

        self.snapshot_position();
    }

    fn on_state_changed(&mut self, play_when_ready: bool, raw: RawState) {
        let state = DerivedState::derive(raw, play_when_ready);
        if state == self.previous_state {
            return;
        }

        let previous = self.previous_state;
        tracing::debug!("State {:?} -> {:?}", previous, state);

        if state == DerivedState::Playing && previous != DerivedState::Playing {
            self.emit(PlaybackEvent::Play);
        } else if state == DerivedState::Paused && previous != DerivedState::Paused {
            self.emit(PlaybackEvent::Pause);
        } else if state == DerivedState::Stopped && previous != DerivedState::Stopped {
            self.emit(PlaybackEvent::Stop);
        }

        self.emit(PlaybackEvent::StateChanged { state });

        if state == DerivedState::Stopped {
            self.snapshot_position();
            self.emit(PlaybackEvent::End {
                track: self.current_track().cloned(),
                position_ms: self.engine.current_position_ms(),
            });
        }

        self.previous_state = state;
    }

    fn on_player_error(&mut self, error: &EngineError) {
        let code = match error.kind {
            EngineErrorKind::Source => ErrorCode::PlaybackSource,
            EngineErrorKind::Renderer => ErrorCode::PlaybackRenderer,
            EngineErrorKind::Unexpected => ErrorCode::Playback,
        };
        tracing::warn!("Engine error ({}): {}", code.as_str(), error);

        self.emit(PlaybackEvent::Error {
            code,
            message: error.message.clone(),
        });

        if error.is_behind_live_window() {
            tracing::info!("Fell behind the live window, re-preparing");
            self.stop_engine();
            if let Err(e) = self.play() {
                tracing::warn!("Failed to restart after live window error: {}", e);
            }
        }
    }

    fn on_metadata(&mut self, metadata: &[MetadataEntry]) {
        for record in metadata::parse(metadata) {
            self.emit(PlaybackEvent::MetadataReceived(record));
        }
    }

    // ===== Internal =====

    /// Move to `pos`, unless that would change nothing
    fn set_current(&mut self, pos: Option<usize>) {
        if pos.is_none() && self.current_index.is_none() {
            return;
        }
        if pos == self.current_index && self.derived_state() == DerivedState::Playing {
            return;
        }

        let outgoing = self.current_track().cloned();
        self.arm(pos, outgoing);
    }

    /// Prepare the engine for `pos` (or stop it) and announce the switch
    fn arm(&mut self, pos: Option<usize>, outgoing: Option<Track>) {
        let position_at_switch_ms = self.engine.current_position_ms();

        match pos.filter(|&p| p < self.queue.len()) {
            None => {
                self.engine.stop(true);
                self.current_index = None;
            }
            Some(pos) => {
                self.current_index = Some(pos);
                // A fresh source gives the engine a fresh timeline
                self.last_known_window = None;

                if let Some(track) = self.queue.get(pos) {
                    tracing::debug!("Preparing {} at {}", track, pos);
                    match self.builder.build(track, &self.source_context) {
                        Ok(source) => self.engine.prepare(source, true, true),
                        Err(e) => {
                            tracing::warn!("Cannot build source for {}: {}", track.id(), e);
                            self.engine.stop(true);
                            self.emit(PlaybackEvent::Error {
                                code: ErrorCode::PlaybackSource,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        self.refresh_now_playing();
        self.emit(PlaybackEvent::TrackChanged {
            from: outgoing,
            position_at_switch_ms,
            to: self.current_track().cloned(),
        });
    }

    fn stop_engine(&mut self) {
        self.engine.stop(true);
        self.engine.set_play_when_ready(false);
        self.clear_last_known_position();
        self.auto_play = false;
    }

    fn snapshot_position(&mut self) {
        self.last_known_window = self.engine.current_window_index();
        self.last_known_position_ms = self.engine.content_position_ms();
    }

    fn clear_last_known_position(&mut self) {
        self.last_known_window = None;
        self.last_known_position_ms = None;
    }

    fn refresh_now_playing(&mut self) {
        let track = self.current_index.and_then(|index| self.queue.get(index));
        if let Some(hook) = self.now_playing.as_mut() {
            hook.update(track);
        }
    }

    fn derived_state(&self) -> DerivedState {
        DerivedState::derive(self.engine.playback_state(), self.engine.play_when_ready())
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.events.emit(event);
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(PlaybackError::Destroyed)
        } else {
            Ok(())
        }
    }
}

impl<E: MediaEngine> Drop for PlaybackManager<E> {
    fn drop(&mut self) {
        if !self.destroyed {
            let _ = self.destroy();
        }
    }
}
