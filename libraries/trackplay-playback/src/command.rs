//! Inbound command vocabulary
//!
//! Serializable form of every operation a controlling application can
//! request, so hosts can route commands from any transport through
//! [`PlaybackManager::execute`].

use crate::{
    engine::MediaEngine,
    error::{PlaybackError, Result},
    manager::PlaybackManager,
    track::{Track, TrackDescriptor},
    types::{DerivedState, PlayerSnapshot},
};
use serde::{Deserialize, Serialize};

/// A request to the playback manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    Play,
    Pause,
    Stop,
    Reset,
    SeekTo {
        position_ms: u64,
    },
    SkipTo {
        id: String,
    },
    SkipToNext,
    SkipToPrevious,
    /// Insert or replace one track; no index appends
    Add {
        track: TrackDescriptor,
        #[serde(default)]
        index: Option<usize>,
    },
    /// Insert or replace several tracks; no index appends
    AddMany {
        tracks: Vec<TrackDescriptor>,
        #[serde(default)]
        index: Option<usize>,
    },
    Update {
        index: usize,
        track: TrackDescriptor,
    },
    Remove {
        indices: Vec<usize>,
    },
    RemoveUpcoming,
    SetVolume {
        volume: f32,
    },
    GetVolume,
    SetVolumeMultiplier {
        multiplier: f32,
    },
    SetRate {
        rate: f32,
    },
    GetRate,
    Position,
    BufferedPosition,
    Duration,
    GetState,
    GetQueue,
    GetCurrentTrack,
    Snapshot,
    Destroy,
}

/// Successful result of a [`Command`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "kebab-case")]
pub enum Reply {
    Done,
    Volume { volume: f32 },
    Rate { rate: f32 },
    Position { position_ms: u64 },
    Duration { duration_ms: Option<u64> },
    State { state: DerivedState },
    Queue { tracks: Vec<Track> },
    CurrentTrack { track: Option<Track> },
    Snapshot(PlayerSnapshot),
}

impl<E: MediaEngine> PlaybackManager<E> {
    /// Run one command
    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        tracing::debug!("Executing {:?}", command);

        let reply = match command {
            Command::Play => self.play().map(|()| Reply::Done)?,
            Command::Pause => self.pause().map(|()| Reply::Done)?,
            Command::Stop => self.stop().map(|()| Reply::Done)?,
            Command::Reset => self.reset().map(|()| Reply::Done)?,
            Command::SeekTo { position_ms } => self.seek_to(position_ms).map(|()| Reply::Done)?,
            Command::SkipTo { id } => self.skip_to(&id).map(|()| Reply::Done)?,
            Command::SkipToNext => self.skip_to_next().map(|()| Reply::Done)?,
            Command::SkipToPrevious => self.skip_to_previous().map(|()| Reply::Done)?,
            Command::Add { track, index } => {
                self.ensure_alive()?;
                let track = Track::try_from(track)?;
                let index = index.unwrap_or(self.queue_len());
                self.add(track, index)?;
                Reply::Done
            }
            Command::AddMany { tracks, index } => {
                self.add_descriptors(tracks, index)?;
                Reply::Done
            }
            Command::Update { index, track } => {
                self.ensure_alive()?;
                self.update(index, Track::try_from(track)?)?;
                Reply::Done
            }
            Command::Remove { indices } => self.remove(&indices).map(|()| Reply::Done)?,
            Command::RemoveUpcoming => self.remove_upcoming().map(|()| Reply::Done)?,
            Command::SetVolume { volume } => self.set_volume(volume).map(|()| Reply::Done)?,
            Command::GetVolume => Reply::Volume {
                volume: self.volume()?,
            },
            Command::SetVolumeMultiplier { multiplier } => self
                .set_volume_multiplier(multiplier)
                .map(|()| Reply::Done)?,
            Command::SetRate { rate } => self.set_rate(rate).map(|()| Reply::Done)?,
            Command::GetRate => Reply::Rate { rate: self.rate()? },
            Command::Position => Reply::Position {
                position_ms: self.position()?,
            },
            Command::BufferedPosition => Reply::Position {
                position_ms: self.buffered_position()?,
            },
            Command::Duration => Reply::Duration {
                duration_ms: self.duration()?,
            },
            Command::GetState => Reply::State {
                state: self.state()?,
            },
            Command::GetQueue => Reply::Queue {
                tracks: self.queue()?,
            },
            Command::GetCurrentTrack => {
                self.ensure_alive()?;
                Reply::CurrentTrack {
                    track: self.current_track().cloned(),
                }
            }
            Command::Snapshot => Reply::Snapshot(self.snapshot()?),
            Command::Destroy => self.destroy().map(|()| Reply::Done)?,
        };

        Ok(reply)
    }

    /// Validate descriptors one by one and add the valid ones
    ///
    /// Invalid descriptors are reported by their position in `descriptors`;
    /// the rest are still added.
    fn add_descriptors(
        &mut self,
        descriptors: Vec<TrackDescriptor>,
        index: Option<usize>,
    ) -> Result<()> {
        self.ensure_alive()?;
        let mut failures = Vec::new();
        let mut tracks = Vec::with_capacity(descriptors.len());
        let mut positions = Vec::with_capacity(descriptors.len());

        for (position, descriptor) in descriptors.into_iter().enumerate() {
            match Track::try_from(descriptor) {
                Ok(track) => {
                    tracks.push(track);
                    positions.push(position);
                }
                Err(e) => failures.push((position, e)),
            }
        }

        let index = index.unwrap_or(self.queue_len());
        match self.add_many(tracks, index) {
            Ok(()) => {}
            Err(PlaybackError::Partial { failures: inner }) => {
                failures.extend(inner.into_iter().map(|(i, e)| (positions[i], e)));
                failures.sort_by_key(|(position, _)| *position);
            }
            Err(e) => return Err(e),
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PlaybackError::Partial { failures })
        }
    }
}
