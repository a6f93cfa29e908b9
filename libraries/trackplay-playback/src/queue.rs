//! Identity-keyed track queue
//!
//! An ordered sequence of tracks where no two entries share an id. A
//! secondary `id -> position` index is kept in step with every mutation so
//! lookups by identity are O(1).
//!
//! The queue knows nothing about which entry is current; the playback manager
//! owns that and reacts to the [`Insertion`] and removal reports returned here.

use crate::error::{PlaybackError, Result};
use crate::track::Track;
use std::collections::HashMap;

/// What `add` did with a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// New entry at this position
    Inserted(usize),
    /// An entry with the same id already sat at this position and was replaced
    Replaced(usize),
}

/// Ordered, id-unique sequence of tracks
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    positions: HashMap<String, usize>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `track` at `index`, or replace the entry that already has its id
    ///
    /// `index` must lie in `[0, len]` either way.
    pub fn add(&mut self, track: Track, index: usize) -> Result<Insertion> {
        self.check_insert_index("add", index)?;

        if let Some(&existing) = self.positions.get(track.id()) {
            self.tracks[existing] = track;
            return Ok(Insertion::Replaced(existing));
        }

        self.tracks.insert(index, track);
        self.reindex_from(index);
        Ok(Insertion::Inserted(index))
    }

    /// Remove the entries at `indices`
    ///
    /// Every index is validated before anything is removed. Removal runs in
    /// descending order so the remaining indices stay valid throughout.
    /// Returns the removed entries with their former positions, highest first.
    pub fn remove(&mut self, indices: &[usize]) -> Result<Vec<(usize, Track)>> {
        let len = self.tracks.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(PlaybackError::IndexOutOfRange {
                op: "remove",
                index: bad,
                len,
            });
        }

        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        let mut removed = Vec::with_capacity(sorted.len());
        for index in sorted {
            let track = self.tracks.remove(index);
            self.positions.remove(track.id());
            removed.push((index, track));
        }

        if let Some(&(lowest, _)) = removed.last() {
            self.reindex_from(lowest);
        }

        Ok(removed)
    }

    /// Drop every entry strictly after `index`
    pub fn truncate_after(&mut self, index: usize) -> Vec<Track> {
        if index + 1 >= self.tracks.len() {
            return Vec::new();
        }

        let dropped = self.tracks.split_off(index + 1);
        for track in &dropped {
            self.positions.remove(track.id());
        }
        dropped
    }

    /// Replace the entry at `index`, returning the old one
    ///
    /// The new track may keep the old id or take a fresh one, but it may not
    /// take an id that another entry already uses.
    pub fn replace(&mut self, index: usize, track: Track) -> Result<Track> {
        let len = self.tracks.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfRange {
                op: "update",
                index,
                len,
            });
        }

        if let Some(&other) = self.positions.get(track.id()) {
            if other != index {
                return Err(PlaybackError::invalid_track(format!(
                    "id '{}' is already queued at {}",
                    track.id(),
                    other
                )));
            }
        }

        let old = std::mem::replace(&mut self.tracks[index], track);
        self.positions.remove(old.id());
        self.positions
            .insert(self.tracks[index].id().to_string(), index);
        Ok(old)
    }

    /// Position of the entry with this id
    pub fn index_of(&self, id: &str) -> Option<usize> {
        if id.is_empty() {
            return None;
        }
        self.positions.get(id).copied()
    }

    /// Get track at index
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Borrow the whole sequence
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Detached copy of the sequence
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.clone()
    }

    /// Clear entire queue
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.positions.clear();
    }

    /// Total number of tracks in queue
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn check_insert_index(&self, op: &'static str, index: usize) -> Result<()> {
        let len = self.tracks.len();
        if index > len {
            return Err(PlaybackError::IndexOutOfRange { op, index, len });
        }
        Ok(())
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, track) in self.tracks[start..].iter().enumerate() {
            self.positions.insert(track.id().to_string(), start + offset);
        }
    }
}
