//! Source-building hook
//!
//! Turns a [`Track`] into whatever the engine consumes. The manager never
//! interprets urls itself; it hands the track and a [`SourceContext`] to the
//! configured [`SourceBuilder`] on every re-arm.

use crate::track::Track;
use lru::LruCache;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Failure to produce an engine source for a track
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to open {uri}: {reason}")]
    Open { uri: String, reason: String },
}

/// Builds engine sources from tracks
///
/// Any `FnMut(&Track, &SourceContext) -> Result<S, SourceError>` is a builder.
pub trait SourceBuilder<S>: Send {
    fn build(&mut self, track: &Track, context: &SourceContext) -> Result<S, SourceError>;
}

impl<S, F> SourceBuilder<S> for F
where
    F: FnMut(&Track, &SourceContext) -> Result<S, SourceError> + Send,
{
    fn build(&mut self, track: &Track, context: &SourceContext) -> Result<S, SourceError> {
        self(track, context)
    }
}

/// Settings a builder needs that do not belong to any one track
#[derive(Debug, Clone, Default)]
pub struct SourceContext {
    pub user_agent: Option<String>,
    pub cache_dir: Option<PathBuf>,
    /// Present when caching is enabled
    pub cache: Option<Arc<SourceCache>>,
}

impl SourceContext {
    /// User agent for this track; the track's own wins over the default
    pub fn user_agent_for<'a>(&'a self, track: &'a Track) -> Option<&'a str> {
        track.user_agent().or(self.user_agent.as_deref())
    }
}

/// LRU index of cached media keyed by url, bounded by a byte budget
///
/// The index only does the accounting. Builders record what they stored and
/// delete whatever keys come back as evicted.
#[derive(Debug)]
pub struct SourceCache {
    inner: Mutex<CacheIndex>,
}

#[derive(Debug)]
struct CacheIndex {
    entries: LruCache<String, u64>,
    used_bytes: u64,
    budget_bytes: u64,
}

impl SourceCache {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(CacheIndex {
                entries: LruCache::unbounded(),
                used_bytes: 0,
                budget_bytes,
            }),
        }
    }

    /// Record `bytes` stored under `key`, returning keys evicted to fit
    ///
    /// An entry larger than the whole budget evicts itself.
    pub fn record(&self, key: &str, bytes: u64) -> Vec<String> {
        let mut index = self.lock();

        if let Some(previous) = index.entries.put(key.to_string(), bytes) {
            index.used_bytes -= previous;
        }
        index.used_bytes += bytes;

        let mut evicted = Vec::new();
        while index.used_bytes > index.budget_bytes {
            let Some((old_key, old_bytes)) = index.entries.pop_lru() else {
                break;
            };
            index.used_bytes -= old_bytes;
            evicted.push(old_key);
        }

        if !evicted.is_empty() {
            tracing::debug!("Source cache evicted {} entries", evicted.len());
        }
        evicted
    }

    /// Mark `key` as recently used; false if it is not cached
    pub fn touch(&self, key: &str) -> bool {
        self.lock().entries.get(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains(key)
    }

    pub fn used_bytes(&self) -> u64 {
        self.lock().used_bytes
    }

    pub fn budget_bytes(&self) -> u64 {
        self.lock().budget_bytes
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Forget every entry
    pub fn clear(&self) {
        let mut index = self.lock();
        index.entries.clear();
        index.used_bytes = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheIndex> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
