//! Track model
//!
//! A [`Track`] is an immutable descriptor of one playable item. It is built
//! from a declarative [`TrackDescriptor`] and validated once; a deserialized
//! `Track` goes through the same validation.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Schemes that resolve on the device itself and need no network
const LOCAL_SCHEMES: &[&str] = &[
    "file",
    "content",
    "asset",
    "res",
    "android.resource",
    "rawresource",
    "data",
];

/// Stream type hint
///
/// Advisory only; the engine may detect something else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    #[default]
    Default,
    Dash,
    Hls,
    SmoothStreaming,
}

impl TrackType {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackType::Default => "default",
            TrackType::Dash => "dash",
            TrackType::Hls => "hls",
            TrackType::SmoothStreaming => "smoothstreaming",
        }
    }
}

impl FromStr for TrackType {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(TrackType::Default),
            "dash" => Ok(TrackType::Dash),
            "hls" => Ok(TrackType::Hls),
            "smoothstreaming" => Ok(TrackType::SmoothStreaming),
            other => Err(PlaybackError::invalid_track(format!(
                "unknown track type '{}'",
                other
            ))),
        }
    }
}

/// Time-stretch algorithm requested for rate changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchAlgorithm {
    Linear,
    Music,
    Voice,
}

impl PitchAlgorithm {
    fn as_str(self) -> &'static str {
        match self {
            PitchAlgorithm::Linear => "linear",
            PitchAlgorithm::Music => "music",
            PitchAlgorithm::Voice => "voice",
        }
    }
}

impl FromStr for PitchAlgorithm {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(PitchAlgorithm::Linear),
            "music" => Ok(PitchAlgorithm::Music),
            "voice" => Ok(PitchAlgorithm::Voice),
            other => Err(PlaybackError::invalid_track(format!(
                "unknown pitch algorithm '{}'",
                other
            ))),
        }
    }
}

/// Declarative description of a track, as sent by the controlling application
///
/// Every key that is not one of the known fields lands in `presentation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub url: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Known duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_algorithm: Option<String>,

    /// Title, artist, artwork and anything else the host displays
    #[serde(flatten)]
    pub presentation: Map<String, Value>,
}

impl TrackDescriptor {
    /// Minimal descriptor with an id and a url
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Self::default()
        }
    }
}

/// One playable item
///
/// Tracks compare and hash by `id` only: two tracks with the same id are the
/// same logical queue entry even if their urls differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TrackDescriptor", into = "TrackDescriptor")]
pub struct Track {
    id: String,
    uri: Url,
    kind: TrackType,
    duration_ms: Option<u64>,
    is_remote: bool,
    user_agent: Option<String>,
    content_type: Option<String>,
    pitch_algorithm: Option<PitchAlgorithm>,
    presentation: Map<String, Value>,
}

impl Track {
    /// Validate a descriptor and build the track
    pub fn from_descriptor(descriptor: TrackDescriptor) -> Result<Self> {
        let TrackDescriptor {
            id,
            url,
            kind,
            duration_ms,
            user_agent,
            content_type,
            pitch_algorithm,
            presentation,
        } = descriptor;

        if id.trim().is_empty() {
            return Err(PlaybackError::invalid_track("id must not be empty"));
        }

        let uri = parse_uri(&url)?;
        let kind = kind
            .as_deref()
            .map(str::parse::<TrackType>)
            .transpose()?
            .unwrap_or_default();
        let pitch_algorithm = pitch_algorithm
            .as_deref()
            .map(str::parse::<PitchAlgorithm>)
            .transpose()?;

        let duration_ms = match duration_ms {
            Some(ms) if ms < 0 => {
                return Err(PlaybackError::invalid_track(format!(
                    "duration must not be negative (got {})",
                    ms
                )))
            }
            Some(0) | None => None,
            Some(ms) => Some(ms as u64),
        };

        let is_remote = !LOCAL_SCHEMES.contains(&uri.scheme());

        Ok(Self {
            id,
            uri,
            kind,
            duration_ms,
            is_remote,
            user_agent,
            content_type,
            pitch_algorithm,
            presentation,
        })
    }

    /// Shorthand for a track with just an id and a url
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        Self::from_descriptor(TrackDescriptor::new(id, url))
    }

    /// Same track with a known duration
    ///
    /// Capped at `i64::MAX`, the largest duration a descriptor can carry.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        let duration_ms = duration_ms.min(i64::MAX as u64);
        self.duration_ms = (duration_ms > 0).then_some(duration_ms);
        self
    }

    /// Same track with a presentation field set
    pub fn with_presentation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.presentation.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn kind(&self) -> TrackType {
        self.kind
    }

    /// Declared duration; `None` means ask the engine
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Whether playback needs the network to stay up
    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn pitch_algorithm(&self) -> Option<PitchAlgorithm> {
        self.pitch_algorithm
    }

    /// Opaque presentation bag, passed through untouched
    pub fn presentation(&self) -> &Map<String, Value> {
        &self.presentation
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.uri)
    }
}

impl TryFrom<TrackDescriptor> for Track {
    type Error = PlaybackError;

    fn try_from(descriptor: TrackDescriptor) -> Result<Self> {
        Self::from_descriptor(descriptor)
    }
}

impl From<Track> for TrackDescriptor {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            url: track.uri.into(),
            kind: (track.kind != TrackType::Default).then(|| track.kind.as_str().to_string()),
            duration_ms: track
                .duration_ms
                .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
            user_agent: track.user_agent,
            content_type: track.content_type,
            pitch_algorithm: track.pitch_algorithm.map(|p| p.as_str().to_string()),
            presentation: track.presentation,
        }
    }
}

fn parse_uri(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PlaybackError::invalid_track("url must not be empty"));
    }

    match Url::parse(raw) {
        Ok(uri) => Ok(uri),
        // Bare absolute paths are local files
        Err(url::ParseError::RelativeUrlWithoutBase) if Path::new(raw).is_absolute() => {
            Url::from_file_path(raw).map_err(|()| {
                PlaybackError::invalid_track(format!("url '{}' is not a usable file path", raw))
            })
        }
        Err(e) => Err(PlaybackError::invalid_track(format!(
            "url '{}' is not parseable: {}",
            raw, e
        ))),
    }
}
