//! Embedded stream metadata
//!
//! Engines hand over raw metadata entries found in the container (ID3 frames)
//! or in the HTTP stream (ICY headers and in-band titles). This module turns
//! them into the normalized [`ReceivedMetadata`] records the manager emits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raw metadata entry as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEntry {
    /// ID3 text information frame (`TIT2`, `TPE1`, ...)
    TextInformation { id: String, value: String },
    /// ID3 URL link frame (`WOAS`, ...)
    UrlLink { id: String, url: String },
    /// Icecast/Shoutcast response headers
    IcyHeaders {
        name: Option<String>,
        url: Option<String>,
        genre: Option<String>,
        bitrate: Option<u32>,
    },
    /// In-band ICY stream title
    IcyInfo {
        title: Option<String>,
        url: Option<String>,
    },
}

/// A batch of entries delivered in one engine callback
pub type Metadata = Vec<MetadataEntry>;

/// Where a [`ReceivedMetadata`] record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataSource {
    #[serde(rename = "id3")]
    Id3,
    #[serde(rename = "icy-headers")]
    IcyHeaders,
    #[serde(rename = "icy")]
    Icy,
}

/// Normalized metadata surfaced to the controlling application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMetadata {
    pub source: MetadataSource,
    pub title: Option<String>,
    pub url: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub date: Option<String>,
    pub genre: Option<String>,
    /// Unrecognized ID3 text frames keyed by frame id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

impl ReceivedMetadata {
    fn empty(source: MetadataSource) -> Self {
        Self {
            source,
            title: None,
            url: None,
            artist: None,
            album: None,
            date: None,
            genre: None,
            extras: BTreeMap::new(),
        }
    }

    fn has_known_field(&self) -> bool {
        self.title.is_some()
            || self.url.is_some()
            || self.artist.is_some()
            || self.album.is_some()
            || self.date.is_some()
            || self.genre.is_some()
    }
}

/// Parse every record carried by one metadata batch
///
/// ID3 frames are folded into at most one record; ICY entries produce one
/// record each, in order.
pub fn parse(metadata: &[MetadataEntry]) -> Vec<ReceivedMetadata> {
    let mut records = Vec::new();
    if let Some(id3) = parse_id3(metadata) {
        records.push(id3);
    }
    records.extend(metadata.iter().filter_map(parse_icy));
    records
}

fn parse_id3(metadata: &[MetadataEntry]) -> Option<ReceivedMetadata> {
    let mut record = ReceivedMetadata::empty(MetadataSource::Id3);

    for entry in metadata {
        match entry {
            MetadataEntry::TextInformation { id, value } => {
                let id = id.to_ascii_uppercase();
                let slot = match id.as_str() {
                    "TIT2" | "TT2" => &mut record.title,
                    "TALB" | "TOAL" | "TAL" => &mut record.album,
                    "TOPE" | "TPE1" | "TP1" => &mut record.artist,
                    "TDAT" | "TDRC" | "TOR" => &mut record.date,
                    "TCON" | "TCO" => &mut record.genre,
                    _ => {
                        record.extras.insert(id.clone(), value.clone());
                        continue;
                    }
                };
                *slot = Some(value.clone());
            }
            MetadataEntry::UrlLink { id, url } => {
                if matches!(
                    id.to_ascii_uppercase().as_str(),
                    "WOAS" | "WOAF" | "WOAR" | "WAR"
                ) {
                    record.url = Some(url.clone());
                }
            }
            MetadataEntry::IcyHeaders { .. } | MetadataEntry::IcyInfo { .. } => {}
        }
    }

    record.has_known_field().then_some(record)
}

fn parse_icy(entry: &MetadataEntry) -> Option<ReceivedMetadata> {
    match entry {
        MetadataEntry::IcyHeaders {
            name, url, genre, ..
        } => {
            let mut record = ReceivedMetadata::empty(MetadataSource::IcyHeaders);
            record.title = name.clone();
            record.url = url.clone();
            record.genre = genre.clone();
            Some(record)
        }
        MetadataEntry::IcyInfo { title, url } => {
            let mut record = ReceivedMetadata::empty(MetadataSource::Icy);
            match title.as_deref().and_then(|t| t.split_once(" - ")) {
                Some((artist, title)) => {
                    record.artist = Some(artist.to_string());
                    record.title = Some(title.to_string());
                }
                None => record.title = title.clone(),
            }
            record.url = url.clone();
            Some(record)
        }
        MetadataEntry::TextInformation { .. } | MetadataEntry::UrlLink { .. } => None,
    }
}
