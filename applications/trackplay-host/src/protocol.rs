//! Newline-delimited JSON protocol
//!
//! One request per input line, one response per request, and one line per
//! playback event:
//!
//! ```text
//! > {"request": 1, "command": "add", "track": {"id": "a", "url": "https://..."}}
//! < {"request":1,"ok":{"reply":"done"}}
//! > {"request": 2, "command": "skip-to", "id": "missing"}
//! < {"request":2,"error":{"code":"track_not_in_queue","message":"..."}}
//! < {"event":{"type":"track-changed",...}}
//! ```

use crate::error::HostError;
use serde::{Deserialize, Serialize};
use trackplay_playback::{
    Command, MediaEngine, PlaybackError, PlaybackEvent, PlayerHandle, Reply,
};

/// One inbound line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    /// Echoed back so clients can match responses; `id` belongs to commands
    #[serde(default, rename = "request")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub command: Command,
}

/// Outcome of one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(rename = "request", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok(Reply),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,

    /// Per-element failures of a batch command
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub index: usize,
    pub code: String,
    pub message: String,
}

/// Event line written to the output
#[derive(Debug, Serialize)]
pub struct EventLine<'a> {
    pub event: &'a PlaybackEvent,
}

impl From<&PlaybackError> for ErrorBody {
    fn from(err: &PlaybackError) -> Self {
        let failures = match err {
            PlaybackError::Partial { failures } => failures
                .iter()
                .map(|(index, e)| Failure {
                    index: *index,
                    code: e.code().to_string(),
                    message: e.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            failures,
        }
    }
}

impl From<&HostError> for ErrorBody {
    fn from(err: &HostError) -> Self {
        Self {
            code: "bad_request".to_string(),
            message: err.to_string(),
            failures: Vec::new(),
        }
    }
}

/// Parse one input line; `None` for blank lines
pub fn parse_request(line: &str) -> Option<Result<Request, HostError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    Some(
        serde_json::from_str(line)
            .map_err(|e| HostError::BadRequest(format!("cannot parse request: {}", e))),
    )
}

/// Run one input line against the player
pub fn handle_line<E>(handle: &PlayerHandle<E>, line: &str) -> Option<Response>
where
    E: MediaEngine + 'static,
{
    let response = match parse_request(line)? {
        Ok(request) => {
            tracing::debug!("Request {:?}", request);
            let outcome = match handle.execute(request.command) {
                Ok(reply) => Outcome::Ok(reply),
                Err(e) => {
                    tracing::debug!("Request {:?} failed: {}", request.id, e);
                    Outcome::Error(ErrorBody::from(&e))
                }
            };
            Response {
                id: request.id,
                outcome,
            }
        }
        Err(e) => {
            tracing::warn!("{}", e);
            Response {
                id: None,
                outcome: Outcome::Error(ErrorBody::from(&e)),
            }
        }
    };

    Some(response)
}

/// Serialize a response as one output line
pub fn response_line(response: &Response) -> Result<String, HostError> {
    Ok(serde_json::to_string(response)?)
}

/// Serialize an event as one output line
pub fn event_line(event: &PlaybackEvent) -> Result<String, HostError> {
    Ok(serde_json::to_string(&EventLine { event })?)
}
