//! Now-playing surface hook

use crate::track::Track;

/// Receives the current track so a host can refresh lock-screen or
/// notification metadata
///
/// Called on every re-arm and when the current slot is updated in place.
/// `None` means nothing is current any more.
pub trait NowPlaying: Send {
    fn update(&mut self, track: Option<&Track>);
}

impl<F> NowPlaying for F
where
    F: FnMut(Option<&Track>) + Send,
{
    fn update(&mut self, track: Option<&Track>) {
        self(track);
    }
}
