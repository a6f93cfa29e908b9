//! Serialized playback executor
//!
//! Runs a [`PlaybackManager`] on its own thread. Commands from any thread and
//! engine callbacks from the engine's threads are queued and applied one at a
//! time, so the manager never sees two of them at once and never re-enters.
//!
//! ```text
//! host threads            playback thread              engine threads
//!      │  job + reply tx         │                            │
//!      │────────────────────────>│                            │
//!      │                         │<───────────────────────────│
//!      │                         │     EngineEventSink        │
//!      │<────────────────────────│                            │
//!      │     Result<T>           │                            │
//! ```

use crate::{
    command::{Command, Reply},
    engine::{EngineEvent, MediaEngine},
    error::{PlaybackError, Result},
    events::EventReceiver,
    manager::PlaybackManager,
    source::SourceBuilder,
    track::Track,
    types::{DerivedState, PlaybackConfig, PlayerSnapshot},
};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::io;
use std::thread::{self, JoinHandle};

type Job<E> = Box<dyn FnOnce(&mut PlaybackManager<E>) + Send>;

/// Where engine bindings deliver their callbacks
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    tx: Sender<EngineEvent>,
}

impl EngineEventSink {
    fn new() -> (Self, Receiver<EngineEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    /// Queue a callback; false once the playback thread is gone
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Thread-safe front for a manager running on a dedicated thread
pub struct PlayerHandle<E: MediaEngine> {
    jobs: Sender<Job<E>>,
    thread: Option<JoinHandle<()>>,
}

impl<E: MediaEngine + 'static> PlayerHandle<E> {
    /// Build the engine and manager and start the playback thread
    ///
    /// `make_engine` receives the sink the engine must report callbacks to.
    pub fn spawn<B, F>(
        config: PlaybackConfig,
        builder: B,
        make_engine: F,
    ) -> io::Result<(Self, EventReceiver)>
    where
        B: SourceBuilder<E::Source> + 'static,
        F: FnOnce(EngineEventSink) -> E,
    {
        let (sink, engine_events) = EngineEventSink::new();
        let engine = make_engine(sink.clone());
        let (manager, events) = PlaybackManager::new(config, engine, builder);

        let (jobs, job_rx) = unbounded::<Job<E>>();
        let thread = thread::Builder::new()
            .name("trackplay-playback".to_string())
            .spawn(move || Self::playback_thread(manager, job_rx, engine_events, sink))?;

        let handle = Self {
            jobs,
            thread: Some(thread),
        };
        Ok((handle, events))
    }

    fn playback_thread(
        mut manager: PlaybackManager<E>,
        jobs: Receiver<Job<E>>,
        engine_events: Receiver<EngineEvent>,
        // Keeps the callback channel open even if the engine drops its sink
        _sink: EngineEventSink,
    ) {
        tracing::debug!("Playback thread started");

        loop {
            select! {
                recv(jobs) -> job => match job {
                    Ok(job) => {
                        job(&mut manager);
                        if manager.is_destroyed() {
                            break;
                        }
                    }
                    // Every handle is gone
                    Err(_) => break,
                },
                recv(engine_events) -> event => {
                    if let Ok(event) = event {
                        manager.handle_engine_event(event);
                    }
                }
            }
        }

        tracing::debug!("Playback thread exiting");
    }

    /// Run `f` on the playback thread and wait for its result
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PlaybackManager<E>) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded(1);
        let job: Job<E> = Box::new(move |manager| {
            // The caller may have stopped waiting
            let _ = reply_tx.send(f(manager));
        });

        self.jobs.send(job).map_err(|_| PlaybackError::Destroyed)?;
        reply_rx.recv().map_err(|_| PlaybackError::Destroyed)?
    }

    /// Run a serialized [`Command`]
    pub fn execute(&self, command: Command) -> Result<Reply> {
        self.run(move |m| m.execute(command))
    }

    pub fn play(&self) -> Result<()> {
        self.run(PlaybackManager::play)
    }

    pub fn pause(&self) -> Result<()> {
        self.run(PlaybackManager::pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.run(PlaybackManager::stop)
    }

    pub fn reset(&self) -> Result<()> {
        self.run(PlaybackManager::reset)
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.run(move |m| m.seek_to(position_ms))
    }

    pub fn skip_to(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.run(move |m| m.skip_to(&id))
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.run(PlaybackManager::skip_to_next)
    }

    pub fn skip_to_previous(&self) -> Result<()> {
        self.run(PlaybackManager::skip_to_previous)
    }

    pub fn add(&self, track: Track, index: usize) -> Result<()> {
        self.run(move |m| m.add(track, index))
    }

    /// Append to the end of the queue
    pub fn push(&self, track: Track) -> Result<()> {
        self.run(move |m| {
            let index = m.queue_len();
            m.add(track, index)
        })
    }

    pub fn add_many(&self, tracks: Vec<Track>, index: usize) -> Result<()> {
        self.run(move |m| m.add_many(tracks, index))
    }

    pub fn update(&self, index: usize, track: Track) -> Result<()> {
        self.run(move |m| m.update(index, track))
    }

    pub fn remove(&self, indices: Vec<usize>) -> Result<()> {
        self.run(move |m| m.remove(&indices))
    }

    pub fn remove_upcoming(&self) -> Result<()> {
        self.run(PlaybackManager::remove_upcoming)
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.run(move |m| m.set_volume(volume))
    }

    pub fn volume(&self) -> Result<f32> {
        self.run(|m| m.volume())
    }

    pub fn set_volume_multiplier(&self, multiplier: f32) -> Result<()> {
        self.run(move |m| m.set_volume_multiplier(multiplier))
    }

    pub fn set_rate(&self, rate: f32) -> Result<()> {
        self.run(move |m| m.set_rate(rate))
    }

    pub fn rate(&self) -> Result<f32> {
        self.run(|m| m.rate())
    }

    pub fn position(&self) -> Result<u64> {
        self.run(|m| m.position())
    }

    pub fn buffered_position(&self) -> Result<u64> {
        self.run(|m| m.buffered_position())
    }

    pub fn duration(&self) -> Result<Option<u64>> {
        self.run(|m| m.duration())
    }

    pub fn state(&self) -> Result<DerivedState> {
        self.run(|m| m.state())
    }

    pub fn queue(&self) -> Result<Vec<Track>> {
        self.run(|m| m.queue())
    }

    pub fn current_track(&self) -> Result<Option<Track>> {
        self.run(|m| {
            m.ensure_alive()?;
            Ok(m.current_track().cloned())
        })
    }

    pub fn snapshot(&self) -> Result<PlayerSnapshot> {
        self.run(|m| m.snapshot())
    }

    /// Whether the playback thread is still accepting requests
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Destroy the manager and wait for the playback thread to finish
    ///
    /// Requests still queued behind this one fail with
    /// [`PlaybackError::Destroyed`].
    pub fn destroy(&mut self) -> Result<()> {
        let result = self.run(PlaybackManager::destroy);

        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Playback thread panicked");
            }
        }
    }
}

impl<E: MediaEngine> Drop for PlayerHandle<E> {
    fn drop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        // Already gone if a command destroyed the manager
        let job: Job<E> = Box::new(|manager| {
            if !manager.is_destroyed() {
                let _ = manager.destroy();
            }
        });
        let _ = self.jobs.send(job);

        if thread.join().is_err() {
            tracing::error!("Playback thread panicked");
        }
    }
}
