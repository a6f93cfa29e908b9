//! Trackplay Host Library
//!
//! Reference host for the playback core: a simulated engine, file and
//! environment configuration, and a newline-delimited JSON protocol.
//!
//! This library exposes the host components for testing purposes.

pub mod config;
pub mod error;
pub mod protocol;
pub mod sim;

// Re-export commonly used types for convenience
pub use config::{HostConfig, LogSettings, SimSettings};
pub use error::{HostError, Result};
pub use protocol::{Request, Response};
pub use sim::{SimEngine, SimSource, SimTicker};
