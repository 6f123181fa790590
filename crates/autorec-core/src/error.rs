//! Error taxonomy for the recording/replay core
//!
//! Playback never raises into a caller's thread; anything that happens
//! during a replay is observable only through the notification channel.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed user input (e.g. a bad "HH:MM" string). Rejected at entry,
    /// nothing is mutated.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No capture backend could be initialized. Surfaces synchronously to
    /// the start-recording caller.
    #[error("no capture backend available: {0}")]
    BackendUnavailable(String),

    /// Read/write/corrupt persisted data.
    #[error("storage error: {0}")]
    Storage(String),

    /// A single injection attempt failed during playback. Logged, playback
    /// continues with the next event.
    #[error("dispatch failed ({tier}): {message}")]
    Dispatch {
        tier: &'static str,
        message: String,
    },

    /// The whole playback is unusable (artifact unreadable or structurally
    /// invalid). Reported once via the notify channel.
    #[error("playback aborted: {0}")]
    FatalPlayback(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}
