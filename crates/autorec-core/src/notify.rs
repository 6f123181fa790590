//! Narrow status/progress channel from the core to a presentation layer
//!
//! The core never holds presentation references; everything outbound goes
//! through this channel and a listener drains it at its own pace.

use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Free-form status text ("recording started", long-wait notices).
    Status(String),
    /// Playback progress, emitted on a fixed event cadence.
    Progress { name: String, percent: u8 },
    PlaybackFinished { name: String },
    /// Whole-playback abort, reported exactly once per invocation.
    PlaybackFailed { name: String, reason: String },
    /// The set of stored macros or schedule entries changed.
    ListChanged,
}

/// Clonable sending half. A disabled notifier drops everything, which
/// keeps headless paths and tests free of plumbing.
#[derive(Clone)]
pub struct Notifier {
    tx: Option<Sender<Notification>>,
}

impl Notifier {
    pub fn channel() -> (Self, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, n: Notification) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(n);
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.send(Notification::Status(text.into()));
    }
}
