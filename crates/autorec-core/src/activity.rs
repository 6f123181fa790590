//! Append-only activity log
//!
//! Records backend-selection outcomes and dispatch failures with local
//! timestamps. Never rotated or truncated; diagnosis of a flaky platform
//! API usually needs the history, not the last page.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub struct ActivityLog {
    file: Option<Mutex<File>>,
}

impl ActivityLog {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// A log that discards everything. Used by tests and embedders that
    /// only want the tracing output.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Append one timestamped line. Best effort: a failing disk must not
    /// take down a recording or playback session.
    pub fn record(&self, line: &str) {
        let Some(file) = &self.file else { return };
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut f = file.lock();
        if let Err(e) = writeln!(f, "{} {}", stamp, line) {
            tracing::warn!("activity log write failed: {}", e);
        }
    }
}
