//! OS-level input capture
//!
//! Three interchangeable strategies behind one trait, attempted strictly
//! in priority order: the rdev push hook, the low-level Windows hook, and
//! a ~10ms polling sampler. The first one whose `start` succeeds wins and
//! its tag ends up on the recorded macro.

mod hook;
mod lowlevel;
mod poll;

pub use hook::PushHookBackend;
pub use lowlevel::LowLevelHookBackend;
pub use poll::PollingBackend;

use crate::activity::ActivityLog;
use crate::error::{CoreError, Result};
use crate::events::{BackendTag, Event, EventData};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// How long `stop` waits for a backend worker before detaching it.
pub const STOP_JOIN_WAIT: std::time::Duration = std::time::Duration::from_secs(1);

/// Where backends deliver normalized events.
///
/// The sink stamps the time offset at delivery and silently drops events
/// once recording has been switched off, so a hook that outlives its
/// session (the rdev listener cannot be unregistered) goes inert instead
/// of polluting the next one.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<Event>,
    start: Instant,
    recording: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(tx: Sender<Event>, start: Instant, recording: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            start,
            recording,
        }
    }

    pub fn push(&self, data: EventData) {
        if !self.recording.load(Ordering::Relaxed) {
            return;
        }
        let time = self.start.elapsed().as_secs_f64();
        let _ = self.tx.try_send(Event::new(time, data));
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }
}

pub trait CaptureBackend: Send {
    fn tag(&self) -> BackendTag;

    /// Begin delivering events into the sink. Err means this variant is
    /// unavailable and the next one should be tried.
    fn start(&mut self, sink: EventSink) -> Result<()>;

    /// Stop delivering. Bounded wait; a worker that cannot be joined in
    /// time is detached (the sink gate keeps it harmless).
    fn stop(&mut self);
}

/// Try each capture variant in priority order and return the first that
/// starts. Outcomes land in the activity log either way.
pub fn start_first_available(
    sink: EventSink,
    activity: &ActivityLog,
) -> Result<Box<dyn CaptureBackend>> {
    let backends: Vec<Box<dyn CaptureBackend>> = vec![
        Box::new(PushHookBackend::new()),
        Box::new(LowLevelHookBackend::new()),
        Box::new(PollingBackend::new()),
    ];

    let mut failures = Vec::new();
    for mut backend in backends {
        let tag = backend.tag();
        match backend.start(sink.clone()) {
            Ok(()) => {
                tracing::info!("capture backend {} selected", tag);
                activity.record(&format!("capture backend {} selected", tag));
                return Ok(backend);
            }
            Err(e) => {
                tracing::warn!("capture backend {} unavailable: {}", tag, e);
                activity.record(&format!("capture backend {} unavailable: {}", tag, e));
                failures.push(format!("{}: {}", tag, e));
            }
        }
    }

    Err(CoreError::BackendUnavailable(failures.join("; ")))
}
