//! Timeline recorder
//!
//! Owns the Idle -> Recording -> Idle state machine. During Recording the
//! capture backend feeds the sink, a collector thread appends to the
//! buffer (single writer), and `stop` drains, filters the reserved hotkey
//! toggle, sorts, and hands a non-empty timeline to the store.

use crate::activity::ActivityLog;
use crate::capture::{self, CaptureBackend, EventSink};
use crate::error::Result;
use crate::events::{self, BackendTag, Event, EventData, Macro};
use crate::hotkey::RESERVED_TOGGLE_KEY;
use crate::notify::{Notification, Notifier};
use crate::storage::MacroStore;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Channel capacity; beyond this the sink drops rather than blocks an
/// OS hook callback.
const EVENT_BUFFER: usize = 10_000;

struct Session {
    name: String,
    recording: Arc<AtomicBool>,
    backend: Box<dyn CaptureBackend>,
    tag: BackendTag,
    collector: thread::JoinHandle<Vec<Event>>,
}

type BackendSelector =
    Box<dyn Fn(EventSink, &ActivityLog) -> Result<Box<dyn CaptureBackend>> + Send>;

pub struct Recorder {
    store: Arc<dyn MacroStore>,
    activity: Arc<ActivityLog>,
    notifier: Notifier,
    selector: BackendSelector,
    session: Option<Session>,
}

impl Recorder {
    pub fn new(store: Arc<dyn MacroStore>, activity: Arc<ActivityLog>, notifier: Notifier) -> Self {
        Self::with_selector(
            store,
            activity,
            notifier,
            Box::new(capture::start_first_available),
        )
    }

    /// Same recorder with a custom backend-selection policy. Tests script
    /// capture through this.
    pub fn with_selector(
        store: Arc<dyn MacroStore>,
        activity: Arc<ActivityLog>,
        notifier: Notifier,
        selector: BackendSelector,
    ) -> Self {
        Self {
            store,
            activity,
            notifier,
            selector,
            session: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Begin a recording session. No-op while one is already running.
    /// Backend selection failures surface synchronously to the caller.
    pub fn start(&mut self, name: impl Into<String>) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let name = name.into();

        let (tx, rx) = bounded::<Event>(EVENT_BUFFER);
        let recording = Arc::new(AtomicBool::new(true));
        let sink = EventSink::new(tx, Instant::now(), recording.clone());

        let backend = match (self.selector)(sink, &self.activity) {
            Ok(b) => b,
            Err(e) => {
                recording.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        let tag = backend.tag();

        let collector = spawn_collector(rx, recording.clone());

        tracing::info!("recording '{}' via {}", name, tag);
        self.notifier.status(format!("recording '{}'", name));
        self.session = Some(Session {
            name,
            recording,
            backend,
            tag,
            collector,
        });
        Ok(())
    }

    /// End the current session. No-op while Idle. Returns the locator of
    /// the stored macro, or None when nothing was captured.
    pub fn stop(&mut self) -> Result<Option<String>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        session.recording.store(false, Ordering::SeqCst);
        session.backend.stop();

        let mut events = session.collector.join().unwrap_or_default();

        // The toggle that started/ended this session is control input,
        // not payload.
        events.retain(|e| {
            !matches!(&e.data,
                EventData::KeyDown { key } | EventData::KeyUp { key }
                    if key == RESERVED_TOGGLE_KEY)
        });
        events::sort_events(&mut events);

        if events.is_empty() {
            tracing::info!("recording '{}' captured nothing, no artifact", session.name);
            self.notifier.status(format!("'{}' captured nothing", session.name));
            return Ok(None);
        }

        let count = events.len();
        let artifact = Macro::new(session.name.clone(), events, session.tag);
        let locator = self.store.write(&artifact)?;
        self.activity.record(&format!(
            "recorded '{}' ({} events, backend {})",
            session.name, count, session.tag
        ));
        self.notifier.send(Notification::ListChanged);
        self.notifier
            .status(format!("saved '{}' ({} events)", session.name, count));
        Ok(Some(locator))
    }
}

/// Drain the sink channel into the session buffer until recording stops,
/// then sweep whatever is still queued.
fn spawn_collector(
    rx: Receiver<Event>,
    recording: Arc<AtomicBool>,
) -> thread::JoinHandle<Vec<Event>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => buffer.push(event),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    if !recording.load(Ordering::Relaxed) {
                        break;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
        while let Ok(event) = rx.try_recv() {
            buffer.push(event);
        }
        buffer
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FsMacroStore, MacroStore};

    fn store() -> (tempfile::TempDir, Arc<dyn MacroStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsMacroStore::new(dir.path()).unwrap());
        (dir, store)
    }

    fn recorder(store: Arc<dyn MacroStore>) -> Recorder {
        Recorder::new(store, Arc::new(ActivityLog::disabled()), Notifier::disabled())
    }

    #[test]
    fn stop_while_idle_is_a_noop() {
        let (_dir, store) = store();
        let mut rec = recorder(store.clone());
        assert!(!rec.is_recording());
        assert_eq!(rec.stop().unwrap(), None);
        assert!(store.list().unwrap().is_empty());
    }

    /// Backend double that plays a fixed script into the sink on start.
    struct Scripted {
        script: Vec<EventData>,
    }

    impl CaptureBackend for Scripted {
        fn tag(&self) -> BackendTag {
            BackendTag::PushHook
        }
        fn start(&mut self, sink: EventSink) -> Result<()> {
            for data in self.script.drain(..) {
                sink.push(data);
                thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        }
        fn stop(&mut self) {}
    }

    fn scripted_recorder(store: Arc<dyn MacroStore>, script: Vec<EventData>) -> Recorder {
        let script = std::sync::Mutex::new(Some(script));
        Recorder::with_selector(
            store,
            Arc::new(ActivityLog::disabled()),
            Notifier::disabled(),
            Box::new(move |sink, _activity| {
                let script = script.lock().unwrap().take().unwrap_or_default();
                let mut backend = Scripted { script };
                backend.start(sink)?;
                Ok(Box::new(Scripted { script: Vec::new() }))
            }),
        )
    }

    #[test]
    fn records_sorts_and_persists() {
        let (_dir, store) = store();
        let mut rec = scripted_recorder(
            store.clone(),
            vec![
                EventData::MouseMove { x: 10, y: 10 },
                EventData::KeyDown { key: "a".into() },
                EventData::KeyUp { key: "a".into() },
            ],
        );

        rec.start("session").unwrap();
        assert!(rec.is_recording());
        thread::sleep(Duration::from_millis(30));
        let locator = rec.stop().unwrap().expect("artifact expected");
        assert!(!rec.is_recording());

        let stored = store.read(&locator).unwrap();
        assert_eq!(stored.name, "session");
        assert_eq!(stored.events.len(), 3);
        assert!(stored
            .events
            .windows(2)
            .all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn start_while_recording_is_a_noop() {
        let (_dir, store) = store();
        let mut rec = scripted_recorder(
            store.clone(),
            vec![EventData::KeyDown { key: "a".into() }],
        );

        rec.start("first").unwrap();
        // Second start must not replace the running session.
        rec.start("second").unwrap();
        thread::sleep(Duration::from_millis(20));
        let locator = rec.stop().unwrap().unwrap();

        let stored = store.read(&locator).unwrap();
        assert_eq!(stored.name, "first");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn empty_buffer_yields_no_artifact() {
        let (_dir, store) = store();
        let mut rec = scripted_recorder(store.clone(), Vec::new());
        rec.start("nothing").unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(rec.stop().unwrap(), None);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn reserved_toggle_key_is_filtered() {
        let (_dir, store) = store();
        let mut rec = scripted_recorder(
            store.clone(),
            vec![
                EventData::KeyDown { key: RESERVED_TOGGLE_KEY.into() },
                EventData::KeyDown { key: "a".into() },
                EventData::KeyUp { key: "a".into() },
                EventData::KeyUp { key: RESERVED_TOGGLE_KEY.into() },
            ],
        );
        rec.start("toggled").unwrap();
        thread::sleep(Duration::from_millis(30));
        let locator = rec.stop().unwrap().unwrap();
        let stored = store.read(&locator).unwrap();
        assert_eq!(stored.events.len(), 2);
        assert!(stored.events.iter().all(|e| !matches!(
            &e.data,
            EventData::KeyDown { key } | EventData::KeyUp { key } if key == RESERVED_TOGGLE_KEY
        )));
    }

    #[test]
    fn collector_drains_and_returns_buffer() {
        let (tx, rx) = bounded::<Event>(16);
        let recording = Arc::new(AtomicBool::new(true));
        let handle = spawn_collector(rx, recording.clone());

        let sink = EventSink::new(tx, Instant::now(), recording.clone());
        sink.push(EventData::MouseMove { x: 1, y: 2 });
        sink.push(EventData::KeyDown { key: "a".into() });

        thread::sleep(Duration::from_millis(50));
        recording.store(false, Ordering::SeqCst);
        // Pushed after the flag flip: the sink gate drops it.
        sink.push(EventData::KeyUp { key: "a".into() });

        let buffer = handle.join().unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer[0].data, EventData::MouseMove { x: 1, y: 2 });
        assert!(buffer[0].time <= buffer[1].time);
    }
}
