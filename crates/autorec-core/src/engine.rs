//! Engine facade - the contract a presentation layer talks to
//!
//! Owns the recorder, the macro store, the schedule book and the
//! scheduler. Everything outbound goes through the notification channel;
//! the engine never holds references into a caller. Playback always
//! executes off-thread, so its errors are observable only as
//! notifications.

use crate::activity::ActivityLog;
use crate::error::Result;
use crate::events::Macro;
use crate::inject::TieredInjector;
use crate::notify::{Notification, Notifier};
use crate::playback::{Playback, PlaybackOptions};
use crate::recorder::Recorder;
use crate::scheduler::{PlaybackLauncher, ScheduleBook, ScheduleEntry, Scheduler};
use crate::storage::{FsMacroStore, MacroStore, MacroSummary};
use crate::hotkey::HotkeyListener;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Holds `macros/`, `schedules.json` and `activity.log`.
    pub base_dir: PathBuf,
    pub playback: PlaybackOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".into());
        Self {
            base_dir: PathBuf::from(home).join(".autorec"),
            playback: PlaybackOptions::default(),
        }
    }
}

/// Cooperative cancel handle for one running playback. Dropping it does
/// not stop the playback; it runs to completion unless cancelled.
pub struct PlaybackHandle {
    alive: Arc<AtomicBool>,
}

impl PlaybackHandle {
    pub fn cancel(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

pub struct MacroEngine {
    store: Arc<dyn MacroStore>,
    activity: Arc<ActivityLog>,
    notifier: Notifier,
    recorder: Mutex<Recorder>,
    book: Arc<ScheduleBook>,
    scheduler: Mutex<Scheduler>,
    playback_options: PlaybackOptions,
}

impl MacroEngine {
    /// Build the engine and the notification stream a presentation layer
    /// subscribes to.
    pub fn new(config: EngineConfig) -> Result<(Arc<Self>, Receiver<Notification>)> {
        std::fs::create_dir_all(&config.base_dir)?;
        let (notifier, notifications) = Notifier::channel();

        let activity = Arc::new(
            ActivityLog::open(config.base_dir.join("activity.log")).unwrap_or_else(|e| {
                tracing::warn!("activity log unavailable: {}", e);
                ActivityLog::disabled()
            }),
        );
        let store: Arc<dyn MacroStore> =
            Arc::new(FsMacroStore::new(config.base_dir.join("macros"))?);
        let book = Arc::new(ScheduleBook::load(config.base_dir.join("schedules.json")));

        let launcher: PlaybackLauncher = {
            let store = store.clone();
            let notifier = notifier.clone();
            let activity = activity.clone();
            let options = config.playback.clone();
            Arc::new(move |locator: &str| {
                spawn_playback(
                    store.clone(),
                    notifier.clone(),
                    activity.clone(),
                    options.clone(),
                    locator.to_string(),
                );
            })
        };

        let scheduler = Scheduler::new(
            book.clone(),
            store.clone(),
            notifier.clone(),
            launcher,
        );
        let recorder = Recorder::new(store.clone(), activity.clone(), notifier.clone());

        let engine = Arc::new(Self {
            store,
            activity,
            notifier,
            recorder: Mutex::new(recorder),
            book,
            scheduler: Mutex::new(scheduler),
            playback_options: config.playback,
        });
        Ok((engine, notifications))
    }

    // === Recording ===

    pub fn start_recording(&self, name: impl Into<String>) -> Result<()> {
        self.recorder.lock().start(name)
    }

    pub fn stop_recording(&self) -> Result<Option<String>> {
        self.recorder.lock().stop()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.lock().is_recording()
    }

    /// Hotkey entry point: stop if recording, otherwise start under an
    /// auto-generated timestamp name.
    pub fn toggle_recording(&self) -> Result<()> {
        let mut recorder = self.recorder.lock();
        if recorder.is_recording() {
            recorder.stop()?;
            Ok(())
        } else {
            let name = chrono::Local::now().format("macro_%Y%m%d_%H%M%S").to_string();
            recorder.start(name)
        }
    }

    /// Spawn the always-on toggle listener bound to this engine.
    pub fn start_hotkey_listener(self: &Arc<Self>) -> HotkeyListener {
        let engine = self.clone();
        HotkeyListener::start(move || {
            if let Err(e) = engine.toggle_recording() {
                tracing::warn!("hotkey toggle failed: {}", e);
                engine.notifier.status(format!("recording failed: {}", e));
            }
        })
    }

    // === Macros ===

    pub fn list_macros(&self) -> Result<Vec<MacroSummary>> {
        self.store.list()
    }

    pub fn read_macro(&self, locator: &str) -> Result<Macro> {
        self.store.read(locator)
    }

    /// Replay a stored macro off-thread. Failures are reported once on
    /// the notification channel, never raised here.
    pub fn play(&self, locator: &str) -> PlaybackHandle {
        spawn_playback(
            self.store.clone(),
            self.notifier.clone(),
            self.activity.clone(),
            self.playback_options.clone(),
            locator.to_string(),
        )
    }

    /// Delete a macro and cascade away every schedule entry naming it.
    pub fn delete_macro(&self, locator: &str) -> Result<bool> {
        let name = self.store.read(locator).ok().map(|m| m.name);
        let removed = self.store.delete(locator)?;
        if removed {
            let dropped = match &name {
                Some(name) => self.book.remove_for_macro(name)?,
                // Unreadable artifact: the display name is gone, but
                // entry names still identify it through the same
                // sanitization that produced the file name.
                None => {
                    let stem = locator.trim_end_matches(".json");
                    self.book
                        .remove_if(|e| crate::storage::sanitize(&e.macro_name) == stem)?
                }
            };
            if dropped > 0 {
                tracing::info!(
                    "macro {} deleted, {} schedule entries cascaded",
                    locator,
                    dropped
                );
            }
            let scheduler = self.scheduler.lock();
            if scheduler.is_running() {
                scheduler.rebuild();
            }
            self.notifier.send(Notification::ListChanged);
        }
        Ok(removed)
    }

    // === Schedules ===

    pub fn list_schedules(&self) -> Vec<ScheduleEntry> {
        self.book.entries()
    }

    pub fn add_schedule(&self, macro_name: impl Into<String>, time: &str) -> Result<ScheduleEntry> {
        let entry = self.book.add(macro_name, time)?;
        let scheduler = self.scheduler.lock();
        if scheduler.is_running() {
            scheduler.rebuild();
        }
        self.notifier.send(Notification::ListChanged);
        Ok(entry)
    }

    pub fn delete_schedule(&self, id: &str) -> Result<bool> {
        let removed = self.book.remove(id)?;
        if removed {
            let scheduler = self.scheduler.lock();
            if scheduler.is_running() {
                scheduler.rebuild();
            }
            self.notifier.send(Notification::ListChanged);
        }
        Ok(removed)
    }

    pub fn start_scheduler(&self) {
        self.scheduler.lock().start();
    }

    pub fn stop_scheduler(&self) {
        self.scheduler.lock().stop();
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler.lock().is_running()
    }
}

/// One independent playback invocation on its own thread.
fn spawn_playback(
    store: Arc<dyn MacroStore>,
    notifier: Notifier,
    activity: Arc<ActivityLog>,
    options: PlaybackOptions,
    locator: String,
) -> PlaybackHandle {
    let alive = Arc::new(AtomicBool::new(true));
    let flag = alive.clone();

    thread::spawn(move || {
        let artifact = match store.read(&locator) {
            Ok(artifact) => artifact,
            Err(e) => {
                // Whole-playback abort: one terminal notification.
                let fatal = crate::error::CoreError::FatalPlayback(e.to_string());
                activity.record(&format!("'{}': {}", locator, fatal));
                notifier.send(Notification::PlaybackFailed {
                    name: locator,
                    reason: fatal.to_string(),
                });
                return;
            }
        };

        let injector = Box::new(TieredInjector::with_default_tiers());
        let mut playback = Playback::new(injector, notifier.clone(), activity.clone(), options);
        let report = playback.run(&artifact.name, &artifact.events, &flag);

        if let Some(reason) = report.fatal {
            let fatal = crate::error::CoreError::FatalPlayback(reason);
            activity.record(&format!("'{}': {}", artifact.name, fatal));
            notifier.send(Notification::PlaybackFailed {
                name: artifact.name,
                reason: fatal.to_string(),
            });
        } else if report.completed {
            tracing::info!(
                "playback '{}' finished: {} dispatched, {} failures",
                artifact.name,
                report.dispatched,
                report.failures
            );
            notifier.send(Notification::PlaybackFinished {
                name: artifact.name,
            });
        } else {
            notifier.status(format!("'{}' stopped", artifact.name));
        }
    });

    PlaybackHandle { alive }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BackendTag, Event, EventData};
    use crate::notify::Notification;
    use std::time::Duration;

    fn engine() -> (tempfile::TempDir, Arc<MacroEngine>, Receiver<Notification>) {
        let dir = tempfile::tempdir().unwrap();
        let (engine, rx) = MacroEngine::new(EngineConfig {
            base_dir: dir.path().to_path_buf(),
            playback: PlaybackOptions::default(),
        })
        .unwrap();
        (dir, engine, rx)
    }

    fn seed_macro(engine: &MacroEngine, name: &str) -> String {
        let artifact = Macro::new(
            name,
            vec![Event::new(0.0, EventData::KeyDown { key: "a".into() })],
            BackendTag::Polling,
        );
        engine.store.write(&artifact).unwrap()
    }

    #[test]
    fn delete_macro_cascades_only_matching_entries() {
        let (_dir, engine, _rx) = engine();
        let locator = seed_macro(&engine, "doomed");
        seed_macro(&engine, "kept");

        engine.add_schedule("doomed", "09:00").unwrap();
        engine.add_schedule("doomed", "18:00").unwrap();
        engine.add_schedule("kept", "09:00").unwrap();

        assert!(engine.delete_macro(&locator).unwrap());

        let remaining = engine.list_schedules();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].macro_name, "kept");
        assert_eq!(engine.list_macros().unwrap().len(), 1);
    }

    #[test]
    fn cascade_survives_unreadable_artifact() {
        let (dir, engine, _rx) = engine();
        let locator = seed_macro(&engine, "login flow");
        engine.add_schedule("login flow", "09:00").unwrap();
        engine.add_schedule("kept", "09:00").unwrap();

        // Corrupt the artifact so its display name can no longer be read.
        std::fs::write(dir.path().join("macros").join(&locator), "{not json").unwrap();

        assert!(engine.delete_macro(&locator).unwrap());
        let remaining = engine.list_schedules();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].macro_name, "kept");
    }

    #[test]
    fn scheduler_start_stop_are_idempotent() {
        let (_dir, engine, _rx) = engine();
        assert!(!engine.is_scheduler_running());
        engine.start_scheduler();
        engine.start_scheduler();
        assert!(engine.is_scheduler_running());
        engine.stop_scheduler();
        engine.stop_scheduler();
        assert!(!engine.is_scheduler_running());
    }

    #[test]
    fn unreadable_artifact_reports_single_failure() {
        let (_dir, engine, rx) = engine();
        let _handle = engine.play("missing.json");

        let mut failures = 0;
        while let Ok(n) = rx.recv_timeout(Duration::from_millis(500)) {
            if let Notification::PlaybackFailed { name, .. } = n {
                assert_eq!(name, "missing.json");
                failures += 1;
                break;
            }
        }
        assert_eq!(failures, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn bad_schedule_time_rejected_without_mutation() {
        let (_dir, engine, _rx) = engine();
        seed_macro(&engine, "m");
        assert!(engine.add_schedule("m", "9 am").is_err());
        assert!(engine.list_schedules().is_empty());
    }
}
