//! Daily-trigger scheduler
//!
//! Entries reference macros weakly by display name and are persisted as a
//! single JSON document (temp write + backup + atomic rename). A coarse
//! 1s tick loop fires due timers; each firing spawns an independent
//! playback invocation so overlapping firings never block each other.

use crate::error::{CoreError, Result};
use crate::notify::{Notification, Notifier};
use crate::storage::MacroStore;
use chrono::{Local, NaiveDate, NaiveTime};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);
const STOP_JOIN_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub id: String,
    /// Weak reference: looked up by name at rebuild time, never a pointer
    /// into the macro store.
    #[serde(rename = "macro")]
    pub macro_name: String,
    /// "HH:MM", validated on entry.
    pub time: String,
    pub created: String,
}

/// Parse and validate an "HH:MM" wall-clock time.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let invalid = || CoreError::Config(format!("invalid time '{}', expected HH:MM", s));
    let (h, m) = s.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// The persisted schedule collection, all access under one lock.
pub struct ScheduleBook {
    path: PathBuf,
    entries: RwLock<Vec<ScheduleEntry>>,
}

impl ScheduleBook {
    /// Load from disk; unreadable or missing data falls back to an empty
    /// collection rather than an error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("schedule list unreadable, starting empty: {}", e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn entries(&self) -> Vec<ScheduleEntry> {
        self.entries.read().clone()
    }

    /// Validate, append, persist. Returns the new entry.
    pub fn add(&self, macro_name: impl Into<String>, time: &str) -> Result<ScheduleEntry> {
        parse_time_of_day(time)?;
        let entry = ScheduleEntry {
            id: uuid::Uuid::new_v4().to_string(),
            macro_name: macro_name.into(),
            time: time.to_string(),
            created: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let mut entries = self.entries.write();
        entries.push(entry.clone());
        self.save(&entries)?;
        Ok(entry)
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            self.save(&entries)?;
        }
        Ok(removed)
    }

    /// Cascade for macro deletion: drop every entry naming the macro.
    pub fn remove_for_macro(&self, macro_name: &str) -> Result<usize> {
        self.remove_if(|e| e.macro_name == macro_name)
    }

    /// Remove every entry matching the predicate. Returns how many went.
    pub fn remove_if(&self, pred: impl Fn(&ScheduleEntry) -> bool) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !pred(e));
        let removed = before - entries.len();
        if removed > 0 {
            self.save(&entries)?;
        }
        Ok(removed)
    }

    /// Temp write, best-effort backup of the previous version, atomic
    /// rename over the target.
    fn save(&self, entries: &[ScheduleEntry]) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        if self.path.exists() {
            let _ = fs::copy(&self.path, self.path.with_extension("json.bak"));
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// One armed timer, rebuilt from the entry collection.
#[derive(Debug, Clone)]
struct TimerSlot {
    entry_id: String,
    locator: String,
    at: NaiveTime,
    fired_on: Option<NaiveDate>,
}

/// Resolve entries against the store and arm a slot per entry. An entry
/// whose macro no longer exists is skipped with a warning, never an
/// error. Times already past today are considered fired so a fresh start
/// does not replay the morning.
fn build_slots(
    entries: &[ScheduleEntry],
    resolve: impl Fn(&str) -> Option<String>,
    today: NaiveDate,
    now: NaiveTime,
) -> Vec<TimerSlot> {
    let mut slots = Vec::new();
    for entry in entries {
        let at = match parse_time_of_day(&entry.time) {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!("schedule {} skipped: {}", entry.id, e);
                continue;
            }
        };
        let Some(locator) = resolve(&entry.macro_name) else {
            tracing::warn!(
                "schedule {} skipped: macro '{}' not found",
                entry.id,
                entry.macro_name
            );
            continue;
        };
        slots.push(TimerSlot {
            entry_id: entry.id.clone(),
            locator,
            at,
            fired_on: if at <= now { Some(today) } else { None },
        });
    }
    slots
}

/// Mark and collect every slot due at `now`. At most one firing per slot
/// per calendar day.
fn collect_due(slots: &mut [TimerSlot], today: NaiveDate, now: NaiveTime) -> Vec<(String, String)> {
    let mut due = Vec::new();
    for slot in slots.iter_mut() {
        if now >= slot.at && slot.fired_on != Some(today) {
            slot.fired_on = Some(today);
            due.push((slot.entry_id.clone(), slot.locator.clone()));
        }
    }
    due
}

/// Spawns one playback invocation per firing. The engine wires this to
/// its off-thread play path.
pub type PlaybackLauncher = Arc<dyn Fn(&str) + Send + Sync>;

pub struct Scheduler {
    book: Arc<ScheduleBook>,
    store: Arc<dyn MacroStore>,
    notifier: Notifier,
    launcher: PlaybackLauncher,
    running: Arc<AtomicBool>,
    slots: Arc<Mutex<Vec<TimerSlot>>>,
    tick_thread: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        book: Arc<ScheduleBook>,
        store: Arc<dyn MacroStore>,
        notifier: Notifier,
        launcher: PlaybackLauncher,
    ) -> Self {
        Self {
            book,
            store,
            notifier,
            launcher,
            running: Arc::new(AtomicBool::new(false)),
            slots: Arc::new(Mutex::new(Vec::new())),
            tick_thread: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Arm timers from the current entries and start the tick loop.
    /// No-op while already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.rebuild();

        let running = self.running.clone();
        let slots = self.slots.clone();
        let launcher = self.launcher.clone();
        let notifier = self.notifier.clone();

        self.tick_thread = Some(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let now = Local::now();
                let due = collect_due(&mut slots.lock(), now.date_naive(), now.time());
                for (entry_id, locator) in due {
                    tracing::info!("schedule {} fires -> {}", entry_id, locator);
                    // Each firing is independent and non-blocking.
                    (launcher)(&locator);
                }
                thread::sleep(TICK);
            }
        }));
        self.notifier.status("scheduler started");
    }

    /// Clear all timers and wait (bounded) for the tick loop to exit.
    /// No-op while already stopped.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.slots.lock().clear();
        if let Some(handle) = self.tick_thread.take() {
            let deadline = Instant::now() + STOP_JOIN_WAIT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(20));
            }
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        self.notifier.status("scheduler stopped");
    }

    /// Full clear-and-rearm from the entry collection. Called on start
    /// and after any add/delete; entry counts are small, so a complete
    /// rebuild off the tick thread is fine.
    pub fn rebuild(&self) {
        let entries = self.book.entries();
        let by_name: Vec<(String, String)> = match self.store.list() {
            Ok(list) => list.into_iter().map(|s| (s.name, s.locator)).collect(),
            Err(e) => {
                tracing::warn!("rebuild could not list macros: {}", e);
                Vec::new()
            }
        };
        let now = Local::now();
        let slots = build_slots(
            &entries,
            |name| {
                by_name
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, locator)| locator.clone())
            },
            now.date_naive(),
            now.time(),
        );
        *self.slots.lock() = slots;
        self.notifier.send(Notification::ListChanged);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, time: &str) -> ScheduleEntry {
        ScheduleEntry {
            id: id.into(),
            macro_name: name.into(),
            time: time.into(),
            created: "2026-01-01 00:00:00".into(),
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
    }

    #[test]
    fn time_parsing_rejects_garbage() {
        assert!(parse_time_of_day("09:00").is_ok());
        assert!(parse_time_of_day("23:59").is_ok());
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("09:60").is_err());
        assert!(parse_time_of_day("0900").is_err());
        assert!(parse_time_of_day("soon").is_err());
    }

    #[test]
    fn same_time_entries_arm_independent_timers() {
        let entries = vec![entry("1", "a", "09:00"), entry("2", "b", "09:00")];
        let mut slots = build_slots(&entries, |n| Some(format!("{}.json", n)), day(), t(8, 0));
        assert_eq!(slots.len(), 2);

        let due = collect_due(&mut slots, day(), t(9, 0));
        assert_eq!(due.len(), 2);
        // Both armed again only the next day.
        assert!(collect_due(&mut slots, day(), t(9, 1)).is_empty());
        let next_day = day().succ_opt().unwrap();
        assert_eq!(collect_due(&mut slots, next_day, t(9, 0)).len(), 2);
    }

    #[test]
    fn unresolvable_macro_is_skipped_not_fatal() {
        let entries = vec![entry("1", "ghost", "09:00"), entry("2", "real", "10:00")];
        let slots = build_slots(
            &entries,
            |n| (n == "real").then(|| "real.json".to_string()),
            day(),
            t(0, 0),
        );
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].entry_id, "2");
    }

    #[test]
    fn times_already_past_do_not_fire_on_startup() {
        let entries = vec![entry("1", "a", "09:00")];
        let mut slots = build_slots(&entries, |_| Some("a.json".into()), day(), t(12, 0));
        assert!(collect_due(&mut slots, day(), t(12, 0)).is_empty());
        let next_day = day().succ_opt().unwrap();
        assert_eq!(collect_due(&mut slots, next_day, t(9, 0)).len(), 1);
    }

    #[test]
    fn book_add_validates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules.json");
        let book = ScheduleBook::load(&path);

        assert!(matches!(
            book.add("m", "25:00"),
            Err(CoreError::Config(_))
        ));
        assert!(book.entries().is_empty());

        let added = book.add("m", "09:30").unwrap();
        assert!(path.exists());

        // Reload sees the same entry.
        let reread = ScheduleBook::load(&path);
        assert_eq!(reread.entries(), vec![added]);
    }

    #[test]
    fn save_keeps_a_backup_of_the_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules.json");
        let book = ScheduleBook::load(&path);
        book.add("m", "09:00").unwrap();
        book.add("m", "10:00").unwrap();

        let bak = path.with_extension("json.bak");
        assert!(bak.exists());
        let previous: Vec<ScheduleEntry> =
            serde_json::from_str(&fs::read_to_string(&bak).unwrap()).unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(book.entries().len(), 2);
    }

    #[test]
    fn corrupt_schedule_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules.json");
        fs::write(&path, "[{broken").unwrap();
        let book = ScheduleBook::load(&path);
        assert!(book.entries().is_empty());
    }

    #[test]
    fn remove_for_macro_cascades_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let book = ScheduleBook::load(dir.path().join("schedules.json"));
        book.add("doomed", "09:00").unwrap();
        book.add("doomed", "10:00").unwrap();
        let keep = book.add("kept", "09:00").unwrap();

        assert_eq!(book.remove_for_macro("doomed").unwrap(), 2);
        assert_eq!(book.entries(), vec![keep]);
    }

    #[test]
    fn scheduler_fires_both_same_time_entries_without_blocking() {
        use std::sync::atomic::AtomicUsize;

        let fired = Arc::new(AtomicUsize::new(0));

        // Drive the due path directly with a launcher that parks, to show
        // one firing cannot block the other.
        let launcher_fired = fired.clone();
        let launcher: PlaybackLauncher = Arc::new(move |_locator| {
            let fired = launcher_fired.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(200));
                fired.fetch_add(1, Ordering::SeqCst);
            });
        });

        let entries = vec![entry("1", "a", "09:00"), entry("2", "b", "09:00")];
        let mut slots = build_slots(&entries, |n| Some(format!("{}.json", n)), day(), t(8, 59));
        let started = Instant::now();
        for (_, locator) in collect_due(&mut slots, day(), t(9, 0)) {
            (launcher)(&locator);
        }
        // Launch itself returns immediately even though playbacks run on.
        assert!(started.elapsed() < Duration::from_millis(100));
        thread::sleep(Duration::from_millis(350));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
