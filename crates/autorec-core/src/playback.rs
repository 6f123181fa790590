//! Playback engine
//!
//! Replays a sorted event timeline with faithful real-time pacing - no
//! compression, no speed multiplier. Keyboard state is kept idempotent
//! through a pressed-key set, and a wall-clock debounce floor spaces
//! keyboard dispatches regardless of the recorded timing. Single-event
//! injection failures are logged and skipped; the loop always finishes by
//! force-releasing whatever is still held down.

use crate::activity::ActivityLog;
use crate::error::CoreError;
use crate::events::{Event, EventData};
use crate::inject::Injector;
use crate::keys;
use crate::notify::{Notification, Notifier};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Gaps below this floor are not slept on.
    pub min_wait: Duration,
    /// Minimum wall-clock spacing between keyboard dispatches. Pointer
    /// events are exempt.
    pub keyboard_gap: Duration,
    /// Emit a progress notification every N events.
    pub progress_every: usize,
    /// Recorded waits longer than this get a status notice.
    pub long_wait_notice: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            min_wait: Duration::from_millis(10),
            keyboard_gap: Duration::from_millis(50),
            progress_every: 10,
            long_wait_notice: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PlaybackReport {
    pub dispatched: usize,
    pub failures: usize,
    /// False when the liveness flag stopped the loop early or the
    /// timeline turned out to be unplayable.
    pub completed: bool,
    /// Set when the run stopped on a gap no sleep can represent. The
    /// whole playback aborts at the offending event.
    pub fatal: Option<String>,
}

pub struct Playback {
    injector: Box<dyn Injector>,
    notifier: Notifier,
    activity: Arc<ActivityLog>,
    options: PlaybackOptions,
}

impl Playback {
    pub fn new(
        injector: Box<dyn Injector>,
        notifier: Notifier,
        activity: Arc<ActivityLog>,
        options: PlaybackOptions,
    ) -> Self {
        Self {
            injector,
            notifier,
            activity,
            options,
        }
    }

    /// Run one playback session. `alive` is polled once per event; a
    /// mid-wait sleep runs to completion before the flag is observed.
    pub fn run(&mut self, name: &str, events: &[Event], alive: &AtomicBool) -> PlaybackReport {
        let mut events = events.to_vec();
        crate::events::sort_events(&mut events);

        let mut report = PlaybackReport {
            completed: true,
            ..Default::default()
        };
        let total = events.len();
        if total == 0 {
            return report;
        }

        let mut pressed: HashSet<String> = HashSet::new();
        // The first event's own offset is the baseline, never slept on.
        let mut prev_time = events[0].time;
        let mut last_keyboard: Option<Instant> = None;

        for (i, event) in events.iter().enumerate() {
            if !alive.load(Ordering::Relaxed) {
                report.completed = false;
                break;
            }

            let gap = event.time - prev_time;
            prev_time = event.time;
            if gap > 0.0 {
                // `time` is an unbounded float on the wire; a gap beyond
                // what a sleep can hold makes the whole timeline unplayable.
                let Ok(wait) = Duration::try_from_secs_f64(gap) else {
                    report.completed = false;
                    report.fatal =
                        Some(format!("gap of {}s before event {} is not replayable", gap, i));
                    break;
                };
                if wait >= self.options.long_wait_notice {
                    self.notifier
                        .status(format!("'{}': waiting {:.1}s", name, gap));
                }
                if wait > self.options.min_wait {
                    thread::sleep(wait);
                }
            }

            match self.dispatch(event, &mut pressed, &mut last_keyboard) {
                Ok(did_dispatch) => {
                    if did_dispatch {
                        report.dispatched += 1;
                    }
                }
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!("'{}' event {}: {}", name, i, e);
                    self.activity
                        .record(&format!("playback '{}' event {}: {}", name, i, e));
                }
            }

            if (i + 1) % self.options.progress_every == 0 || i + 1 == total {
                let percent = ((i + 1) * 100 / total) as u8;
                self.notifier.send(Notification::Progress {
                    name: name.to_string(),
                    percent,
                });
            }
        }

        self.release_all(&mut pressed);
        report
    }

    /// Returns whether anything was actually injected (a deduplicated
    /// key press or an unmatched release dispatches nothing).
    fn dispatch(
        &mut self,
        event: &Event,
        pressed: &mut HashSet<String>,
        last_keyboard: &mut Option<Instant>,
    ) -> Result<bool, CoreError> {
        match &event.data {
            EventData::MouseMove { x, y } => {
                self.injector.mouse_move(*x, *y)?;
                Ok(true)
            }
            EventData::MouseDown { x, y, button } => {
                self.injector.button(*button, true, *x, *y)?;
                Ok(true)
            }
            EventData::MouseUp { x, y, button } => {
                self.injector.button(*button, false, *x, *y)?;
                Ok(true)
            }
            EventData::KeyDown { key } => {
                let key = keys::canonical(key);
                if key == keys::LAYOUT_TOGGLE {
                    self.debounce(last_keyboard);
                    self.injector.layout_toggle()?;
                    return Ok(true);
                }
                // Idempotent press: a key already held is not pressed again.
                if pressed.contains(&key) {
                    return Ok(false);
                }
                self.debounce(last_keyboard);
                self.injector.key(&key, true)?;
                pressed.insert(key);
                Ok(true)
            }
            EventData::KeyUp { key } => {
                let key = keys::canonical(key);
                // The toggle completes on its own press path.
                if key == keys::LAYOUT_TOGGLE {
                    return Ok(false);
                }
                if !pressed.contains(&key) {
                    return Ok(false);
                }
                self.debounce(last_keyboard);
                self.injector.key(&key, false)?;
                pressed.remove(&key);
                Ok(true)
            }
        }
    }

    fn debounce(&self, last_keyboard: &mut Option<Instant>) {
        if let Some(last) = *last_keyboard {
            let elapsed = last.elapsed();
            if elapsed < self.options.keyboard_gap {
                thread::sleep(self.options.keyboard_gap - elapsed);
            }
        }
        *last_keyboard = Some(Instant::now());
    }

    /// Stuck-key safety net: runs on every termination path.
    fn release_all(&mut self, pressed: &mut HashSet<String>) {
        for key in pressed.drain() {
            if let Err(e) = self.injector.key(&key, false) {
                tracing::warn!("failed to release '{}': {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Button;
    use crate::inject::Injector;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Move(i32, i32),
        Button(Button, bool),
        Key(String, bool),
        Toggle,
    }

    /// No-op recording injector: captures every call with its wall-clock
    /// arrival time.
    #[derive(Clone, Default)]
    struct Recording {
        calls: Arc<Mutex<Vec<(Call, Instant)>>>,
        fail_on: Option<usize>,
        seen: Arc<Mutex<usize>>,
    }

    impl Recording {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().iter().map(|(c, _)| c.clone()).collect()
        }

        fn record(&mut self, call: Call) -> crate::error::Result<()> {
            let n = {
                let mut seen = self.seen.lock();
                *seen += 1;
                *seen
            };
            if self.fail_on == Some(n) {
                return Err(CoreError::Dispatch {
                    tier: "recording",
                    message: "forced failure".into(),
                });
            }
            self.calls.lock().push((call, Instant::now()));
            Ok(())
        }
    }

    impl Injector for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        fn mouse_move(&mut self, x: i32, y: i32) -> crate::error::Result<()> {
            self.record(Call::Move(x, y))
        }
        fn button(&mut self, b: Button, down: bool, _x: i32, _y: i32) -> crate::error::Result<()> {
            self.record(Call::Button(b, down))
        }
        fn key(&mut self, key: &str, down: bool) -> crate::error::Result<()> {
            self.record(Call::Key(key.to_string(), down))
        }
        fn layout_toggle(&mut self) -> crate::error::Result<()> {
            self.record(Call::Toggle)
        }
    }

    fn playback(injector: Recording, options: PlaybackOptions) -> Playback {
        Playback::new(
            Box::new(injector),
            Notifier::disabled(),
            Arc::new(ActivityLog::disabled()),
            options,
        )
    }

    fn fast_options() -> PlaybackOptions {
        PlaybackOptions {
            keyboard_gap: Duration::ZERO,
            ..Default::default()
        }
    }

    fn alive() -> AtomicBool {
        AtomicBool::new(true)
    }

    #[test]
    fn reproduces_order_and_relative_deltas() {
        let injector = Recording::default();
        let calls = injector.calls.clone();
        let mut pb = playback(injector, fast_options());

        let events = vec![
            Event::new(0.0, EventData::MouseMove { x: 1, y: 1 }),
            Event::new(0.06, EventData::KeyDown { key: "a".into() }),
            Event::new(0.12, EventData::KeyUp { key: "a".into() }),
        ];
        let started = Instant::now();
        let report = pb.run("t", &events, &alive());
        let total = started.elapsed();

        assert!(report.completed);
        assert_eq!(report.failures, 0);
        let recorded = calls.lock();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].0, Call::Move(1, 1));
        assert_eq!(recorded[1].0, Call::Key("a".into(), true));
        assert_eq!(recorded[2].0, Call::Key("a".into(), false));

        // Two 60ms gaps; the first event's own offset is never slept on.
        let d1 = recorded[1].1 - recorded[0].1;
        let d2 = recorded[2].1 - recorded[1].1;
        assert!(d1 >= Duration::from_millis(55), "d1 was {:?}", d1);
        assert!(d2 >= Duration::from_millis(55), "d2 was {:?}", d2);
        assert!(total < Duration::from_millis(400), "total was {:?}", total);
    }

    #[test]
    fn sub_threshold_gaps_are_not_slept_on() {
        let injector = Recording::default();
        let mut pb = playback(injector.clone(), fast_options());

        let events = vec![
            Event::new(0.0, EventData::MouseMove { x: 100, y: 100 }),
            Event::new(0.005, EventData::MouseMove { x: 101, y: 100 }),
        ];
        let started = Instant::now();
        pb.run("t", &events, &alive());

        // No coalescing: both placements dispatched, and quickly.
        assert_eq!(
            injector.calls(),
            vec![Call::Move(100, 100), Call::Move(101, 100)]
        );
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn repeated_key_down_presses_once() {
        let injector = Recording::default();
        let mut pb = playback(injector.clone(), fast_options());

        let events = vec![
            Event::new(0.0, EventData::KeyDown { key: "a".into() }),
            Event::new(0.001, EventData::KeyDown { key: "a".into() }),
            Event::new(0.002, EventData::KeyUp { key: "a".into() }),
        ];
        let report = pb.run("t", &events, &alive());

        assert_eq!(
            injector.calls(),
            vec![Call::Key("a".into(), true), Call::Key("a".into(), false)]
        );
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.failures, 0);
    }

    #[test]
    fn key_up_without_press_is_skipped() {
        let injector = Recording::default();
        let mut pb = playback(injector.clone(), fast_options());

        let events = vec![Event::new(0.0, EventData::KeyUp { key: "x".into() })];
        let report = pb.run("t", &events, &alive());
        assert!(injector.calls().is_empty());
        assert_eq!(report.dispatched, 0);
    }

    #[test]
    fn dispatch_failure_continues_to_completion() {
        let mut injector = Recording::default();
        injector.fail_on = Some(3);
        let mut pb = playback(injector.clone(), fast_options());

        let events: Vec<Event> = (0..10)
            .map(|i| {
                Event::new(
                    i as f64 * 0.001,
                    EventData::MouseMove {
                        x: i as i32,
                        y: 0,
                    },
                )
            })
            .collect();
        let report = pb.run("t", &events, &alive());

        assert!(report.completed);
        assert_eq!(report.failures, 1);
        assert_eq!(report.dispatched, 9);
        assert_eq!(injector.calls().len(), 9);
    }

    #[test]
    fn liveness_flag_stops_loop_and_releases_keys() {
        let injector = Recording::default();
        let mut pb = playback(injector.clone(), fast_options());

        let events = vec![
            Event::new(0.0, EventData::KeyDown { key: "a".into() }),
            Event::new(0.02, EventData::KeyDown { key: "b".into() }),
            // The flag flips during this event's wait; the wait runs to
            // completion and the event still dispatches.
            Event::new(0.3, EventData::MouseMove { x: 1, y: 1 }),
            // The next iteration observes the flag and never dispatches.
            Event::new(0.4, EventData::MouseMove { x: 5, y: 5 }),
        ];
        let flag = AtomicBool::new(true);
        let report = thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(80));
                flag.store(false, Ordering::SeqCst);
            });
            pb.run("t", &events, &flag)
        });

        assert!(!report.completed);
        let calls = injector.calls();
        assert!(calls.contains(&Call::Move(1, 1)));
        assert!(!calls.contains(&Call::Move(5, 5)));
        // Both presses happened and both keys were force-released.
        assert!(calls.contains(&Call::Key("a".into(), true)));
        assert!(calls.contains(&Call::Key("b".into(), true)));
        assert!(calls.contains(&Call::Key("a".into(), false)));
        assert!(calls.contains(&Call::Key("b".into(), false)));
    }

    #[test]
    fn unrepresentable_gap_aborts_and_releases_keys() {
        let injector = Recording::default();
        let mut pb = playback(injector.clone(), fast_options());

        let events = vec![
            Event::new(0.0, EventData::KeyDown { key: "a".into() }),
            // Wire times are unbounded floats; this gap fits no sleep.
            Event::new(1.0e30, EventData::MouseMove { x: 1, y: 1 }),
        ];
        let started = Instant::now();
        let report = pb.run("t", &events, &alive());

        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(!report.completed);
        assert!(report.fatal.is_some());
        let calls = injector.calls();
        assert!(!calls.contains(&Call::Move(1, 1)));
        // The held key is still force-released on the abort path.
        assert!(calls.contains(&Call::Key("a".into(), true)));
        assert!(calls.contains(&Call::Key("a".into(), false)));
    }

    #[test]
    fn layout_toggle_uses_composite_path() {
        let injector = Recording::default();
        let mut pb = playback(injector.clone(), fast_options());

        let events = vec![
            Event::new(0.0, EventData::KeyDown { key: "hangul".into() }),
            Event::new(0.001, EventData::KeyUp { key: "hangul".into() }),
        ];
        let report = pb.run("t", &events, &alive());
        assert_eq!(injector.calls(), vec![Call::Toggle]);
        assert_eq!(report.dispatched, 1);
    }

    #[test]
    fn keyboard_debounce_spaces_key_events_only() {
        let injector = Recording::default();
        let calls = injector.calls.clone();
        let mut pb = playback(
            injector,
            PlaybackOptions {
                keyboard_gap: Duration::from_millis(40),
                ..Default::default()
            },
        );

        let events = vec![
            Event::new(0.0, EventData::KeyDown { key: "a".into() }),
            Event::new(0.001, EventData::KeyUp { key: "a".into() }),
        ];
        pb.run("t", &events, &alive());

        let recorded = calls.lock();
        let gap = recorded[1].1 - recorded[0].1;
        assert!(gap >= Duration::from_millis(35), "gap was {:?}", gap);
    }

    #[test]
    fn unsorted_input_is_resorted_defensively() {
        let injector = Recording::default();
        let mut pb = playback(injector.clone(), fast_options());

        let events = vec![
            Event::new(0.02, EventData::MouseMove { x: 2, y: 0 }),
            Event::new(0.0, EventData::MouseMove { x: 1, y: 0 }),
        ];
        pb.run("t", &events, &alive());
        assert_eq!(injector.calls(), vec![Call::Move(1, 0), Call::Move(2, 0)]);
    }
}
