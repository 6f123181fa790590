//! Polling capture via device_query
//!
//! Last-resort variant. Samples pointer position, button state and the
//! pressed-key set on a fixed ~10ms tick and synthesizes transitions by
//! diffing against the previous sample. A pointer that returns to the
//! same coordinates within one tick is indistinguishable from stillness;
//! that is an accepted resolution limit of this variant.

use super::{CaptureBackend, EventSink, STOP_JOIN_WAIT};
use crate::error::Result;
use crate::events::{BackendTag, Button, EventData};
use crate::keys;
use device_query::{DeviceQuery, DeviceState, Keycode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(10);

/// device_query fills `button_pressed` from index 1, in the platform's
/// own slot order: X11 puts middle in slot 2 and right in slot 3, the
/// Windows backend the other way around.
#[cfg(target_os = "linux")]
const BUTTON_SLOTS: [Button; 3] = [Button::Left, Button::Middle, Button::Right];
#[cfg(not(target_os = "linux"))]
const BUTTON_SLOTS: [Button; 3] = [Button::Left, Button::Right, Button::Middle];

pub struct PollingBackend {
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PollingBackend {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl Default for PollingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for PollingBackend {
    fn tag(&self) -> BackendTag {
        BackendTag::Polling
    }

    fn start(&mut self, sink: EventSink) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<bool>(1);

        self.worker = Some(thread::spawn(move || {
            // DeviceState stays on its own thread; construction aborts
            // when no input device/display is reachable.
            let Ok(state) = std::panic::catch_unwind(DeviceState::new) else {
                let _ = ready_tx.send(false);
                return;
            };
            let _ = ready_tx.send(true);

            let mouse = state.get_mouse();
            let mut last_pos = mouse.coords;
            let mut last_buttons = [false; 3];
            let mut last_keys: Vec<Keycode> = state.get_keys();

            while running.load(Ordering::Relaxed) {
                let mouse = state.get_mouse();
                let (x, y) = mouse.coords;

                // Motion only when the sampled position actually changed.
                if (x, y) != last_pos {
                    last_pos = (x, y);
                    sink.push(EventData::MouseMove { x, y });
                }

                let buttons = [
                    mouse.button_pressed.get(1).copied().unwrap_or(false),
                    mouse.button_pressed.get(2).copied().unwrap_or(false),
                    mouse.button_pressed.get(3).copied().unwrap_or(false),
                ];
                for (i, button) in BUTTON_SLOTS.into_iter().enumerate() {
                    if buttons[i] != last_buttons[i] {
                        last_buttons[i] = buttons[i];
                        let data = if buttons[i] {
                            EventData::MouseDown { x, y, button }
                        } else {
                            EventData::MouseUp { x, y, button }
                        };
                        sink.push(data);
                    }
                }

                let now_keys = state.get_keys();
                for key in &now_keys {
                    if !last_keys.contains(key) {
                        if let Some(key) = keys::canonical_from_poll(*key) {
                            sink.push(EventData::KeyDown { key });
                        }
                    }
                }
                for key in &last_keys {
                    if !now_keys.contains(key) {
                        if let Some(key) = keys::canonical_from_poll(*key) {
                            sink.push(EventData::KeyUp { key });
                        }
                    }
                }
                last_keys = now_keys;

                thread::sleep(TICK);
            }
        }));

        match ready_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(true) => Ok(()),
            _ => {
                self.running.store(false, Ordering::SeqCst);
                if let Some(worker) = self.worker.take() {
                    let _ = worker.join();
                }
                Err(crate::error::CoreError::BackendUnavailable(
                    "input state sampling unavailable".into(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + STOP_JOIN_WAIT;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if worker.is_finished() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The slot order is the platform's, not a universal one; pin the
    // table so the canonical Button enum stays platform-independent.
    #[test]
    fn button_slots_cover_all_buttons_in_platform_order() {
        assert_eq!(BUTTON_SLOTS[0], Button::Left);
        #[cfg(target_os = "linux")]
        {
            assert_eq!(BUTTON_SLOTS[1], Button::Middle);
            assert_eq!(BUTTON_SLOTS[2], Button::Right);
        }
        #[cfg(not(target_os = "linux"))]
        {
            assert_eq!(BUTTON_SLOTS[1], Button::Right);
            assert_eq!(BUTTON_SLOTS[2], Button::Middle);
        }
    }
}
