//! Out-of-band recording toggle
//!
//! An always-on polling listener on the reserved toggle key, independent
//! of any presentation layer. The recorder filters this key out of
//! captured buffers so the toggle never appears in an artifact.

use device_query::{DeviceQuery, DeviceState, Keycode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Canonical name of the reserved toggle key.
pub const RESERVED_TOGGLE_KEY: &str = "f8";

const POLL: Duration = Duration::from_millis(50);

pub struct HotkeyListener {
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl HotkeyListener {
    /// Start watching for the toggle key. `on_toggle` runs on the
    /// listener thread on each press edge (not on release, not on
    /// auto-repeat).
    pub fn start(on_toggle: impl Fn() + Send + 'static) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let worker = thread::spawn(move || {
            let Ok(state) = std::panic::catch_unwind(DeviceState::new) else {
                tracing::warn!("hotkey listener unavailable: input sampling failed");
                return;
            };
            let mut was_down = false;
            while flag.load(Ordering::Relaxed) {
                let down = state.get_keys().contains(&Keycode::F8);
                if down && !was_down {
                    tracing::debug!("recording toggle hotkey pressed");
                    on_toggle();
                }
                was_down = down;
                thread::sleep(POLL);
            }
        });

        Self {
            running,
            worker: Some(worker),
        }
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
