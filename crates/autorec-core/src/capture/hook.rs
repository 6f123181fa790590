//! Push-hook capture via rdev
//!
//! rdev delivers every input event through a callback on a dedicated
//! thread. The library has no unregister call, so `stop` relies on the
//! sink gate and a bounded join before detaching the listener.

use super::{CaptureBackend, EventSink, STOP_JOIN_WAIT};
use crate::error::{CoreError, Result};
use crate::events::{BackendTag, EventData};
use crate::keys;
use crossbeam_channel::bounded;
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait for the listener to report an init failure before
/// assuming the hook is live. rdev only returns on error.
const STARTUP_PROBE: Duration = Duration::from_millis(250);

pub struct PushHookBackend {
    worker: Option<thread::JoinHandle<()>>,
}

impl PushHookBackend {
    pub fn new() -> Self {
        Self { worker: None }
    }
}

impl Default for PushHookBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for PushHookBackend {
    fn tag(&self) -> BackendTag {
        BackendTag::PushHook
    }

    fn start(&mut self, sink: EventSink) -> Result<()> {
        let (err_tx, err_rx) = bounded::<String>(1);

        let handle = thread::spawn(move || {
            // Button events carry no coordinates in rdev; the callback
            // tracks the last observed pointer position for them.
            let mut last_pos = (0i32, 0i32);
            let result = rdev::listen(move |event| match event.event_type {
                rdev::EventType::MouseMove { x, y } => {
                    last_pos = (x as i32, y as i32);
                    sink.push(EventData::MouseMove {
                        x: last_pos.0,
                        y: last_pos.1,
                    });
                }
                rdev::EventType::ButtonPress(button) => {
                    if let Some(button) = keys::button_from_rdev(button) {
                        sink.push(EventData::MouseDown {
                            x: last_pos.0,
                            y: last_pos.1,
                            button,
                        });
                    }
                }
                rdev::EventType::ButtonRelease(button) => {
                    if let Some(button) = keys::button_from_rdev(button) {
                        sink.push(EventData::MouseUp {
                            x: last_pos.0,
                            y: last_pos.1,
                            button,
                        });
                    }
                }
                rdev::EventType::KeyPress(key) => {
                    if let Some(key) = keys::canonical_from_rdev(key) {
                        sink.push(EventData::KeyDown { key });
                    }
                }
                rdev::EventType::KeyRelease(key) => {
                    if let Some(key) = keys::canonical_from_rdev(key) {
                        sink.push(EventData::KeyUp { key });
                    }
                }
                rdev::EventType::Wheel { .. } => {}
            });
            if let Err(e) = result {
                let _ = err_tx.try_send(format!("{:?}", e));
            }
        });

        // listen blocks for the lifetime of the hook; an early return is
        // an init failure.
        match err_rx.recv_timeout(STARTUP_PROBE) {
            Ok(reason) => {
                let _ = handle.join();
                Err(CoreError::BackendUnavailable(format!(
                    "rdev listen failed: {}",
                    reason
                )))
            }
            Err(_) => {
                self.worker = Some(handle);
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + STOP_JOIN_WAIT;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        if worker.is_finished() {
            let _ = worker.join();
        } else {
            // The hook thread cannot be unregistered; leave it detached.
            tracing::debug!("push-hook listener detached after stop");
        }
    }
}
