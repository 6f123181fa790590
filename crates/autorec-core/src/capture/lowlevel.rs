//! Low-level push-hook capture (Windows WH_KEYBOARD_LL / WH_MOUSE_LL)
//!
//! Second in the fallback order. Installs both low-level hooks on a
//! dedicated thread running a message pump; `stop` posts WM_QUIT and
//! joins. Elsewhere this variant reports unavailable and selection moves
//! on to polling.

#[cfg(not(target_os = "windows"))]
use super::{CaptureBackend, EventSink};
#[cfg(not(target_os = "windows"))]
use crate::error::Result;
#[cfg(not(target_os = "windows"))]
use crate::events::BackendTag;

#[cfg(not(target_os = "windows"))]
pub struct LowLevelHookBackend;

#[cfg(not(target_os = "windows"))]
impl LowLevelHookBackend {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_os = "windows"))]
impl Default for LowLevelHookBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "windows"))]
impl CaptureBackend for LowLevelHookBackend {
    fn tag(&self) -> BackendTag {
        BackendTag::LowLevelHook
    }

    fn start(&mut self, _sink: EventSink) -> Result<()> {
        Err(crate::error::CoreError::BackendUnavailable(
            "low-level hooks require windows".into(),
        ))
    }

    fn stop(&mut self) {}
}

#[cfg(target_os = "windows")]
pub use imp::LowLevelHookBackend;

#[cfg(target_os = "windows")]
mod imp {
    use super::super::{CaptureBackend, EventSink, STOP_JOIN_WAIT};
    use crate::error::{CoreError, Result};
    use crate::events::{BackendTag, Button, EventData};
    use crate::keys;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
        UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL,
        WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN,
        WM_MBUTTONUP, WM_MOUSEMOVE, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN,
        WM_SYSKEYUP,
    };

    struct HookCtx {
        sink: EventSink,
        last_pos: (i32, i32),
    }

    // Hook procedures have no user pointer; the single active capture
    // session lives here. Recording is single-session by construction.
    static HOOK_CTX: Mutex<Option<HookCtx>> = Mutex::new(None);

    pub struct LowLevelHookBackend {
        worker: Option<thread::JoinHandle<()>>,
        thread_id: u32,
    }

    impl LowLevelHookBackend {
        pub fn new() -> Self {
            Self {
                worker: None,
                thread_id: 0,
            }
        }
    }

    impl Default for LowLevelHookBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CaptureBackend for LowLevelHookBackend {
        fn tag(&self) -> BackendTag {
            BackendTag::LowLevelHook
        }

        fn start(&mut self, sink: EventSink) -> Result<()> {
            *HOOK_CTX.lock() = Some(HookCtx {
                sink,
                last_pos: (0, 0),
            });

            let (ready_tx, ready_rx) = bounded::<std::result::Result<u32, String>>(1);

            let handle = thread::spawn(move || {
                let kbd = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(kbd_proc), None, 0) };
                let mouse = unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), None, 0) };
                let (kbd, mouse) = match (kbd, mouse) {
                    (Ok(k), Ok(m)) => {
                        let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));
                        (k, m)
                    }
                    (k, m) => {
                        let reason = k.err().or(m.err()).map(|e| e.to_string());
                        let _ = ready_tx
                            .send(Err(reason.unwrap_or_else(|| "hook install failed".into())));
                        if let Ok(h) = k {
                            let _ = unsafe { UnhookWindowsHookEx(h) };
                        }
                        if let Ok(h) = m {
                            let _ = unsafe { UnhookWindowsHookEx(h) };
                        }
                        return;
                    }
                };

                let mut msg = MSG::default();
                while unsafe { GetMessageW(&mut msg, None, 0, 0) }.as_bool() {}

                let _ = unsafe { UnhookWindowsHookEx(kbd) };
                let _ = unsafe { UnhookWindowsHookEx(mouse) };
            });

            match ready_rx.recv_timeout(Duration::from_secs(2)) {
                Ok(Ok(thread_id)) => {
                    self.thread_id = thread_id;
                    self.worker = Some(handle);
                    Ok(())
                }
                Ok(Err(reason)) => {
                    let _ = handle.join();
                    *HOOK_CTX.lock() = None;
                    Err(CoreError::BackendUnavailable(reason))
                }
                Err(_) => {
                    *HOOK_CTX.lock() = None;
                    Err(CoreError::BackendUnavailable(
                        "hook thread did not come up".into(),
                    ))
                }
            }
        }

        fn stop(&mut self) {
            let Some(worker) = self.worker.take() else {
                return;
            };
            let _ =
                unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };

            let deadline = Instant::now() + STOP_JOIN_WAIT;
            while !worker.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(20));
            }
            if worker.is_finished() {
                let _ = worker.join();
            }
            *HOOK_CTX.lock() = None;
        }
    }

    unsafe extern "system" fn kbd_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code >= 0 {
            let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            if let Some(key) = keys::canonical_from_vk(info.vkCode as u16) {
                if let Some(ctx) = HOOK_CTX.lock().as_ref() {
                    match wparam.0 as u32 {
                        WM_KEYDOWN | WM_SYSKEYDOWN => {
                            ctx.sink.push(EventData::KeyDown { key })
                        }
                        WM_KEYUP | WM_SYSKEYUP => ctx.sink.push(EventData::KeyUp { key }),
                        _ => {}
                    }
                }
            }
        }
        CallNextHookEx(HHOOK::default(), code, wparam, lparam)
    }

    unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        if code >= 0 {
            let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
            let (x, y) = (info.pt.x, info.pt.y);
            if let Some(ctx) = HOOK_CTX.lock().as_mut() {
                match wparam.0 as u32 {
                    WM_MOUSEMOVE => {
                        if (x, y) != ctx.last_pos {
                            ctx.last_pos = (x, y);
                            ctx.sink.push(EventData::MouseMove { x, y });
                        }
                    }
                    WM_LBUTTONDOWN => ctx.sink.push(EventData::MouseDown {
                        x,
                        y,
                        button: Button::Left,
                    }),
                    WM_LBUTTONUP => ctx.sink.push(EventData::MouseUp {
                        x,
                        y,
                        button: Button::Left,
                    }),
                    WM_RBUTTONDOWN => ctx.sink.push(EventData::MouseDown {
                        x,
                        y,
                        button: Button::Right,
                    }),
                    WM_RBUTTONUP => ctx.sink.push(EventData::MouseUp {
                        x,
                        y,
                        button: Button::Right,
                    }),
                    WM_MBUTTONDOWN => ctx.sink.push(EventData::MouseDown {
                        x,
                        y,
                        button: Button::Middle,
                    }),
                    WM_MBUTTONUP => ctx.sink.push(EventData::MouseUp {
                        x,
                        y,
                        button: Button::Middle,
                    }),
                    _ => {}
                }
            }
        }
        CallNextHookEx(HHOOK::default(), code, wparam, lparam)
    }
}
