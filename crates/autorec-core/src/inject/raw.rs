//! Tier 2: raw SendInput injection (Windows)
//!
//! Structured low-level input with pointer coordinates normalized to the
//! 0..65535 absolute space SendInput expects.

use super::Injector;
use crate::error::{CoreError, Result};
use crate::events::Button;
use crate::keys;
use std::thread;
use std::time::Duration;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
    MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN,
    MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP,
    MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

const TIER: &str = "raw";

pub struct RawInjector;

impl RawInjector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RawInjector {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(value: i32, extent: i32) -> i32 {
    if extent <= 1 {
        return 0;
    }
    (value as i64 * 65535 / (extent as i64 - 1)) as i32
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize == inputs.len() {
        Ok(())
    } else {
        Err(CoreError::Dispatch {
            tier: TIER,
            message: format!("SendInput injected {} of {}", sent, inputs.len()),
        })
    }
}

fn mouse_input(dx: i32, dy: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn key_input(vk: u16, down: bool) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(vk),
                wScan: 0,
                dwFlags: if down {
                    Default::default()
                } else {
                    KEYEVENTF_KEYUP
                },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

impl Injector for RawInjector {
    fn name(&self) -> &'static str {
        TIER
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        let w = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let h = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        send(&[mouse_input(
            normalize(x, w),
            normalize(y, h),
            MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE,
        )])
    }

    fn button(&mut self, button: Button, down: bool, x: i32, y: i32) -> Result<()> {
        self.mouse_move(x, y)?;
        let flags = match (button, down) {
            (Button::Left, true) => MOUSEEVENTF_LEFTDOWN,
            (Button::Left, false) => MOUSEEVENTF_LEFTUP,
            (Button::Right, true) => MOUSEEVENTF_RIGHTDOWN,
            (Button::Right, false) => MOUSEEVENTF_RIGHTUP,
            (Button::Middle, true) => MOUSEEVENTF_MIDDLEDOWN,
            (Button::Middle, false) => MOUSEEVENTF_MIDDLEUP,
        };
        send(&[mouse_input(0, 0, flags)])
    }

    fn key(&mut self, key: &str, down: bool) -> Result<()> {
        let vk = keys::key_code(key).ok_or_else(|| CoreError::Dispatch {
            tier: TIER,
            message: format!("unmapped key: {}", key),
        })?;
        send(&[key_input(vk, down)])
    }

    /// Raw code attempt: press and release the layout-toggle virtual key.
    fn layout_toggle(&mut self) -> Result<()> {
        send(&[key_input(keys::vk::HANGUL, true)])?;
        thread::sleep(Duration::from_millis(50));
        send(&[key_input(keys::vk::HANGUL, false)])
    }
}
