//! Tier 1: native injection via enigo

use super::Injector;
use crate::error::{CoreError, Result};
use crate::events::Button;
use crate::keys;
use enigo::{Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};

const TIER: &str = "native";

pub struct NativeInjector {
    enigo: Enigo,
}

impl NativeInjector {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| CoreError::Dispatch {
            tier: TIER,
            message: e.to_string(),
        })?;
        Ok(Self { enigo })
    }
}

fn dispatch_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Dispatch {
        tier: TIER,
        message: e.to_string(),
    }
}

fn enigo_button(button: Button) -> enigo::Button {
    match button {
        Button::Left => enigo::Button::Left,
        Button::Right => enigo::Button::Right,
        Button::Middle => enigo::Button::Middle,
    }
}

fn enigo_key(name: &str) -> Option<enigo::Key> {
    use enigo::Key;

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(Key::Unicode(c));
    }

    if let Some(n) = name.strip_prefix('f').and_then(|s| s.parse::<u16>().ok()) {
        return match n {
            1 => Some(Key::F1),
            2 => Some(Key::F2),
            3 => Some(Key::F3),
            4 => Some(Key::F4),
            5 => Some(Key::F5),
            6 => Some(Key::F6),
            7 => Some(Key::F7),
            8 => Some(Key::F8),
            9 => Some(Key::F9),
            10 => Some(Key::F10),
            11 => Some(Key::F11),
            12 => Some(Key::F12),
            _ => None,
        };
    }

    let key = match name {
        "shift" => Key::Shift,
        "shiftright" => Key::RShift,
        "ctrl" => Key::Control,
        "ctrlright" => Key::RControl,
        "alt" => Key::Alt,
        "capslock" => Key::CapsLock,
        "escape" => Key::Escape,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "enter" => Key::Return,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        _ => return None,
    };
    Some(key)
}

impl Injector for NativeInjector {
    fn name(&self) -> &'static str {
        TIER
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(dispatch_err)
    }

    fn button(&mut self, button: Button, down: bool, x: i32, y: i32) -> Result<()> {
        self.mouse_move(x, y)?;
        let direction = if down {
            Direction::Press
        } else {
            Direction::Release
        };
        self.enigo
            .button(enigo_button(button), direction)
            .map_err(dispatch_err)
    }

    fn key(&mut self, key: &str, down: bool) -> Result<()> {
        let mapped = enigo_key(key).ok_or_else(|| CoreError::Dispatch {
            tier: TIER,
            message: format!("unmapped key: {}", key),
        })?;
        let direction = if down {
            Direction::Press
        } else {
            Direction::Release
        };
        self.enigo.key(mapped, direction).map_err(dispatch_err)
    }

    /// Direct symbol attempt: the raw layout-toggle code through the
    /// platform's key API.
    fn layout_toggle(&mut self) -> Result<()> {
        let key = enigo::Key::Other(keys::vk::HANGUL as u32);
        self.enigo
            .key(key, Direction::Click)
            .map_err(dispatch_err)
    }
}
