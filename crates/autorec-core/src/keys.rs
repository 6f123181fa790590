//! Canonical key names and platform key-code mapping
//!
//! Every capture backend normalizes into the same lowercase canonical
//! names: letters, digits, modifiers (with left/right variants),
//! navigation keys, f1-f12, and the composite layout-toggle key
//! ("hangul"). Playback maps canonical names back to platform codes.

use crate::events::Button;

/// Canonical name of the composite layout-toggle key.
pub const LAYOUT_TOGGLE: &str = "hangul";

/// Virtual-key codes used by the raw injection tier.
pub mod vk {
    pub const BACKSPACE: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const ENTER: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CTRL: u16 = 0x11;
    pub const ALT: u16 = 0x12;
    pub const CAPS_LOCK: u16 = 0x14;
    pub const HANGUL: u16 = 0x15;
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PAGE_UP: u16 = 0x21;
    pub const PAGE_DOWN: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const INSERT: u16 = 0x2D;
    pub const DELETE: u16 = 0x2E;
    pub const F1: u16 = 0x70;
    pub const SHIFT_LEFT: u16 = 0xA0;
    pub const SHIFT_RIGHT: u16 = 0xA1;
    pub const CTRL_LEFT: u16 = 0xA2;
    pub const CTRL_RIGHT: u16 = 0xA3;
    pub const ALT_LEFT: u16 = 0xA4;
}

/// Normalize a raw key identifier into its canonical lowercase name.
///
/// Left-variant modifiers collapse to the plain name; the right Alt key is
/// the layout toggle on Korean layouts and maps to it.
pub fn canonical(raw: &str) -> String {
    let lower = raw.to_lowercase();
    match lower.as_str() {
        "lshift" | "shift_l" | "shiftleft" => "shift".into(),
        "rshift" | "shift_r" | "shiftright" => "shiftright".into(),
        "lctrl" | "lcontrol" | "control_l" | "controlleft" => "ctrl".into(),
        "rctrl" | "rcontrol" | "control_r" | "controlright" => "ctrlright".into(),
        "lalt" | "alt_l" | "altleft" => "alt".into(),
        "ralt" | "alt_r" | "altgr" | "han_yeong" | "hanyeong" => LAYOUT_TOGGLE.into(),
        "esc" => "escape".into(),
        "return" => "enter".into(),
        "del" => "delete".into(),
        "pgup" | "prior" => "pageup".into(),
        "pgdn" | "next" => "pagedown".into(),
        _ => lower,
    }
}

/// Canonical name -> virtual-key code. Function keys are computed from the
/// F1 base; unknown names yield None and the event is skipped by callers.
pub fn key_code(name: &str) -> Option<u16> {
    if let Some(code) = function_key_code(name) {
        return Some(code);
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_lowercase() {
            return Some(c.to_ascii_uppercase() as u16);
        }
        if c.is_ascii_digit() {
            return Some(c as u16);
        }
    }

    let code = match name {
        "shift" => vk::SHIFT_LEFT,
        "shiftright" => vk::SHIFT_RIGHT,
        "ctrl" => vk::CTRL_LEFT,
        "ctrlright" => vk::CTRL_RIGHT,
        "alt" => vk::ALT_LEFT,
        LAYOUT_TOGGLE => vk::HANGUL,
        "capslock" => vk::CAPS_LOCK,
        "escape" => vk::ESCAPE,
        "space" => vk::SPACE,
        "tab" => vk::TAB,
        "enter" => vk::ENTER,
        "backspace" => vk::BACKSPACE,
        "delete" => vk::DELETE,
        "insert" => vk::INSERT,
        "home" => vk::HOME,
        "end" => vk::END,
        "pageup" => vk::PAGE_UP,
        "pagedown" => vk::PAGE_DOWN,
        "up" => vk::UP,
        "down" => vk::DOWN,
        "left" => vk::LEFT,
        "right" => vk::RIGHT,
        _ => return None,
    };
    Some(code)
}

fn function_key_code(name: &str) -> Option<u16> {
    let n: u16 = name.strip_prefix('f')?.parse().ok()?;
    if (1..=12).contains(&n) {
        Some(vk::F1 + (n - 1))
    } else {
        None
    }
}

/// Virtual-key code -> canonical name, for the low-level hook backend.
pub fn canonical_from_vk(code: u16) -> Option<String> {
    if (0x41..=0x5A).contains(&code) {
        return Some(((code as u8).to_ascii_lowercase() as char).to_string());
    }
    if (0x30..=0x39).contains(&code) {
        return Some((code as u8 as char).to_string());
    }
    if (vk::F1..=vk::F1 + 11).contains(&code) {
        return Some(format!("f{}", code - vk::F1 + 1));
    }
    let name = match code {
        vk::SHIFT | vk::SHIFT_LEFT => "shift",
        vk::SHIFT_RIGHT => "shiftright",
        vk::CTRL | vk::CTRL_LEFT => "ctrl",
        vk::CTRL_RIGHT => "ctrlright",
        vk::ALT | vk::ALT_LEFT => "alt",
        vk::HANGUL => LAYOUT_TOGGLE,
        vk::CAPS_LOCK => "capslock",
        vk::ESCAPE => "escape",
        vk::SPACE => "space",
        vk::TAB => "tab",
        vk::ENTER => "enter",
        vk::BACKSPACE => "backspace",
        vk::DELETE => "delete",
        vk::INSERT => "insert",
        vk::HOME => "home",
        vk::END => "end",
        vk::PAGE_UP => "pageup",
        vk::PAGE_DOWN => "pagedown",
        vk::UP => "up",
        vk::DOWN => "down",
        vk::LEFT => "left",
        vk::RIGHT => "right",
        _ => return None,
    };
    Some(name.to_string())
}

/// rdev key -> canonical name, for the push-hook backend.
pub fn canonical_from_rdev(key: rdev::Key) -> Option<String> {
    use rdev::Key::*;
    let name = match key {
        KeyA => "a", KeyB => "b", KeyC => "c", KeyD => "d", KeyE => "e",
        KeyF => "f", KeyG => "g", KeyH => "h", KeyI => "i", KeyJ => "j",
        KeyK => "k", KeyL => "l", KeyM => "m", KeyN => "n", KeyO => "o",
        KeyP => "p", KeyQ => "q", KeyR => "r", KeyS => "s", KeyT => "t",
        KeyU => "u", KeyV => "v", KeyW => "w", KeyX => "x", KeyY => "y",
        KeyZ => "z",
        Num0 => "0", Num1 => "1", Num2 => "2", Num3 => "3", Num4 => "4",
        Num5 => "5", Num6 => "6", Num7 => "7", Num8 => "8", Num9 => "9",
        F1 => "f1", F2 => "f2", F3 => "f3", F4 => "f4", F5 => "f5",
        F6 => "f6", F7 => "f7", F8 => "f8", F9 => "f9", F10 => "f10",
        F11 => "f11", F12 => "f12",
        ShiftLeft => "shift",
        ShiftRight => "shiftright",
        ControlLeft => "ctrl",
        ControlRight => "ctrlright",
        Alt => "alt",
        AltGr => LAYOUT_TOGGLE,
        CapsLock => "capslock",
        Escape => "escape",
        Space => "space",
        Tab => "tab",
        Return => "enter",
        Backspace => "backspace",
        Delete => "delete",
        Insert => "insert",
        Home => "home",
        End => "end",
        PageUp => "pageup",
        PageDown => "pagedown",
        UpArrow => "up",
        DownArrow => "down",
        LeftArrow => "left",
        RightArrow => "right",
        _ => return None,
    };
    Some(name.to_string())
}

/// Canonical name -> rdev key, for the simulate injection tier.
pub fn rdev_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key;
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let key = match c {
            'a' => Key::KeyA, 'b' => Key::KeyB, 'c' => Key::KeyC,
            'd' => Key::KeyD, 'e' => Key::KeyE, 'f' => Key::KeyF,
            'g' => Key::KeyG, 'h' => Key::KeyH, 'i' => Key::KeyI,
            'j' => Key::KeyJ, 'k' => Key::KeyK, 'l' => Key::KeyL,
            'm' => Key::KeyM, 'n' => Key::KeyN, 'o' => Key::KeyO,
            'p' => Key::KeyP, 'q' => Key::KeyQ, 'r' => Key::KeyR,
            's' => Key::KeyS, 't' => Key::KeyT, 'u' => Key::KeyU,
            'v' => Key::KeyV, 'w' => Key::KeyW, 'x' => Key::KeyX,
            'y' => Key::KeyY, 'z' => Key::KeyZ,
            '0' => Key::Num0, '1' => Key::Num1, '2' => Key::Num2,
            '3' => Key::Num3, '4' => Key::Num4, '5' => Key::Num5,
            '6' => Key::Num6, '7' => Key::Num7, '8' => Key::Num8,
            '9' => Key::Num9,
            _ => return None,
        };
        return Some(key);
    }

    let key = match name {
        "f1" => Key::F1, "f2" => Key::F2, "f3" => Key::F3, "f4" => Key::F4,
        "f5" => Key::F5, "f6" => Key::F6, "f7" => Key::F7, "f8" => Key::F8,
        "f9" => Key::F9, "f10" => Key::F10, "f11" => Key::F11, "f12" => Key::F12,
        "shift" => Key::ShiftLeft,
        "shiftright" => Key::ShiftRight,
        "ctrl" => Key::ControlLeft,
        "ctrlright" => Key::ControlRight,
        "alt" => Key::Alt,
        LAYOUT_TOGGLE => Key::AltGr,
        "capslock" => Key::CapsLock,
        "escape" => Key::Escape,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "enter" => Key::Return,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "insert" => Key::Insert,
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

/// device_query keycode -> canonical name, for the polling backend.
pub fn canonical_from_poll(key: device_query::Keycode) -> Option<String> {
    use device_query::Keycode::*;
    let name = match key {
        A => "a", B => "b", C => "c", D => "d", E => "e", F => "f",
        G => "g", H => "h", I => "i", J => "j", K => "k", L => "l",
        M => "m", N => "n", O => "o", P => "p", Q => "q", R => "r",
        S => "s", T => "t", U => "u", V => "v", W => "w", X => "x",
        Y => "y", Z => "z",
        Key0 => "0", Key1 => "1", Key2 => "2", Key3 => "3", Key4 => "4",
        Key5 => "5", Key6 => "6", Key7 => "7", Key8 => "8", Key9 => "9",
        F1 => "f1", F2 => "f2", F3 => "f3", F4 => "f4", F5 => "f5",
        F6 => "f6", F7 => "f7", F8 => "f8", F9 => "f9", F10 => "f10",
        F11 => "f11", F12 => "f12",
        LShift => "shift",
        RShift => "shiftright",
        LControl => "ctrl",
        RControl => "ctrlright",
        LAlt => "alt",
        RAlt => LAYOUT_TOGGLE,
        CapsLock => "capslock",
        Escape => "escape",
        Space => "space",
        Tab => "tab",
        Enter => "enter",
        Backspace => "backspace",
        Delete => "delete",
        Insert => "insert",
        Home => "home",
        End => "end",
        PageUp => "pageup",
        PageDown => "pagedown",
        Up => "up",
        Down => "down",
        Left => "left",
        Right => "right",
        _ => return None,
    };
    Some(name.to_string())
}

pub fn rdev_button(button: Button) -> rdev::Button {
    match button {
        Button::Left => rdev::Button::Left,
        Button::Right => rdev::Button::Right,
        Button::Middle => rdev::Button::Middle,
    }
}

pub fn button_from_rdev(button: rdev::Button) -> Option<Button> {
    match button {
        rdev::Button::Left => Some(Button::Left),
        rdev::Button::Right => Some(Button::Right),
        rdev::Button::Middle => Some(Button::Middle),
        rdev::Button::Unknown(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_collapse() {
        assert_eq!(canonical("LShift"), "shift");
        assert_eq!(canonical("rctrl"), "ctrlright");
        assert_eq!(canonical("ralt"), "hangul");
        assert_eq!(canonical("Esc"), "escape");
        assert_eq!(canonical("A"), "a");
    }

    #[test]
    fn function_keys_computed_from_base() {
        assert_eq!(key_code("f1"), Some(vk::F1));
        assert_eq!(key_code("f12"), Some(vk::F1 + 11));
        assert_eq!(key_code("f13"), None);
    }

    #[test]
    fn letters_digits_and_specials() {
        assert_eq!(key_code("a"), Some(b'A' as u16));
        assert_eq!(key_code("9"), Some(b'9' as u16));
        assert_eq!(key_code("shiftright"), Some(vk::SHIFT_RIGHT));
        assert_eq!(key_code("hangul"), Some(vk::HANGUL));
        assert_eq!(key_code("definitely-not-a-key"), None);
    }

    #[test]
    fn backend_tables_agree_on_canonical_names() {
        // The push-hook and polling tables must land in the same namespace.
        let via_rdev = canonical_from_rdev(rdev::Key::ControlRight).unwrap();
        let via_poll = canonical_from_poll(device_query::Keycode::RControl).unwrap();
        assert_eq!(via_rdev, via_poll);
        assert!(key_code(&via_rdev).is_some());
    }
}
