//! Tier 3: high-level simulate calls via rdev

use super::Injector;
use crate::error::{CoreError, Result};
use crate::events::Button;
use crate::keys;
use rdev::{simulate, EventType};
use std::thread;
use std::time::Duration;

const TIER: &str = "simulate";

/// Small settle delay between chorded key events, as the OS event queue
/// can reorder back-to-back injections.
const CHORD_GAP: Duration = Duration::from_millis(20);

pub struct SimInjector;

impl SimInjector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimInjector {
    fn default() -> Self {
        Self::new()
    }
}

fn send(event: &EventType) -> Result<()> {
    simulate(event).map_err(|e| CoreError::Dispatch {
        tier: TIER,
        message: format!("{:?}", e),
    })
}

impl Injector for SimInjector {
    fn name(&self) -> &'static str {
        TIER
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        send(&EventType::MouseMove {
            x: x as f64,
            y: y as f64,
        })
    }

    fn button(&mut self, button: Button, down: bool, x: i32, y: i32) -> Result<()> {
        self.mouse_move(x, y)?;
        let button = keys::rdev_button(button);
        if down {
            send(&EventType::ButtonPress(button))
        } else {
            send(&EventType::ButtonRelease(button))
        }
    }

    fn key(&mut self, key: &str, down: bool) -> Result<()> {
        let mapped = keys::rdev_key(key).ok_or_else(|| CoreError::Dispatch {
            tier: TIER,
            message: format!("unmapped key: {}", key),
        })?;
        if down {
            send(&EventType::KeyPress(mapped))
        } else {
            send(&EventType::KeyRelease(mapped))
        }
    }

    /// Modifier-combo attempt: Alt chorded with the layout-toggle key,
    /// equivalent to the toggle on layouts where the direct symbol fails.
    fn layout_toggle(&mut self) -> Result<()> {
        send(&EventType::KeyPress(rdev::Key::Alt))?;
        thread::sleep(CHORD_GAP);
        send(&EventType::KeyPress(rdev::Key::AltGr))?;
        thread::sleep(CHORD_GAP);
        send(&EventType::KeyRelease(rdev::Key::AltGr))?;
        send(&EventType::KeyRelease(rdev::Key::Alt))
    }
}
