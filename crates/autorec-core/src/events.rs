//! Event timeline types
//!
//! One macro is a named, ordered list of timestamped input events. Wire
//! names match the artifact format: a `type` tag over `mouse_move`,
//! `mouse_down`, `mouse_up`, `key_down`, `key_up`.

use serde::{Deserialize, Serialize};

/// A single captured input event.
///
/// `time` is the offset in seconds from recording start. Within a
/// persisted timeline events are sorted ascending by `time`; ties keep
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    #[serde(flatten)]
    pub data: EventData,
}

impl Event {
    pub fn new(time: f64, data: EventData) -> Self {
        Self { time, data }
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self.data, EventData::KeyDown { .. } | EventData::KeyUp { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    MouseMove { x: i32, y: i32 },
    MouseDown { x: i32, y: i32, button: Button },
    MouseUp { x: i32, y: i32, button: Button },
    KeyDown { key: String },
    KeyUp { key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Left,
    Right,
    Middle,
}

/// Which capture strategy produced a macro. Stored on the artifact for
/// diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTag {
    PushHook,
    LowLevelHook,
    Polling,
}

impl std::fmt::Display for BackendTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendTag::PushHook => write!(f, "push_hook"),
            BackendTag::LowLevelHook => write!(f, "low_level_hook"),
            BackendTag::Polling => write!(f, "polling"),
        }
    }
}

/// A persisted macro - never mutated after creation. Replacing one means
/// delete and re-record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    /// Local-time string, `%Y-%m-%d %H:%M:%S`.
    pub created: String,
    pub events: Vec<Event>,
    pub capture_backend: BackendTag,
}

impl Macro {
    pub fn new(name: impl Into<String>, events: Vec<Event>, capture_backend: BackendTag) -> Self {
        Self {
            name: name.into(),
            created: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            events,
            capture_backend,
        }
    }
}

/// Stable ascending sort by time; equal timestamps keep insertion order.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_stable_on_ties() {
        let mut events = vec![
            Event::new(0.5, EventData::KeyDown { key: "a".into() }),
            Event::new(0.1, EventData::MouseMove { x: 1, y: 1 }),
            Event::new(0.5, EventData::KeyUp { key: "a".into() }),
        ];
        sort_events(&mut events);
        assert_eq!(events[0].data, EventData::MouseMove { x: 1, y: 1 });
        assert_eq!(events[1].data, EventData::KeyDown { key: "a".into() });
        assert_eq!(events[2].data, EventData::KeyUp { key: "a".into() });
    }

    #[test]
    fn wire_format_tags() {
        let e = Event::new(
            1.25,
            EventData::MouseDown {
                x: 10,
                y: 20,
                button: Button::Middle,
            },
        );
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "mouse_down");
        assert_eq!(json["button"], "middle");
        assert_eq!(json["time"], 1.25);

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn all_kinds_round_trip() {
        let events = vec![
            Event::new(0.0, EventData::MouseMove { x: 5, y: 6 }),
            Event::new(
                0.1,
                EventData::MouseDown {
                    x: 5,
                    y: 6,
                    button: Button::Left,
                },
            ),
            Event::new(
                0.2,
                EventData::MouseUp {
                    x: 5,
                    y: 6,
                    button: Button::Left,
                },
            ),
            Event::new(0.3, EventData::KeyDown { key: "shift".into() }),
            Event::new(0.4, EventData::KeyUp { key: "shift".into() }),
        ];
        let json = serde_json::to_string(&events).unwrap();
        let back: Vec<Event> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, events);
    }
}
