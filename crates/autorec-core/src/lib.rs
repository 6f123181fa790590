//! autorec-core - desktop input macro recording and replay
//!
//! Records pointer and keyboard activity into timed event timelines,
//! persists them as named JSON macros, and replays them with real-time
//! pacing. A daily wall-clock scheduler fires stored macros, and an
//! always-on hotkey toggles recording out of band.
//!
//! ## Platform behavior
//!
//! Capture and injection both degrade through tiers at runtime: a global
//! push hook where the platform grants one, a Windows low-level hook, and
//! a ~10ms polling sampler as the floor. The artifact format is identical
//! across backends.

pub mod activity;
pub mod capture;
pub mod engine;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod inject;
pub mod keys;
pub mod notify;
pub mod playback;
pub mod recorder;
pub mod scheduler;
pub mod storage;

pub use engine::{EngineConfig, MacroEngine, PlaybackHandle};
pub use error::{CoreError, Result};
pub use events::{BackendTag, Button, Event, EventData, Macro};
pub use notify::{Notification, Notifier};

pub mod prelude {
    pub use crate::engine::{EngineConfig, MacroEngine, PlaybackHandle};
    pub use crate::error::{CoreError, Result};
    pub use crate::events::{BackendTag, Button, Event, EventData, Macro};
    pub use crate::hotkey::RESERVED_TOGGLE_KEY;
    pub use crate::notify::{Notification, Notifier};
    pub use crate::playback::{PlaybackOptions, PlaybackReport};
    pub use crate::scheduler::ScheduleEntry;
    pub use crate::storage::{MacroStore, MacroSummary};
}
