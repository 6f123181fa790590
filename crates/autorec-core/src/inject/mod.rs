//! Tiered input injection
//!
//! One interface, several variant implementations, tried in order until
//! one succeeds. Tier 1 is the native enigo injector, tier 2 the raw
//! SendInput path (Windows), tier 3 the rdev simulate call. The last
//! failure is the one surfaced when every tier is exhausted.

mod native;
#[cfg(target_os = "windows")]
mod raw;
mod sim;

pub use native::NativeInjector;
#[cfg(target_os = "windows")]
pub use raw::RawInjector;
pub use sim::SimInjector;

use crate::error::{CoreError, Result};
use crate::events::Button;

pub trait Injector: Send {
    fn name(&self) -> &'static str;

    /// Place the cursor directly at (x, y).
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()>;

    /// Press or release a pointer button at (x, y).
    fn button(&mut self, button: Button, down: bool, x: i32, y: i32) -> Result<()>;

    /// Press or release a key by canonical name.
    fn key(&mut self, key: &str, down: bool) -> Result<()>;

    /// One full press/release of the composite layout-toggle key.
    fn layout_toggle(&mut self) -> Result<()> {
        Err(CoreError::Dispatch {
            tier: self.name(),
            message: "layout toggle unsupported".into(),
        })
    }
}

/// Ordered strategy list over the concrete injectors.
pub struct TieredInjector {
    tiers: Vec<Box<dyn Injector>>,
}

impl TieredInjector {
    pub fn new(tiers: Vec<Box<dyn Injector>>) -> Self {
        Self { tiers }
    }

    /// The standard tier order. A tier that fails to initialize (e.g. no
    /// display for enigo) is simply left out; dispatch falls through to
    /// whatever remains.
    pub fn with_default_tiers() -> Self {
        let mut tiers: Vec<Box<dyn Injector>> = Vec::new();
        match NativeInjector::new() {
            Ok(t) => tiers.push(Box::new(t)),
            Err(e) => tracing::warn!("native injector unavailable: {}", e),
        }
        #[cfg(target_os = "windows")]
        tiers.push(Box::new(RawInjector::new()));
        tiers.push(Box::new(SimInjector::new()));
        Self { tiers }
    }

    fn try_each(&mut self, f: impl Fn(&mut dyn Injector) -> Result<()>) -> Result<()> {
        let mut last = CoreError::Dispatch {
            tier: "none",
            message: "no injection tier available".into(),
        };
        for tier in &mut self.tiers {
            match f(tier.as_mut()) {
                Ok(()) => return Ok(()),
                Err(e) => last = e,
            }
        }
        Err(last)
    }
}

impl Injector for TieredInjector {
    fn name(&self) -> &'static str {
        "tiered"
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> Result<()> {
        self.try_each(|t| t.mouse_move(x, y))
    }

    fn button(&mut self, button: Button, down: bool, x: i32, y: i32) -> Result<()> {
        self.try_each(|t| t.button(button, down, x, y))
    }

    fn key(&mut self, key: &str, down: bool) -> Result<()> {
        self.try_each(|t| t.key(key, down))
    }

    fn layout_toggle(&mut self) -> Result<()> {
        self.try_each(|t| t.layout_toggle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyTier {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Injector for FlakyTier {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn mouse_move(&mut self, _x: i32, _y: i32) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CoreError::Dispatch {
                    tier: "flaky",
                    message: "nope".into(),
                })
            } else {
                Ok(())
            }
        }
        fn button(&mut self, _b: Button, _d: bool, _x: i32, _y: i32) -> Result<()> {
            self.mouse_move(0, 0)
        }
        fn key(&mut self, _k: &str, _d: bool) -> Result<()> {
            self.mouse_move(0, 0)
        }
    }

    #[test]
    fn first_success_short_circuits() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut tiered = TieredInjector::new(vec![
            Box::new(FlakyTier {
                calls: first.clone(),
                fail: false,
            }),
            Box::new(FlakyTier {
                calls: second.clone(),
                fail: false,
            }),
        ]);
        tiered.mouse_move(1, 2).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn falls_through_and_surfaces_last_failure() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut tiered = TieredInjector::new(vec![
            Box::new(FlakyTier {
                calls: first.clone(),
                fail: true,
            }),
            Box::new(FlakyTier {
                calls: second.clone(),
                fail: true,
            }),
        ]);
        assert!(tiered.button(Button::Left, true, 0, 0).is_err());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
