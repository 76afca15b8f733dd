use crate::constants::POSITION_POLL_SECS;
use crate::modules::overlay::visibility::VisibilityState;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowBounds {
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }
}

/// Locates the game window the overlay sits on. Sync and object-safe; the
/// production impl enumerates OS windows, tests script presence.
pub trait TargetWindowLocator: Send + Sync {
    fn find(&self) -> Option<WindowBounds>;
}

/// Title-substring lookup over the OS window list.
pub struct XcapWindowLocator {
    title: String,
}

impl XcapWindowLocator {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl TargetWindowLocator for XcapWindowLocator {
    fn find(&self) -> Option<WindowBounds> {
        let windows = match xcap::Window::all() {
            Ok(windows) => windows,
            Err(e) => {
                warn!("Window enumeration failed: {}", e);
                return None;
            }
        };
        windows
            .into_iter()
            .find(|w| !w.is_minimized() && w.title().contains(&self.title))
            .map(|w| WindowBounds {
                x: w.x(),
                y: w.y(),
                width: w.width(),
                height: w.height(),
            })
    }
}

/// Keeps the overlay glued to the target window: a 1s poll repositions on
/// movement, suppresses the overlay while the target is gone (outside dev
/// mode) and deduplicates unchanged bounds so the UI layer is not re-laid-out
/// every tick.
pub struct OverlayPlacement {
    visibility: Arc<VisibilityState>,
    locator: Arc<dyn TargetWindowLocator>,
    dev_mode: bool,
    last: parking_lot::Mutex<Option<WindowBounds>>,
    bounds_tx: watch::Sender<Option<WindowBounds>>,
}

impl OverlayPlacement {
    pub fn new(
        visibility: Arc<VisibilityState>,
        locator: Arc<dyn TargetWindowLocator>,
        dev_mode: bool,
    ) -> Self {
        let (bounds_tx, _rx) = watch::channel(None);
        Self {
            visibility,
            locator,
            dev_mode,
            last: parking_lot::Mutex::new(None),
            bounds_tx,
        }
    }

    /// Latest known target bounds, None while the target is absent.
    pub fn subscribe_bounds(&self) -> watch::Receiver<Option<WindowBounds>> {
        self.bounds_tx.subscribe()
    }

    pub fn poll_once(&self) {
        let found = self.locator.find();
        match found {
            Some(bounds) => {
                self.visibility.set_suppressed(false);
                let mut last = self.last.lock();
                if *last != Some(bounds) {
                    debug!(
                        "Target window moved to {}x{} at ({}, {})",
                        bounds.width, bounds.height, bounds.x, bounds.y
                    );
                    *last = Some(bounds);
                    let _ = self.bounds_tx.send(Some(bounds));
                }
            }
            None => {
                if !self.dev_mode {
                    self.visibility.set_suppressed(true);
                }
                let mut last = self.last.lock();
                if last.take().is_some() {
                    let _ = self.bounds_tx.send(None);
                }
            }
        }
    }

    /// Display topology changed; drop the cached bounds so the next poll
    /// re-sends even identical coordinates.
    pub fn on_display_changed(&self) {
        debug!("Display change, re-syncing overlay position");
        *self.last.lock() = None;
        self.poll_once();
    }

    pub async fn run(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(POSITION_POLL_SECS));
        loop {
            interval.tick().await;
            self.poll_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedLocator {
        bounds: parking_lot::Mutex<Option<WindowBounds>>,
    }

    impl ScriptedLocator {
        fn new(bounds: Option<WindowBounds>) -> Arc<Self> {
            Arc::new(Self {
                bounds: parking_lot::Mutex::new(bounds),
            })
        }

        fn set(&self, bounds: Option<WindowBounds>) {
            *self.bounds.lock() = bounds;
        }
    }

    impl TargetWindowLocator for ScriptedLocator {
        fn find(&self) -> Option<WindowBounds> {
            *self.bounds.lock()
        }
    }

    fn bounds(x: i32) -> WindowBounds {
        WindowBounds {
            x,
            y: 0,
            width: 1920,
            height: 1080,
        }
    }

    #[test]
    fn unchanged_bounds_are_not_re_sent() {
        let locator = ScriptedLocator::new(Some(bounds(0)));
        let placement = OverlayPlacement::new(
            Arc::new(VisibilityState::new()),
            locator.clone(),
            false,
        );
        let mut rx = placement.subscribe_bounds();

        placement.poll_once();
        assert!(rx.has_changed().unwrap());
        rx.mark_unchanged();

        placement.poll_once();
        assert!(!rx.has_changed().unwrap());

        locator.set(Some(bounds(100)));
        placement.poll_once();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().unwrap().x, 100);
    }

    #[test]
    fn absent_target_suppresses_overlay() {
        let locator = ScriptedLocator::new(None);
        let visibility = Arc::new(VisibilityState::new());
        let placement = OverlayPlacement::new(visibility.clone(), locator.clone(), false);

        placement.poll_once();
        assert!(visibility.is_suppressed());

        locator.set(Some(bounds(0)));
        placement.poll_once();
        assert!(!visibility.is_suppressed());
    }

    #[test]
    fn dev_mode_skips_suppression() {
        let locator = ScriptedLocator::new(None);
        let visibility = Arc::new(VisibilityState::new());
        let placement = OverlayPlacement::new(visibility.clone(), locator, true);

        placement.poll_once();
        assert!(!visibility.is_suppressed());
    }

    #[test]
    fn display_change_re_sends_identical_bounds() {
        let locator = ScriptedLocator::new(Some(bounds(0)));
        let placement =
            OverlayPlacement::new(Arc::new(VisibilityState::new()), locator, false);
        let mut rx = placement.subscribe_bounds();

        placement.poll_once();
        rx.mark_unchanged();

        placement.on_display_changed();
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn center_of_bounds() {
        assert_eq!(bounds(100).center(), (1060, 540));
    }
}
