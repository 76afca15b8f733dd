pub mod dev_deck;
pub mod key_edge;
pub mod screen;
pub mod trigger;
pub mod watcher;

pub use key_edge::KeyEdgeState;
pub use screen::{ScreenCapture, XcapCapture};
pub use trigger::CaptureTrigger;
pub use watcher::ScreenshotWatcher;

use crate::modules::overlay::window::TargetWindowLocator;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOrigin {
    /// Picked up from a watched screenshot directory.
    FileWatch,
    /// Taken on demand via the capture hotkey.
    Hotkey,
}

/// One frame handed to the analysis pipeline. The id correlates log lines
/// across capture, submission and merge.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub bytes: Vec<u8>,
    pub origin: CaptureOrigin,
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
}

impl CaptureRequest {
    pub fn new(bytes: Vec<u8>, origin: CaptureOrigin) -> Self {
        Self {
            bytes,
            origin,
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
        }
    }
}

/// Both capture modes drop frames while the target window is absent, unless
/// dev mode allows working against replayed screenshots.
pub struct CaptureGate {
    locator: Arc<dyn TargetWindowLocator>,
    dev_mode: bool,
}

impl CaptureGate {
    pub fn new(locator: Arc<dyn TargetWindowLocator>, dev_mode: bool) -> Self {
        Self { locator, dev_mode }
    }

    pub fn allow(&self) -> bool {
        self.dev_mode || self.locator.find().is_some()
    }

    /// Center of the target window, for picking the monitor to capture.
    pub fn target_point(&self) -> Option<(i32, i32)> {
        self.locator.find().map(|b| b.center())
    }
}

pub fn is_screenshot_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            e == "jpg" || e == "jpeg" || e == "png"
        })
        .unwrap_or(false)
}
