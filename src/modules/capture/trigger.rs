use crate::constants::FRAME_DELAY_MS;
use crate::models::settings::SettingsHandle;
use crate::modules::capture::key_edge::KeyEdgeState;
use crate::modules::capture::screen::ScreenCapture;
use crate::modules::capture::{CaptureGate, CaptureOrigin, CaptureRequest};
use crate::modules::overlay::visibility::VisibilityState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Active capture source: the held capture key hides the overlay, waits for
/// the scoreboard to render, snapshots the target monitor and hands the frame
/// to the pipeline. The key-up edge restores whatever was visible before.
pub struct CaptureTrigger {
    edge: KeyEdgeState,
    visibility: Arc<VisibilityState>,
    screen: Arc<dyn ScreenCapture>,
    gate: Arc<CaptureGate>,
    settings: SettingsHandle,
    tx: mpsc::UnboundedSender<CaptureRequest>,
}

impl CaptureTrigger {
    pub fn new(
        visibility: Arc<VisibilityState>,
        screen: Arc<dyn ScreenCapture>,
        gate: Arc<CaptureGate>,
        settings: SettingsHandle,
        tx: mpsc::UnboundedSender<CaptureRequest>,
    ) -> Self {
        Self {
            edge: KeyEdgeState::new(),
            visibility,
            screen,
            gate,
            settings,
            tx,
        }
    }

    /// Key-down handler. Repeat events while the key is held lose the edge
    /// race and return immediately.
    pub async fn on_capture_key_down(&self) {
        let settings = self.settings.snapshot();
        if !settings.capture_enabled {
            return;
        }
        if !self.edge.try_press() {
            debug!("Capture key repeat ignored");
            return;
        }

        self.visibility.hide_for_capture();
        // One frame for the hide to paint, then the configured scoreboard delay.
        let delay = FRAME_DELAY_MS + settings.capture_delay_ms;
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;

        if !self.gate.allow() {
            debug!("Skipping capture, target window absent");
            return;
        }

        let point = self.gate.target_point();
        let screen = self.screen.clone();
        match tokio::task::spawn_blocking(move || screen.capture_at(point)).await {
            Ok(Ok(bytes)) => {
                let request = CaptureRequest::new(bytes, CaptureOrigin::Hotkey);
                info!(
                    "Captured frame on hotkey ({} bytes) [{}]",
                    request.bytes.len(),
                    request.id
                );
                let _ = self.tx.send(request);
            }
            Ok(Err(e)) => warn!("Screen capture failed: {}", e),
            Err(e) => warn!("Capture task failed: {}", e),
        }
    }

    /// Key-up handler; restores the pre-capture overlay exactly once.
    pub fn on_capture_key_up(&self) {
        if !self.edge.try_release() {
            return;
        }
        if self.visibility.restore_after_capture() {
            debug!("Overlay restored after capture");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppResult;
    use crate::models::settings::Settings;
    use crate::modules::overlay::visibility::LayoutId;
    use crate::modules::overlay::window::{TargetWindowLocator, WindowBounds};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PresentWindow;

    impl TargetWindowLocator for PresentWindow {
        fn find(&self) -> Option<WindowBounds> {
            Some(WindowBounds {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            })
        }
    }

    struct CountingCapture {
        calls: AtomicUsize,
    }

    impl ScreenCapture for CountingCapture {
        fn capture_at(&self, point: Option<(i32, i32)>) -> AppResult<Vec<u8>> {
            assert_eq!(point, Some((960, 540)));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0xFF, 0xD8])
        }
    }

    fn trigger(
        capture_enabled: bool,
    ) -> (
        Arc<CaptureTrigger>,
        Arc<CountingCapture>,
        Arc<VisibilityState>,
        mpsc::UnboundedReceiver<CaptureRequest>,
    ) {
        let visibility = Arc::new(VisibilityState::new());
        let screen = Arc::new(CountingCapture {
            calls: AtomicUsize::new(0),
        });
        let gate = Arc::new(CaptureGate::new(Arc::new(PresentWindow), false));
        let settings = SettingsHandle::new(Settings {
            capture_enabled,
            capture_delay_ms: 0,
            ..Settings::default()
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let screen_dyn: Arc<dyn ScreenCapture> = screen.clone();
        let trigger = Arc::new(CaptureTrigger::new(
            visibility.clone(),
            screen_dyn,
            gate,
            settings,
            tx,
        ));
        (trigger, screen, visibility, rx)
    }

    #[tokio::test]
    async fn rapid_press_and_release_hide_and_restore_once() {
        let (trigger, screen, visibility, mut rx) = trigger(true);
        visibility.toggle_layout(LayoutId::SwapSuggestions);

        // Two press callbacks a few milliseconds apart, as a held key
        // produces; then two release callbacks.
        let first = {
            let trigger = trigger.clone();
            tokio::spawn(async move { trigger.on_capture_key_down().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!visibility.is_visible(LayoutId::SwapSuggestions));
        trigger.on_capture_key_down().await;
        first.await.expect("join");

        assert_eq!(screen.calls.load(Ordering::SeqCst), 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());

        trigger.on_capture_key_up();
        assert!(visibility.is_visible(LayoutId::SwapSuggestions));
        trigger.on_capture_key_up();
        assert!(visibility.is_visible(LayoutId::SwapSuggestions));
    }

    #[tokio::test]
    async fn disabled_capture_ignores_the_key() {
        let (trigger, screen, visibility, mut rx) = trigger(false);
        visibility.toggle_layout(LayoutId::TeamComposition);

        trigger.on_capture_key_down().await;
        assert_eq!(screen.calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
        assert!(visibility.is_visible(LayoutId::TeamComposition));
    }

    #[tokio::test]
    async fn capture_emits_hotkey_origin() {
        let (trigger, _screen, _visibility, mut rx) = trigger(true);
        trigger.on_capture_key_down().await;
        let request = rx.recv().await.expect("request");
        assert_eq!(request.origin, CaptureOrigin::Hotkey);
        assert_eq!(request.bytes, vec![0xFF, 0xD8]);
        trigger.on_capture_key_up();
    }
}
