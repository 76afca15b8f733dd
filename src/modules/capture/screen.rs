use crate::error::{AppError, AppResult};
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

const JPEG_QUALITY: u8 = 90;

/// Takes a frame of one monitor as encoded JPEG bytes. Blocking; callers run
/// it on a blocking task.
pub trait ScreenCapture: Send + Sync {
    /// Captures the monitor containing `point`, falling back to the primary
    /// monitor when the point is absent or off-screen.
    fn capture_at(&self, point: Option<(i32, i32)>) -> AppResult<Vec<u8>>;
}

pub struct XcapCapture;

impl XcapCapture {
    fn pick_monitor(
        monitors: Vec<xcap::Monitor>,
        point: Option<(i32, i32)>,
    ) -> Option<xcap::Monitor> {
        if let Some((x, y)) = point {
            if let Some(hit) = monitors.iter().position(|m| {
                x >= m.x()
                    && x < m.x() + m.width() as i32
                    && y >= m.y()
                    && y < m.y() + m.height() as i32
            }) {
                let mut monitors = monitors;
                return Some(monitors.swap_remove(hit));
            }
        }
        let primary = monitors.iter().position(|m| m.is_primary());
        let mut monitors = monitors;
        match primary {
            Some(i) => Some(monitors.swap_remove(i)),
            None => monitors.into_iter().next(),
        }
    }
}

impl ScreenCapture for XcapCapture {
    fn capture_at(&self, point: Option<(i32, i32)>) -> AppResult<Vec<u8>> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| AppError::Capture(format!("monitor enumeration failed: {}", e)))?;
        let monitor = Self::pick_monitor(monitors, point)
            .ok_or_else(|| AppError::Capture("no monitor available".to_string()))?;

        debug!(
            "Capturing monitor {} ({}x{})",
            monitor.name(),
            monitor.width(),
            monitor.height()
        );
        let frame = monitor
            .capture_image()
            .map_err(|e| AppError::Capture(format!("screen capture failed: {}", e)))?;

        // The analysis endpoint wants JPEG; drop the alpha channel first.
        let rgb = image::DynamicImage::ImageRgba8(frame).to_rgb8();
        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| AppError::Capture(format!("jpeg encoding failed: {}", e)))?;
        Ok(encoded)
    }
}
