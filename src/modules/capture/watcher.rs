use crate::constants::SETTLE_DELAY_MS;
use crate::error::{AppError, AppResult};
use crate::modules::capture::{is_screenshot_file, CaptureGate, CaptureOrigin, CaptureRequest};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Passive capture source: watches the game's screenshot directories and
/// forwards new images to the pipeline. Dropping the watcher stops the OS
/// subscriptions; the forwarding task ends when its channel closes.
pub struct ScreenshotWatcher {
    _watchers: Vec<RecommendedWatcher>,
}

impl ScreenshotWatcher {
    pub fn start(
        dirs: &[PathBuf],
        gate: Arc<CaptureGate>,
        tx: mpsc::UnboundedSender<CaptureRequest>,
    ) -> AppResult<Self> {
        let (path_tx, path_rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watchers = Vec::new();
        for dir in dirs {
            if !dir.is_dir() {
                info!("Screenshot directory missing, skipping: {}", dir.display());
                continue;
            }
            let path_tx = path_tx.clone();
            let mut watcher =
                notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Create(_)) {
                            for path in event.paths {
                                let _ = path_tx.send(path);
                            }
                        }
                    }
                    Err(e) => warn!("Screenshot watcher error: {}", e),
                })
                .map_err(|e| AppError::Capture(format!("watcher init failed: {}", e)))?;
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    AppError::Capture(format!("cannot watch {}: {}", dir.display(), e))
                })?;
            info!("Watching screenshot directory: {}", dir.display());
            watchers.push(watcher);
        }

        tokio::spawn(forward_new_files(path_rx, gate, tx));
        Ok(Self {
            _watchers: watchers,
        })
    }
}

async fn forward_new_files(
    mut path_rx: mpsc::UnboundedReceiver<PathBuf>,
    gate: Arc<CaptureGate>,
    tx: mpsc::UnboundedSender<CaptureRequest>,
) {
    while let Some(path) = path_rx.recv().await {
        if !is_screenshot_file(&path) {
            continue;
        }
        // Give the game time to finish writing the file.
        tokio::time::sleep(std::time::Duration::from_millis(SETTLE_DELAY_MS)).await;
        if !gate.allow() {
            debug!(
                "Dropping screenshot, target window absent: {}",
                path.display()
            );
            continue;
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => {
                let request = CaptureRequest::new(bytes, CaptureOrigin::FileWatch);
                info!(
                    "New screenshot {} ({} bytes) [{}]",
                    path.display(),
                    request.bytes.len(),
                    request.id
                );
                if tx.send(request).is_err() {
                    break;
                }
            }
            Ok(_) => warn!("Screenshot file is empty: {}", path.display()),
            Err(e) => warn!("Cannot read screenshot {}: {}", path.display(), e),
        }
    }
}
