use crate::modules::capture::is_screenshot_file;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

/// Dev-mode replay over the screenshots already on disk, newest first.
/// `older`/`newer` step through the deck for re-testing analysis against
/// known frames without the game running.
pub struct DevDeck {
    files: Vec<PathBuf>,
    cursor: Option<usize>,
}

impl DevDeck {
    pub fn scan(dirs: &[PathBuf]) -> Self {
        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        for dir in dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !is_screenshot_file(&path) {
                    continue;
                }
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((modified, path));
            }
        }
        files.sort_by(|a, b| b.cmp(a));
        let files: Vec<PathBuf> = files.into_iter().map(|(_, p)| p).collect();
        debug!("Dev deck holds {} screenshots", files.len());
        Self {
            files,
            cursor: None,
        }
    }

    /// Most recent screenshot, auto-processed at dev startup.
    pub fn newest(&self) -> Option<&PathBuf> {
        self.files.first()
    }

    /// Steps toward older screenshots, wrapping past the oldest back to the
    /// newest.
    pub fn older(&mut self) -> Option<&PathBuf> {
        if self.files.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => 0,
            Some(c) => (c + 1) % self.files.len(),
        };
        self.cursor = Some(next);
        self.files.get(next)
    }

    /// Steps back toward newer screenshots, wrapping past the newest around
    /// to the oldest.
    pub fn newer(&mut self) -> Option<&PathBuf> {
        if self.files.is_empty() {
            return None;
        }
        let len = self.files.len();
        let next = match self.cursor {
            None => 0,
            Some(c) => (c + len - 1) % len,
        };
        self.cursor = Some(next);
        self.files.get(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_deck() -> (tempfile::TempDir, DevDeck) {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["a.jpg", "b.png", "c.jpg"] {
            std::fs::write(dir.path().join(name), b"img").expect("write");
            // Distinct mtimes so newest-first ordering is deterministic.
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        std::fs::write(dir.path().join("ignore.txt"), b"x").expect("write");
        let deck = DevDeck::scan(&[dir.path().to_path_buf()]);
        (dir, deck)
    }

    fn name(path: Option<&PathBuf>) -> String {
        path.and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn newest_first_and_non_images_skipped() {
        let (_dir, deck) = seeded_deck();
        assert_eq!(deck.files.len(), 3);
        assert_eq!(name(deck.newest()), "c.jpg");
    }

    #[test]
    fn stepping_wraps_around_both_ends() {
        let (_dir, mut deck) = seeded_deck();
        assert_eq!(name(deck.older()), "c.jpg");
        assert_eq!(name(deck.older()), "b.png");
        assert_eq!(name(deck.older()), "a.jpg");
        // Past the oldest, wrap back to the newest.
        assert_eq!(name(deck.older()), "c.jpg");

        // And past the newest, wrap around to the oldest.
        assert_eq!(name(deck.newer()), "a.jpg");
        assert_eq!(name(deck.newer()), "b.png");
        assert_eq!(name(deck.newer()), "c.jpg");
        assert_eq!(name(deck.newer()), "a.jpg");
    }

    #[test]
    fn empty_deck_yields_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut deck = DevDeck::scan(&[dir.path().to_path_buf()]);
        assert!(deck.newest().is_none());
        assert!(deck.older().is_none());
        assert!(deck.newer().is_none());
    }
}
