use std::fs;
use std::path::PathBuf;

const DATA_DIR: &str = ".drafthud";

pub fn get_data_dir() -> Result<PathBuf, String> {
    fn ensure_dir(path: &PathBuf) -> Result<(), String> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| format!("failed_to_create_data_dir: {}", e))?;
        }
        Ok(())
    }

    if let Ok(env_path) = std::env::var("DATA_DIR") {
        if !env_path.trim().is_empty() {
            let data_dir = PathBuf::from(env_path);
            ensure_dir(&data_dir)?;
            return Ok(data_dir);
        }
    }

    if cfg!(test) {
        let data_dir = std::env::temp_dir().join(format!(".drafthud-test-{}", std::process::id()));
        ensure_dir(&data_dir)?;
        return Ok(data_dir);
    }

    if let Some(home) = dirs::home_dir() {
        let data_dir = home.join(DATA_DIR);
        if ensure_dir(&data_dir).is_ok() {
            return Ok(data_dir);
        }
    }

    let fallback_dir = std::env::temp_dir().join(DATA_DIR);
    ensure_dir(&fallback_dir)?;
    Ok(fallback_dir)
}

/// Directories the game drops screenshots into. The second entry covers
/// cloud-redirected document folders; missing directories are skipped by the
/// watcher.
pub fn screenshot_dirs() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(documents) = dirs::document_dir() {
        candidates.push(
            documents
                .join("Overwatch")
                .join("ScreenShots")
                .join("Overwatch"),
        );
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(
            home.join("OneDrive")
                .join("Documents")
                .join("Overwatch")
                .join("ScreenShots")
                .join("Overwatch"),
        );
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{lock_env, ScopedEnvVar};

    #[test]
    fn env_override_wins() {
        let _guard = lock_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let _env = ScopedEnvVar::set("DATA_DIR", dir.path().to_str().unwrap());
        assert_eq!(get_data_dir().expect("data dir"), dir.path());
    }
}
