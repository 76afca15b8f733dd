use crate::constants::SETTINGS_FILE;
use crate::error::{AppError, AppResult};
use crate::modules::system::paths::get_data_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use tokio::sync::watch;

/// Negative key codes address mouse side buttons, which cannot be OS hotkeys
/// and are routed through the low-level mouse hook instead.
pub const MOUSE_BACK: i32 = -1;
pub const MOUSE_FORWARD: i32 = -2;

pub fn is_mouse_button(key_code: i32) -> bool {
    key_code < 0
}

/// Human-readable name for a bound key, for logs and the settings UI.
pub fn key_name(key_code: i32) -> String {
    match key_code {
        0 => "None".to_string(),
        MOUSE_BACK => "Mouse4".to_string(),
        MOUSE_FORWARD => "Mouse5".to_string(),
        0x09 => "Tab".to_string(),
        0x70..=0x7B => format!("F{}", key_code - 0x6F),
        0xC0 => "`".to_string(),
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(key_code as u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| format!("Key {}", key_code)),
        _ => format!("Key {}", key_code),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Toggles the swap-suggestions layout.
    pub swap_panel_key: i32,
    /// Toggles the team-composition layout.
    pub comp_panel_key: i32,
    /// Held key that triggers an on-demand capture.
    pub capture_key: i32,
    pub capture_enabled: bool,
    /// Wait after the capture key press for the scoreboard to render.
    pub capture_delay_ms: u64,
    /// Minimum score a suggestion needs to appear in the swap layout.
    pub min_score_swap: i32,
    /// Minimum score for the composition layout.
    pub min_score_comp: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            swap_panel_key: 0x71,  // F2
            comp_panel_key: 0x72,  // F3
            capture_key: 0x09,     // Tab
            capture_enabled: true,
            capture_delay_ms: 500,
            min_score_swap: 0,
            min_score_comp: 2,
        }
    }
}

impl Settings {
    /// Loads persisted settings, falling back to defaults when the file is
    /// absent or unreadable. A corrupt file is a configuration error worth a
    /// warning, never a startup failure.
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Using default settings: {}", e);
                Settings::default()
            }
        }
    }

    fn try_load() -> AppResult<Self> {
        let path = get_data_dir()
            .map_err(AppError::Config)?
            .join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("invalid settings file: {}", e)))
    }

    pub fn save(&self) -> AppResult<()> {
        let data_dir = get_data_dir().map_err(AppError::Config)?;
        let path = data_dir.join(SETTINGS_FILE);
        let temp_path = data_dir.join(format!("{}.tmp", SETTINGS_FILE));
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, content)?;
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

/// Shared settings handle. Components keep a clone and subscribe to the watch
/// channel instead of reaching into ambient global state; `update` persists
/// and then notifies.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<parking_lot::RwLock<Settings>>,
    tx: Arc<watch::Sender<()>>,
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(());
        Self {
            inner: Arc::new(parking_lot::RwLock::new(settings)),
            tx: Arc::new(tx),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) -> AppResult<()> {
        let snapshot = {
            let mut guard = self.inner.write();
            mutate(&mut guard);
            guard.clone()
        };
        snapshot.save()?;
        let _ = self.tx.send(());
        Ok(())
    }
}
