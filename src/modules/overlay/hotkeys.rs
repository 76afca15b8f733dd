use crate::error::{AppError, AppResult};
use crate::models::settings::{is_mouse_button, key_name};
use global_hotkey::hotkey::{Code, HotKey};
use global_hotkey::GlobalHotKeyManager;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    ToggleSwapPanel,
    ToggleCompPanel,
    Capture,
    DevOlderScreenshot,
    DevNewerScreenshot,
}

#[derive(Debug, Clone, Copy)]
pub struct HotkeyBinding {
    pub action: HotkeyAction,
    pub key_code: i32,
}

/// OS-level registration seam. Object-safe so the registry can be tested
/// without touching the real hotkey manager.
pub trait HotkeyBackend: Send + Sync {
    fn register(&self, key_code: i32) -> AppResult<u32>;
    fn unregister(&self, id: u32) -> AppResult<()>;
}

/// Delivery seam for mouse side buttons, which the OS hotkey table cannot
/// claim. A platform low-level mouse hook implements this; its press/release
/// edges are resolved to actions via `HotkeyRegistry::action_for_mouse` and
/// feed the same dispatch as keyboard hotkeys.
pub trait MouseHook: Send + Sync {
    /// Replaces the set of watched button codes.
    fn watch(&self, button_codes: &[i32]) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveBinding {
    Os(u32),
    Mouse(i32),
}

/// Keeps at most one live registration per action. Settings changes re-apply
/// the whole binding set; stale registrations are dropped before their
/// replacement is registered so a key is never claimed twice.
pub struct HotkeyRegistry<B> {
    backend: B,
    mouse_hook: Option<Arc<dyn MouseHook>>,
    live: parking_lot::Mutex<HashMap<HotkeyAction, LiveBinding>>,
}

impl<B: HotkeyBackend> HotkeyRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            mouse_hook: None,
            live: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_mouse_hook(mut self, hook: Arc<dyn MouseHook>) -> Self {
        self.mouse_hook = Some(hook);
        self
    }

    pub fn apply(&self, bindings: &[HotkeyBinding]) -> AppResult<()> {
        let mut live = self.live.lock();

        // Drop registrations for actions no longer bound at all.
        let stale: Vec<HotkeyAction> = live
            .keys()
            .filter(|action| !bindings.iter().any(|b| b.action == **action))
            .copied()
            .collect();
        for action in stale {
            if let Some(LiveBinding::Os(id)) = live.remove(&action) {
                self.backend.unregister(id)?;
            }
        }

        for binding in bindings {
            if let Some(LiveBinding::Os(id)) = live.remove(&binding.action) {
                self.backend.unregister(id)?;
            }
            if binding.key_code == 0 {
                debug!("Action {:?} left unbound", binding.action);
                continue;
            }
            if is_mouse_button(binding.key_code) {
                if self.mouse_hook.is_some() {
                    debug!(
                        "Action {:?} bound to {} via mouse hook",
                        binding.action,
                        key_name(binding.key_code)
                    );
                    live.insert(binding.action, LiveBinding::Mouse(binding.key_code));
                } else {
                    warn!(
                        "No mouse hook on this build; {} binding for {:?} is inactive",
                        key_name(binding.key_code),
                        binding.action
                    );
                }
                continue;
            }
            let id = self.backend.register(binding.key_code)?;
            info!(
                "Registered {} for {:?}",
                key_name(binding.key_code),
                binding.action
            );
            live.insert(binding.action, LiveBinding::Os(id));
        }

        // Re-sync the hook with the surviving mouse bindings in one shot.
        if let Some(hook) = &self.mouse_hook {
            let codes: Vec<i32> = live
                .values()
                .filter_map(|b| match b {
                    LiveBinding::Mouse(code) => Some(*code),
                    LiveBinding::Os(_) => None,
                })
                .collect();
            hook.watch(&codes)?;
        }
        Ok(())
    }

    /// Resolves a backend event id back to its action.
    pub fn action_for(&self, id: u32) -> Option<HotkeyAction> {
        self.live
            .lock()
            .iter()
            .find_map(|(action, binding)| match binding {
                LiveBinding::Os(live_id) if *live_id == id => Some(*action),
                _ => None,
            })
    }

    /// Resolves a mouse-hook button code back to its action.
    pub fn action_for_mouse(&self, button_code: i32) -> Option<HotkeyAction> {
        self.live
            .lock()
            .iter()
            .find_map(|(action, binding)| match binding {
                LiveBinding::Mouse(code) if *code == button_code => Some(*action),
                _ => None,
            })
    }
}

pub struct GlobalHotkeyBackend {
    manager: GlobalHotKeyManager,
    live: parking_lot::Mutex<HashMap<u32, HotKey>>,
}

impl GlobalHotkeyBackend {
    pub fn new() -> AppResult<Self> {
        let manager = GlobalHotKeyManager::new()
            .map_err(|e| AppError::Config(format!("hotkey manager init failed: {}", e)))?;
        Ok(Self {
            manager,
            live: parking_lot::Mutex::new(HashMap::new()),
        })
    }
}

impl HotkeyBackend for GlobalHotkeyBackend {
    fn register(&self, key_code: i32) -> AppResult<u32> {
        let code = code_for_key(key_code)?;
        let hotkey = HotKey::new(None, code);
        self.manager
            .register(hotkey)
            .map_err(|e| AppError::Config(format!("cannot register {}: {}", key_name(key_code), e)))?;
        self.live.lock().insert(hotkey.id(), hotkey);
        Ok(hotkey.id())
    }

    fn unregister(&self, id: u32) -> AppResult<()> {
        let Some(hotkey) = self.live.lock().remove(&id) else {
            return Ok(());
        };
        if let Err(e) = self.manager.unregister(hotkey) {
            warn!("Failed to unregister hotkey {}: {}", id, e);
        }
        Ok(())
    }
}

fn code_for_key(key_code: i32) -> AppResult<Code> {
    let code = match key_code {
        0x09 => Code::Tab,
        0x20 => Code::Space,
        0x70 => Code::F1,
        0x71 => Code::F2,
        0x72 => Code::F3,
        0x73 => Code::F4,
        0x74 => Code::F5,
        0x75 => Code::F6,
        0x76 => Code::F7,
        0x77 => Code::F8,
        0x78 => Code::F9,
        0x79 => Code::F10,
        0x7A => Code::F11,
        0x7B => Code::F12,
        0xC0 => Code::Backquote,
        0x30 => Code::Digit0,
        0x31 => Code::Digit1,
        0x32 => Code::Digit2,
        0x33 => Code::Digit3,
        0x34 => Code::Digit4,
        0x35 => Code::Digit5,
        0x36 => Code::Digit6,
        0x37 => Code::Digit7,
        0x38 => Code::Digit8,
        0x39 => Code::Digit9,
        other => {
            return Err(AppError::Config(format!(
                "unsupported hotkey code {}",
                other
            )))
        }
    };
    Ok(code)
}
