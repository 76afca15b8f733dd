use std::sync::atomic::{AtomicBool, Ordering};

/// Press/release edge detector for the capture key. OS key callbacks repeat
/// and can re-enter; the compare-exchange guarantees each physical press and
/// release wins exactly once.
#[derive(Default)]
pub struct KeyEdgeState {
    pressed: AtomicBool,
}

impl KeyEdgeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True for the single caller that turned the key "down".
    pub fn try_press(&self) -> bool {
        self.pressed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// True for the single caller that turned the key back "up".
    pub fn try_release(&self) -> bool {
        self.pressed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }
}
