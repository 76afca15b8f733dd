use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutId {
    SwapSuggestions,
    TeamComposition,
}

#[derive(Debug, Default, Clone, Copy)]
struct Layouts {
    swap: bool,
    comp: bool,
}

#[derive(Debug, Default)]
struct Inner {
    layouts: Layouts,
    /// Layout state recorded by a capture hide, consumed by the restore.
    saved: Option<Layouts>,
    /// True while the target window is absent; layouts stay hidden on screen
    /// regardless of their toggle state.
    suppressed: bool,
}

/// Which layouts are showing. The two layouts are mutually exclusive;
/// hide/restore around a capture is idempotent so double-fired key edges
/// cannot lose the pre-capture state.
#[derive(Default)]
pub struct VisibilityState {
    inner: parking_lot::Mutex<Inner>,
}

impl VisibilityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles one layout, hiding the other. Toggling the visible layout
    /// hides everything.
    pub fn toggle_layout(&self, id: LayoutId) {
        let mut inner = self.inner.lock();
        match id {
            LayoutId::SwapSuggestions => {
                inner.layouts.swap = !inner.layouts.swap;
                inner.layouts.comp = false;
            }
            LayoutId::TeamComposition => {
                inner.layouts.comp = !inner.layouts.comp;
                inner.layouts.swap = false;
            }
        }
        debug!(
            "Layout toggle: swap={} comp={}",
            inner.layouts.swap, inner.layouts.comp
        );
    }

    pub fn is_visible(&self, id: LayoutId) -> bool {
        let inner = self.inner.lock();
        if inner.suppressed {
            return false;
        }
        match id {
            LayoutId::SwapSuggestions => inner.layouts.swap && inner.saved.is_none(),
            LayoutId::TeamComposition => inner.layouts.comp && inner.saved.is_none(),
        }
    }

    /// Records the current layout state and hides both layouts. Returns true
    /// when this call did the recording; a repeat while already hidden keeps
    /// the earlier record untouched.
    pub fn hide_for_capture(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.saved.is_some() {
            return false;
        }
        inner.saved = Some(inner.layouts);
        inner.layouts = Layouts::default();
        true
    }

    /// Restores the layout state recorded by `hide_for_capture`. Returns true
    /// when there was a record to restore.
    pub fn restore_after_capture(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.saved.take() {
            Some(saved) => {
                inner.layouts = saved;
                true
            }
            None => false,
        }
    }

    /// Suppression while the target window is absent. Independent of the
    /// capture hide; the toggle state survives.
    pub fn set_suppressed(&self, suppressed: bool) {
        let mut inner = self.inner.lock();
        if inner.suppressed != suppressed {
            debug!("Overlay suppression: {}", suppressed);
            inner.suppressed = suppressed;
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.lock().suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_mutually_exclusive() {
        let state = VisibilityState::new();
        state.toggle_layout(LayoutId::SwapSuggestions);
        assert!(state.is_visible(LayoutId::SwapSuggestions));
        assert!(!state.is_visible(LayoutId::TeamComposition));

        state.toggle_layout(LayoutId::TeamComposition);
        assert!(!state.is_visible(LayoutId::SwapSuggestions));
        assert!(state.is_visible(LayoutId::TeamComposition));

        state.toggle_layout(LayoutId::TeamComposition);
        assert!(!state.is_visible(LayoutId::TeamComposition));
    }

    #[test]
    fn hide_and_restore_are_idempotent() {
        let state = VisibilityState::new();
        state.toggle_layout(LayoutId::SwapSuggestions);

        assert!(state.hide_for_capture());
        // A second hide must not overwrite the recorded state with
        // "everything hidden".
        assert!(!state.hide_for_capture());
        assert!(!state.is_visible(LayoutId::SwapSuggestions));

        assert!(state.restore_after_capture());
        assert!(state.is_visible(LayoutId::SwapSuggestions));
        assert!(!state.restore_after_capture());
        assert!(state.is_visible(LayoutId::SwapSuggestions));
    }

    #[test]
    fn restore_without_hide_is_a_no_op() {
        let state = VisibilityState::new();
        assert!(!state.restore_after_capture());
    }

    #[test]
    fn suppression_masks_visibility_without_losing_toggles() {
        let state = VisibilityState::new();
        state.toggle_layout(LayoutId::TeamComposition);
        state.set_suppressed(true);
        assert!(!state.is_visible(LayoutId::TeamComposition));
        state.set_suppressed(false);
        assert!(state.is_visible(LayoutId::TeamComposition));
    }
}
