pub mod freshness;
pub mod hotkeys;
pub mod visibility;
pub mod window;

pub use freshness::{FreshnessIndicator, IndicatorState};
pub use hotkeys::{
    GlobalHotkeyBackend, HotkeyAction, HotkeyBackend, HotkeyBinding, HotkeyRegistry, MouseHook,
};
pub use visibility::{LayoutId, VisibilityState};
pub use window::{OverlayPlacement, TargetWindowLocator, WindowBounds, XcapWindowLocator};

use crate::models::analysis::{AnalysisSnapshot, HeroAnalysis};
use crate::models::settings::SettingsHandle;
use crate::modules::pipeline::PipelineEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Glue between the pipeline and the display layer: holds the latest
/// snapshot, drives the freshness indicator from lifecycle events and
/// answers which rows each layout should show.
pub struct OverlayCoordinator {
    visibility: Arc<VisibilityState>,
    indicator: FreshnessIndicator,
    snapshot: parking_lot::RwLock<Option<AnalysisSnapshot>>,
    settings: SettingsHandle,
    status_tx: tokio::sync::watch::Sender<String>,
}

impl OverlayCoordinator {
    pub fn new(visibility: Arc<VisibilityState>, settings: SettingsHandle) -> Self {
        let indicator = FreshnessIndicator::new();
        let (status_tx, _rx) = tokio::sync::watch::channel(indicator.label());
        Self {
            visibility,
            indicator,
            snapshot: parking_lot::RwLock::new(None),
            settings,
            status_tx,
        }
    }

    /// Rendered indicator text, re-sent on every event and on the 10s tick
    /// so relative ages keep counting up between analyses.
    pub fn subscribe_status(&self) -> tokio::sync::watch::Receiver<String> {
        self.status_tx.subscribe()
    }

    pub async fn run_status_ticker(self: Arc<Self>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(10));
        loop {
            interval.tick().await;
            let _ = self.status_tx.send(self.indicator.label());
        }
    }

    pub fn visibility(&self) -> &Arc<VisibilityState> {
        &self.visibility
    }

    pub fn indicator(&self) -> &FreshnessIndicator {
        &self.indicator
    }

    pub fn snapshot(&self) -> Option<AnalysisSnapshot> {
        self.snapshot.read().clone()
    }

    /// Rows for one layout, filtered by its min-score threshold and sorted
    /// best first. Swap suggestions come from the friendly roster, the
    /// composition layout reads the enemy roster.
    pub fn rows_for(&self, layout: LayoutId) -> Vec<(u32, HeroAnalysis)> {
        let snapshot = self.snapshot.read();
        let Some(snapshot) = snapshot.as_ref() else {
            return Vec::new();
        };
        let settings = self.settings.snapshot();
        let (roster, min_score) = match layout {
            LayoutId::SwapSuggestions => (&snapshot.blue_team, settings.min_score_swap),
            LayoutId::TeamComposition => (&snapshot.red_team, settings.min_score_comp),
        };
        let mut rows: Vec<(u32, HeroAnalysis)> = roster
            .iter()
            .filter(|(_, a)| a.score >= min_score)
            .map(|(id, a)| (*id, a.clone()))
            .collect();
        rows.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        rows
    }

    pub fn handle_event(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Started => self.indicator.set(IndicatorState::Analyzing),
            PipelineEvent::Updated(snapshot) => {
                self.indicator
                    .set(IndicatorState::Updated(snapshot.produced_at));
                *self.snapshot.write() = Some(snapshot);
            }
            PipelineEvent::SoftStale(snapshot) => {
                self.indicator
                    .set(IndicatorState::CachedData(snapshot.produced_at));
                *self.snapshot.write() = Some(snapshot);
            }
            PipelineEvent::Error(msg) => self.indicator.set(IndicatorState::Error(msg)),
            PipelineEvent::SessionExpired => self.indicator.set(IndicatorState::Error(
                "Session expired, please log in again".to_string(),
            )),
        }
        let _ = self.status_tx.send(self.indicator.label());
    }

    pub async fn run_events(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<PipelineEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
    }
}
