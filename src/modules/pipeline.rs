use crate::error::AppError;
use crate::models::analysis::{
    filter_recognized, AnalysisResponse, AnalysisSnapshot, Freshness, RosterAnalysis,
};
use crate::modules::api::{AnalysisClient, AnalysisTransport};
use crate::modules::auth::{CredentialIssuer, SessionProbe};
use crate::modules::capture::CaptureRequest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle of one analysis pass, published to the display layer.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started,
    Updated(AnalysisSnapshot),
    /// The service returned nothing usable for at least one roster; the
    /// previous analysis is being shown instead.
    SoftStale(AnalysisSnapshot),
    Error(String),
    SessionExpired,
}

/// Drives captures through submission and merge. One capture at a time; a
/// frame arriving mid-flight is dropped rather than queued, the next capture
/// supersedes it anyway. After a session expiry the pipeline halts until the
/// re-login resets it.
pub struct AnalysisPipeline<I, P, T> {
    client: AnalysisClient<I, P, T>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    busy: AtomicBool,
    halted: AtomicBool,
    previous: parking_lot::Mutex<(RosterAnalysis, RosterAnalysis)>,
}

impl<I, P, T> AnalysisPipeline<I, P, T>
where
    I: CredentialIssuer,
    P: SessionProbe,
    T: AnalysisTransport,
{
    pub fn new(
        client: AnalysisClient<I, P, T>,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            client,
            events,
            busy: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            previous: parking_lot::Mutex::new(Default::default()),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Called after a successful re-login.
    pub fn reset_halt(&self) {
        self.halted.store(false, Ordering::Release);
    }

    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<CaptureRequest>) {
        while let Some(request) = rx.recv().await {
            if self.is_halted() {
                debug!("Pipeline halted, dropping capture [{}]", request.id);
                continue;
            }
            if self
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                info!("Analysis already in flight, dropping capture [{}]", request.id);
                continue;
            }
            let pipeline = self.clone();
            tokio::spawn(async move {
                pipeline.process(request).await;
                pipeline.busy.store(false, Ordering::Release);
            });
        }
    }

    async fn process(&self, request: CaptureRequest) {
        debug!(
            "Processing capture [{}] from {:?} ({} bytes)",
            request.id,
            request.origin,
            request.bytes.len()
        );
        let _ = self.events.send(PipelineEvent::Started);

        match self.client.submit(&request.bytes).await {
            Ok(response) => {
                let snapshot = self.merge(response);
                let event = if snapshot.any_stale() {
                    PipelineEvent::SoftStale(snapshot)
                } else {
                    PipelineEvent::Updated(snapshot)
                };
                let _ = self.events.send(event);
            }
            Err(AppError::SessionExpired) | Err(AppError::NotAuthenticated) => {
                warn!("Halting analysis pipeline, session expired");
                self.halted.store(true, Ordering::Release);
                let _ = self.events.send(PipelineEvent::SessionExpired);
            }
            Err(e) => {
                warn!("Analysis of capture [{}] failed: {}", request.id, e);
                let _ = self.events.send(PipelineEvent::Error(e.to_string()));
            }
        }
    }

    /// Merges the response with the last shown rosters. A side with zero
    /// recognized entries keeps the previous analysis marked stale; a
    /// populated side replaces it.
    fn merge(&self, response: AnalysisResponse) -> AnalysisSnapshot {
        let blue = filter_recognized(&response.blue_team);
        let red = filter_recognized(&response.red_team);

        let mut previous = self.previous.lock();
        let (blue, blue_freshness) = if blue.is_empty() && !previous.0.is_empty() {
            (previous.0.clone(), Freshness::Stale)
        } else {
            previous.0 = blue.clone();
            (blue, Freshness::Fresh)
        };
        let (red, red_freshness) = if red.is_empty() && !previous.1.is_empty() {
            (previous.1.clone(), Freshness::Stale)
        } else {
            previous.1 = red.clone();
            (red, Freshness::Fresh)
        };

        AnalysisSnapshot {
            match_state: response.match_state,
            blue_team: blue,
            red_team: red,
            blue_freshness,
            red_freshness,
            produced_at: chrono::Utc::now(),
        }
    }
}
