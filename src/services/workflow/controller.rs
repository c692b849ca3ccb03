// Submission Workflow Controller
// Drives validator -> client -> state transitions for one form, for either modality

use super::preview::PreviewLoadError;
use super::state::WorkflowState;
use crate::models::Modality;
use crate::services::detection_client::{ClientError, DetectionService};
use crate::services::validator::validate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One submission form.
///
/// Only the most recently initiated submission may write the state. Starting
/// a new submission aborts the in-flight call and bumps the generation, so a
/// late outcome from an older call is dropped even if it already completed.
/// A panicking call settles as a network failure instead of staying Pending.
///
/// `submit` spawns onto the current tokio runtime.
pub struct SubmissionWorkflow<S: DetectionService> {
    modality: Modality,
    service: Arc<S>,
    state: Arc<watch::Sender<WorkflowState>>,
    generation: Arc<AtomicU64>,
    in_flight: Option<AbortHandle>,
    current_uri: Option<String>,
    preview_error: Option<PreviewLoadError>,
}

impl<S: DetectionService> SubmissionWorkflow<S> {
    pub fn new(modality: Modality, service: Arc<S>) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self {
            modality,
            service,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: None,
            current_uri: None,
            preview_error: None,
        }
    }

    pub fn text(service: Arc<S>) -> Self {
        Self::new(Modality::Text, service)
    }

    pub fn image(service: Arc<S>) -> Self {
        Self::new(Modality::Image, service)
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn current_state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn preview_error(&self) -> Option<&PreviewLoadError> {
        self.preview_error.as_ref()
    }

    pub fn submit(&mut self, raw_input: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(stale) = self.in_flight.take() {
            if !stale.is_finished() {
                debug!(modality = %self.modality, generation, "workflow.superseded_in_flight");
            }
            stale.abort();
        }
        self.preview_error = None;
        self.current_uri = None;

        let request = match validate(self.modality, raw_input) {
            Ok(request) => request,
            Err(e) => {
                warn!(modality = %self.modality, generation, error = %e, "workflow.validation_failed");
                self.state.send_replace(WorkflowState::Failed { reason: e.into() });
                return;
            }
        };

        let submission_id = Uuid::new_v4();
        info!(
            submission_id = %submission_id,
            modality = %self.modality,
            generation,
            chars = request.input_chars(),
            "workflow.pending"
        );
        self.current_uri = request.source_uri().map(str::to_string);
        self.state.send_replace(WorkflowState::Pending {
            request: request.clone(),
        });

        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let current_generation = Arc::clone(&self.generation);
        let modality = self.modality;

        // The call runs in its own task so a panic surfaces as a JoinError here.
        let call = tokio::spawn(async move { service.submit(request).await });
        self.in_flight = Some(call.abort_handle());

        tokio::spawn(async move {
            let start = Instant::now();
            let outcome = match call.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => {
                    debug!(submission_id = %submission_id, generation, "workflow.call_aborted");
                    return;
                }
                Err(e) => {
                    error!(submission_id = %submission_id, modality = %modality, error = %e, "workflow.call_panicked");
                    Err(ClientError::Network(format!("detection call failed: {}", e)))
                }
            };
            let next = WorkflowState::from(outcome);
            let label = next.label();

            let reason = next.failure().map(|r| r.to_string());
            let applied = state.send_if_modified(|current| {
                if current_generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *current = next;
                true
            });

            let elapsed_ms = start.elapsed().as_millis() as u64;
            if !applied {
                debug!(submission_id = %submission_id, generation, "workflow.stale_outcome_discarded");
            } else if let Some(reason) = reason {
                warn!(
                    submission_id = %submission_id,
                    modality = %modality,
                    elapsed_ms,
                    reason = %reason,
                    "workflow.failed"
                );
            } else {
                info!(
                    submission_id = %submission_id,
                    modality = %modality,
                    elapsed_ms,
                    state = label,
                    "workflow.settled"
                );
            }
        });
    }

    /// Record that the preview surface could not render the submitted image.
    ///
    /// Presentation-only: the workflow state, including any verdict, is left untouched.
    /// Failures for a URI other than the latest submitted one are ignored.
    pub fn image_load_failed(&mut self, source_uri: &str, error: PreviewLoadError) {
        if self.modality != Modality::Image {
            warn!(modality = %self.modality, error = %error, "workflow.preview_error_ignored");
            return;
        }
        if self.current_uri.as_deref() != Some(source_uri.trim()) {
            debug!(uri = %source_uri, error = %error, "workflow.stale_preview_error_ignored");
            return;
        }
        warn!(error = %error, state = self.state.borrow().label(), "workflow.preview_failed");
        self.preview_error = Some(error);
    }

    /// Wait until the state is no longer Pending and return it.
    pub async fn settled(&self) -> WorkflowState {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|s| !s.is_pending()).await.map(|s| s.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.current_state(),
        }
    }
}

impl<S: DetectionService> Drop for SubmissionWorkflow<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}
