// Command Surface
// Entry points used by the console front end. Errors are flattened to strings for display.

use crate::models::HealthStatus;
use crate::services::{
    render_preview_error, render_state, AppConfig, ConfigStore, DetectionClient, DetectionService,
    PreviewLoadError, PreviewLoader, ResultView, SubmissionWorkflow, WorkflowState,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Final picture of one form after a submission settles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    pub state: WorkflowState,
    pub view: Option<ResultView>,
    pub lines: Vec<String>,
    pub preview_error: Option<PreviewLoadError>,
}

impl DetectionOutcome {
    fn from_workflow<S: DetectionService>(workflow: &SubmissionWorkflow<S>, state: WorkflowState) -> Self {
        let mut lines = render_state(&state);
        if let Some(msg) = render_preview_error(workflow.preview_error()) {
            lines.push(msg);
        }
        Self {
            view: state.result().map(ResultView::from),
            lines,
            preview_error: workflow.preview_error().cloned(),
            state,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.state, WorkflowState::Succeeded { .. })
    }
}

fn config_store() -> Result<ConfigStore, String> {
    ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .ok_or_else(|| "Could not determine config directory".to_string())
}

fn build_client(config: &AppConfig) -> Result<Arc<DetectionClient>, String> {
    let client = DetectionClient::with_options(config.client_options()).map_err(|e| e.to_string())?;
    info!(base_url = %client.base_url(), "client.ready");
    Ok(Arc::new(client))
}

/// Submit text through a text workflow and wait for it to settle.
pub async fn run_text_detection<S: DetectionService>(service: Arc<S>, content: &str) -> DetectionOutcome {
    let mut workflow = SubmissionWorkflow::text(service);
    workflow.submit(content);
    let state = workflow.settled().await;
    DetectionOutcome::from_workflow(&workflow, state)
}

/// Submit an image URL and, when a loader is given, load its preview alongside.
pub async fn run_image_detection<S: DetectionService>(
    service: Arc<S>,
    preview: Option<&PreviewLoader>,
    image_url: &str,
) -> DetectionOutcome {
    let mut workflow = SubmissionWorkflow::image(service);
    workflow.submit(image_url);

    let uri = image_url.trim();
    let preview_load = async {
        match preview {
            Some(loader) if !uri.is_empty() => Some(loader.load(uri).await),
            _ => None,
        }
    };
    let (state, preview_result) = tokio::join!(workflow.settled(), preview_load);

    if let Some(Err(e)) = preview_result {
        workflow.image_load_failed(uri, e);
    }
    DetectionOutcome::from_workflow(&workflow, state)
}

pub async fn detect_text(content: String) -> Result<DetectionOutcome, String> {
    let config = get_config()?;
    let client = build_client(&config)?;
    Ok(run_text_detection(client, &content).await)
}

pub async fn detect_image(image_url: String, check_preview: bool) -> Result<DetectionOutcome, String> {
    let config = get_config()?;
    let client = build_client(&config)?;
    let loader = check_preview.then(PreviewLoader::default);
    Ok(run_image_detection(client, loader.as_ref(), &image_url).await)
}

pub async fn service_health() -> Result<HealthStatus, String> {
    let config = get_config()?;
    let client = build_client(&config)?;
    client.health().await.map_err(|e| e.to_string())
}

pub fn get_config() -> Result<AppConfig, String> {
    config_store()?.load().map_err(|e| e.to_string())
}

pub fn save_config(config: AppConfig) -> Result<(), String> {
    config_store()?.save(&config).map_err(|e| e.to_string())
}

pub fn get_service_url() -> Result<String, String> {
    let stored = config_store()?.get_service_url().map_err(|e| e.to_string())?;
    Ok(crate::services::resolve_base_url(stored.as_deref()))
}

pub fn set_service_url(url: String) -> Result<(), String> {
    config_store()?.set_service_url(&url).map_err(|e| e.to_string())
}

pub fn set_detection_threshold(threshold: f64) -> Result<AppConfig, String> {
    config_store()?
        .set_detection_threshold(threshold)
        .map_err(|e| e.to_string())
}

pub fn store_api_key(key: String) -> Result<(), String> {
    config_store()?.set_api_key(&key).map_err(|e| e.to_string())
}

pub fn get_api_key() -> Result<Option<String>, String> {
    config_store()?.get_api_key().map_err(|e| e.to_string())
}

pub fn delete_api_key() -> Result<(), String> {
    config_store()?.delete_api_key().map_err(|e| e.to_string())
}
