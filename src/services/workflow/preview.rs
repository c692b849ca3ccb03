// Image Preview
// Checks whether the pixels at a submitted image URI can be fetched for display.
// Kept apart from detection: a preview failure never changes the workflow state.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const PREVIEW_TIMEOUT_SECS: u64 = 15;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviewLoadError {
    #[error("image could not be fetched: {0}")]
    Unreachable(String),
    #[error("image request returned status {0}")]
    BadStatus(u16),
    #[error("resource is not an image (content type: {0})")]
    NotAnImage(String),
    #[error("image body is empty")]
    EmptyBody,
}

pub struct PreviewLoader {
    client: Client,
}

impl Default for PreviewLoader {
    fn default() -> Self {
        Self::new(Duration::from_secs(PREVIEW_TIMEOUT_SECS))
    }
}

impl PreviewLoader {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { client }
    }

    /// Fetch the resource and return its size in bytes if it renders as an image.
    pub async fn load(&self, source_uri: &str) -> Result<usize, PreviewLoadError> {
        let response = self
            .client
            .get(source_uri)
            .send()
            .await
            .map_err(|e| PreviewLoadError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreviewLoadError::BadStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            let shown = if content_type.is_empty() { "unknown".to_string() } else { content_type };
            return Err(PreviewLoadError::NotAnImage(shown));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PreviewLoadError::Unreachable(e.to_string()))?;
        if bytes.is_empty() {
            return Err(PreviewLoadError::EmptyBody);
        }

        debug!(uri = %source_uri, bytes = bytes.len(), content_type = %content_type, "preview.loaded");
        Ok(bytes.len())
    }
}
