// Detection Client
// Issues detection requests against the moderation service and types the outcome

use crate::models::{DetectionRequest, DetectionResult, HealthStatus};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SERVICE_URL_ENV: &str = "TOXISCOPE_API_URL";

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("service rejected request: {status} - {message}")]
    ServiceRejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connect"
        } else if e.is_builder() {
            "request"
        } else {
            "transport"
        };
        ClientError::Network(format!("{}: {}", kind, e))
    }
}

/// Anything able to turn a [`DetectionRequest`] into a verdict.
///
/// The workflow is generic over this so the HTTP client can be swapped for a
/// scripted service in tests.
#[async_trait]
pub trait DetectionService: Send + Sync + 'static {
    async fn submit(&self, request: DetectionRequest) -> Result<DetectionResult, ClientError>;
}

/// Resolve the service base URL.
///
/// Runtime env var wins, then the stored setting, then the URL baked in at
/// build time, then the local default.
pub fn resolve_base_url(configured: Option<&str>) -> String {
    let from_env = env::var(SERVICE_URL_ENV).ok().filter(|v| !v.trim().is_empty());
    let url = from_env
        .or_else(|| configured.map(str::to_string).filter(|v| !v.trim().is_empty()))
        .or_else(|| option_env!("TOXISCOPE_API_URL").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
    url.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: resolve_base_url(None),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

pub struct DetectionClient {
    client: Client,
    base_url: String,
}

impl Default for DetectionClient {
    fn default() -> Self {
        Self::new(resolve_base_url(None))
    }
}

impl DetectionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_options(options: ClientOptions) -> Result<Self, ClientError> {
        let mut builder = Client::builder().timeout(options.timeout);
        if let Some(proxy_url) = options.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ClientError::Network(format!("invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST one request and map the outcome. Single attempt, no retries.
    pub async fn detect(&self, request: &DetectionRequest) -> Result<DetectionResult, ClientError> {
        let modality = request.modality();
        let url = self.endpoint(modality.endpoint_path());
        debug!(url = %url, modality = %modality, chars = request.input_chars(), "detect.request");

        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request.payload())
            .send()
            .await
            .map_err(|e| {
                let err = ClientError::from(e);
                warn!(modality = %modality, error = %err, "detect.transport_failed");
                err
            })?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(modality = %modality, status = status.as_u16(), latency_ms, "detect.rejected");
            return Err(ClientError::ServiceRejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let result = DetectionResult::from_json(&body).map_err(|e| {
            warn!(modality = %modality, latency_ms, error = %e, "detect.malformed_response");
            ClientError::MalformedResponse(e)
        })?;

        info!(
            modality = %modality,
            latency_ms,
            is_toxic = result.is_toxic,
            categories = result.categories.len(),
            "detect.completed"
        );
        Ok(result)
    }

    /// Query the service health endpoint.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self.client.get(self.endpoint("/health")).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::ServiceRejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl DetectionService for DetectionClient {
    async fn submit(&self, request: DetectionRequest) -> Result<DetectionResult, ClientError> {
        self.detect(&request).await
    }
}
