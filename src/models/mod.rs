// Toxiscope Data Models
// Request, verdict and wire schemas shared by the validator, client and workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language tag attached to every text submission.
pub const DEFAULT_LANGUAGE: &str = "en";
/// Content type attached to every image submission, regardless of the actual bytes.
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

// ============ Modality ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
        }
    }

    /// Service path for this modality, relative to the configured base URL.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Modality::Text => "/detect/text",
            Modality::Image => "/detect/image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Detection Request ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum DetectionRequest {
    Text { content: String, language: String },
    Image { source_uri: String, content_type: String },
}

/// JSON body sent to the detection service.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DetectionPayload<'a> {
    Text {
        text: &'a str,
        language: &'a str,
    },
    Image {
        image_url: &'a str,
        content_type: &'a str,
    },
}

impl DetectionRequest {
    pub fn modality(&self) -> Modality {
        match self {
            DetectionRequest::Text { .. } => Modality::Text,
            DetectionRequest::Image { .. } => Modality::Image,
        }
    }

    pub fn payload(&self) -> DetectionPayload<'_> {
        match self {
            DetectionRequest::Text { content, language } => DetectionPayload::Text {
                text: content,
                language,
            },
            DetectionRequest::Image {
                source_uri,
                content_type,
            } => DetectionPayload::Image {
                image_url: source_uri,
                content_type,
            },
        }
    }

    /// Image URI for image requests.
    pub fn source_uri(&self) -> Option<&str> {
        match self {
            DetectionRequest::Image { source_uri, .. } => Some(source_uri),
            DetectionRequest::Text { .. } => None,
        }
    }

    /// Character count of the submitted item, used for logging only.
    pub fn input_chars(&self) -> usize {
        match self {
            DetectionRequest::Text { content, .. } => content.chars().count(),
            DetectionRequest::Image { source_uri, .. } => source_uri.chars().count(),
        }
    }
}

// ============ Detection Result ============

/// Verdict as returned on the wire. Converted into [`DetectionResult`] after range checks.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionResponse {
    pub is_toxic: bool,
    pub categories: Vec<String>,
    pub confidence: f64,
    pub severity: f64,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_toxic: bool,
    /// Service order is preserved.
    pub categories: Vec<String>,
    pub confidence: f64,
    /// Independent of `confidence`; both are opaque service scores.
    pub severity: f64,
    pub explanation: String,
}

impl DetectionResult {
    /// Parse and validate a raw response body.
    pub fn from_json(body: &str) -> Result<Self, String> {
        let response: DetectionResponse =
            serde_json::from_str(body).map_err(|e| format!("invalid verdict body: {}", e))?;
        Self::try_from(response)
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<f64, String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} out of range [0, 1]: {}", field, value))
    }
}

impl TryFrom<DetectionResponse> for DetectionResult {
    type Error = String;

    fn try_from(response: DetectionResponse) -> Result<Self, Self::Error> {
        let confidence = check_unit_interval("confidence", response.confidence)?;
        let severity = check_unit_interval("severity", response.severity)?;

        Ok(Self {
            is_toxic: response.is_toxic,
            categories: response.categories,
            confidence,
            severity,
            explanation: response.explanation.unwrap_or_default(),
        })
    }
}

// ============ Service Health ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub version: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}
