// Input Validator
// Pre-submission checks per modality

use crate::models::{DetectionRequest, Modality, DEFAULT_IMAGE_CONTENT_TYPE, DEFAULT_LANGUAGE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("input is empty")]
    EmptyInput,
}

/// Turn raw form input into a request for the given modality.
///
/// Text is submitted exactly as typed; only the emptiness check trims it.
/// Image URLs are trimmed and otherwise accepted as-is: a malformed URL
/// surfaces later as a preview or service failure.
pub fn validate(modality: Modality, raw_input: &str) -> Result<DetectionRequest, ValidationError> {
    let trimmed = raw_input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let request = match modality {
        Modality::Text => DetectionRequest::Text {
            content: raw_input.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        },
        Modality::Image => DetectionRequest::Image {
            source_uri: trimmed.to_string(),
            content_type: DEFAULT_IMAGE_CONTENT_TYPE.to_string(),
        },
    };
    Ok(request)
}
