// Workflow State
// The single observable state of one submission form

use crate::models::{DetectionRequest, DetectionResult};
use crate::services::detection_client::ClientError;
use crate::services::validator::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a submission ended in `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum WorkflowState {
    #[default]
    Idle,
    Pending { request: DetectionRequest },
    Succeeded { result: DetectionResult },
    Failed { reason: FailureReason },
}

impl WorkflowState {
    pub fn is_pending(&self) -> bool {
        matches!(self, WorkflowState::Pending { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded { .. } | WorkflowState::Failed { .. })
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            WorkflowState::Succeeded { result } => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            WorkflowState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Pending { .. } => "pending",
            WorkflowState::Succeeded { .. } => "succeeded",
            WorkflowState::Failed { .. } => "failed",
        }
    }
}

impl From<Result<DetectionResult, ClientError>> for WorkflowState {
    fn from(outcome: Result<DetectionResult, ClientError>) -> Self {
        match outcome {
            Ok(result) => WorkflowState::Succeeded { result },
            Err(e) => WorkflowState::Failed { reason: e.into() },
        }
    }
}
