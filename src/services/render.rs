// Result Rendering
// Operator-facing text for verdicts and workflow states

use crate::models::DetectionResult;
use crate::services::workflow::{PreviewLoadError, WorkflowState};
use serde::Serialize;

pub const NO_CATEGORIES: &str = "None detected";
pub const RETRY_PROMPT: &str = "Error detecting toxicity. Please try again.";
pub const PREVIEW_ERROR_PROMPT: &str = "Error loading image. Please check the URL.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub is_toxic: String,
    pub categories: String,
    pub confidence: String,
    pub severity: String,
    pub explanation: String,
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

impl From<&DetectionResult> for ResultView {
    fn from(result: &DetectionResult) -> Self {
        let categories = if result.categories.is_empty() {
            NO_CATEGORIES.to_string()
        } else {
            result.categories.join(", ")
        };

        Self {
            is_toxic: if result.is_toxic { "Yes" } else { "No" }.to_string(),
            categories,
            confidence: percent(result.confidence),
            severity: percent(result.severity),
            explanation: result.explanation.clone(),
        }
    }
}

impl ResultView {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Is Toxic: {}", self.is_toxic),
            format!("Categories: {}", self.categories),
            format!("Confidence: {}", self.confidence),
            format!("Severity: {}", self.severity),
            format!("Explanation: {}", self.explanation),
        ]
    }
}

/// Lines shown for a workflow state. Failures collapse to a generic retry prompt.
pub fn render_state(state: &WorkflowState) -> Vec<String> {
    match state {
        WorkflowState::Idle => vec![],
        WorkflowState::Pending { .. } => vec!["Analyzing...".to_string()],
        WorkflowState::Succeeded { result } => {
            let mut lines = vec!["Detection Results".to_string()];
            lines.extend(ResultView::from(result).lines());
            lines
        }
        WorkflowState::Failed { .. } => vec![RETRY_PROMPT.to_string()],
    }
}

pub fn render_preview_error(error: Option<&PreviewLoadError>) -> Option<String> {
    error.map(|_| PREVIEW_ERROR_PROMPT.to_string())
}
