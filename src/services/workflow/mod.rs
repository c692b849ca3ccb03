// Submission Workflow
// - state: the observable workflow state and failure taxonomy
// - controller: one generic controller per form, parameterized over modality
// - preview: image retrievability checks, reported separately from detection

pub mod controller;
pub mod preview;
pub mod state;

pub use controller::SubmissionWorkflow;
pub use preview::{PreviewLoadError, PreviewLoader};
pub use state::{FailureReason, WorkflowState};
