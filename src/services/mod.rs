// Toxiscope Core Services

pub mod config_store;
pub mod detection_client;
pub mod render;
pub mod validator;
pub mod workflow;

pub use config_store::*;
pub use detection_client::*;
pub use render::*;
pub use validator::*;

pub use workflow::{
    FailureReason,
    PreviewLoadError,
    PreviewLoader,
    SubmissionWorkflow,
    WorkflowState,
};
