//! Error types for the pipeline orchestrator.

use tga_core::TgaError;
use uuid::Uuid;

/// Errors returned when starting or awaiting a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid project: {0}")]
    InvalidProject(String),

    #[error("project {project_id} already has an active run {run_id}")]
    RunAlreadyActive { project_id: Uuid, run_id: Uuid },

    #[error("run task failed: {0}")]
    RunTask(String),
}

impl From<TgaError> for PipelineError {
    fn from(err: TgaError) -> Self {
        match err {
            TgaError::InvalidProject(msg) => PipelineError::InvalidProject(msg),
            other => PipelineError::RunTask(other.to_string()),
        }
    }
}

/// Result type for orchestrator operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
