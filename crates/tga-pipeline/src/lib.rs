//! TGA Pipeline - stage orchestration for design runs
//!
//! Drives one run per project through:
//! - ingest and extract (run-wide, failure ends the run)
//! - standards loading
//! - one generator stage per selected discipline, executed in parallel
//! - validation and report rendering
//!
//! Progress is observable via snapshots and broadcast events; runs can be
//! cancelled.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod run;
pub mod stage;

// Re-export key types
pub use error::{PipelineError, PipelineResult};
pub use events::ProgressEvent;
pub use orchestrator::{Orchestrator, RunHandle, REPORT_DOCUMENT};
pub use run::{FailureReason, PipelineRun, RunDocument, RunError, RunStatus};
pub use stage::{StageId, StageState, StageStatus};
