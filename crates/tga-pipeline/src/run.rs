//! Pipeline run state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tga_core::{ComplianceResult, DesignArtifact, Discipline, Project, RunReport};
use uuid::Uuid;

use crate::stage::{StageId, StageState};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Processing,
    Completed,
    Error,
}

impl RunStatus {
    pub fn name(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a run ended in `error`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The run was cancelled; artifacts finished before that are kept.
    Cancelled,
    /// A run-wide stage failed and later stages never ran.
    StageFailed { stage: String, reason: String },
    /// Every stage ran but some disciplines recorded errors.
    DisciplineErrors { count: usize },
}

/// A stage or discipline error recorded on the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunError {
    pub stage: String,
    pub discipline: Option<Discipline>,
    pub message: String,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.discipline {
            Some(d) => write!(f, "[{} / {}] {}", self.stage, d.code(), self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// A rendered output document of the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunDocument {
    pub name: String,
    pub media_type: String,
    pub content: String,
}

/// Full observable state of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRun {
    pub id: Uuid,
    pub project_id: Uuid,
    pub stages: Vec<StageState>,
    pub status: RunStatus,
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub standards_version: Option<String>,
    /// Ordered by discipline priority.
    pub artifacts: Vec<DesignArtifact>,
    pub compliance: Vec<ComplianceResult>,
    pub project_score: Option<f64>,
    pub errors: Vec<RunError>,
    pub notices: Vec<String>,
    pub documents: Vec<RunDocument>,
    pub report: Option<RunReport>,
}

impl PipelineRun {
    pub fn new(id: Uuid, project: &Project) -> Self {
        let disciplines = project.ordered_disciplines();
        Self {
            id,
            project_id: project.id,
            stages: StageId::plan(&disciplines)
                .into_iter()
                .map(StageState::pending)
                .collect(),
            status: RunStatus::Idle,
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            standards_version: None,
            artifacts: Vec::new(),
            compliance: Vec::new(),
            project_score: None,
            errors: Vec::new(),
            notices: Vec::new(),
            documents: Vec::new(),
            report: None,
        }
    }

    pub fn stage(&self, id: StageId) -> Option<&StageState> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub(crate) fn stage_mut(&mut self, id: StageId) -> Option<&mut StageState> {
        self.stages.iter_mut().find(|s| s.id == id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn artifact(&self, discipline: Discipline) -> Option<&DesignArtifact> {
        self.artifacts.iter().find(|a| a.discipline == discipline)
    }

    pub fn document(&self, name: &str) -> Option<&RunDocument> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// Mean progress over all stages.
    pub fn progress(&self) -> u8 {
        if self.stages.is_empty() {
            return 0;
        }
        let total: u32 = self.stages.iter().map(|s| u32::from(s.progress)).sum();
        (total / self.stages.len() as u32) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tga_core::{BuildingCategory, Region};

    #[test]
    fn test_new_run_is_idle_with_pending_stages() {
        let project = Project::new(
            "HQ",
            BuildingCategory::Office,
            1000.0,
            3,
            Region::Germany,
            [Discipline::Hydraulic, Discipline::Electrical],
        );
        let run = PipelineRun::new(Uuid::new_v4(), &project);
        assert_eq!(run.status, RunStatus::Idle);
        assert_eq!(run.stages.len(), 7);
        assert_eq!(run.stages[3].name, "generate:EL");
        assert_eq!(run.stages[4].name, "generate:HY");
        assert!(run.stages.iter().all(|s| s.progress == 0));
        assert_eq!(run.progress(), 0);
        assert!(!run.is_terminal());
    }

    #[test]
    fn test_failure_reason_serde() {
        let json = serde_json::to_value(FailureReason::Cancelled).expect("serialize");
        assert_eq!(json["kind"], "cancelled");
    }
}
