//! Pipeline stage definitions and per-stage state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tga_core::Discipline;

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "stage", content = "discipline", rename_all = "snake_case")]
pub enum StageId {
    Ingest,
    Extract,
    LoadStandards,
    /// One stage per selected discipline; these run concurrently.
    Generate(Discipline),
    Validate,
    Document,
}

impl StageId {
    /// Stable stage name, e.g. `generate:EL`.
    pub fn name(&self) -> String {
        match self {
            StageId::Ingest => "ingest".to_string(),
            StageId::Extract => "extract".to_string(),
            StageId::LoadStandards => "load_standards".to_string(),
            StageId::Generate(d) => format!("generate:{}", d.code()),
            StageId::Validate => "validate".to_string(),
            StageId::Document => "document".to_string(),
        }
    }

    /// Ordered stage list for the given disciplines.
    pub fn plan(disciplines: &[Discipline]) -> Vec<StageId> {
        let mut stages = vec![StageId::Ingest, StageId::Extract, StageId::LoadStandards];
        stages.extend(disciplines.iter().copied().map(StageId::Generate));
        stages.push(StageId::Validate);
        stages.push(StageId::Document);
        stages
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
    Error,
}

impl StageStatus {
    pub fn name(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Active => "active",
            StageStatus::Completed => "completed",
            StageStatus::Error => "error",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Error)
    }

    /// Allowed transitions: pending → active → completed | error, and
    /// pending → error for stages abandoned before they started.
    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Pending, StageStatus::Active)
                | (StageStatus::Pending, StageStatus::Error)
                | (StageStatus::Active, StageStatus::Active)
                | (StageStatus::Active, StageStatus::Completed)
                | (StageStatus::Active, StageStatus::Error)
        )
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observable state of one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageState {
    pub id: StageId,
    pub name: String,
    pub status: StageStatus,
    /// 0..=100
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StageState {
    pub fn pending(id: StageId) -> Self {
        Self {
            name: id.name(),
            id,
            status: StageStatus::Pending,
            progress: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_order() {
        let plan = StageId::plan(&[Discipline::Electrical, Discipline::Hydraulic]);
        let names: Vec<String> = plan.iter().map(StageId::name).collect();
        assert_eq!(
            names,
            vec![
                "ingest",
                "extract",
                "load_standards",
                "generate:EL",
                "generate:HY",
                "validate",
                "document"
            ]
        );
    }

    #[test]
    fn test_transitions() {
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Active));
        assert!(StageStatus::Active.can_transition_to(StageStatus::Completed));
        assert!(!StageStatus::Completed.can_transition_to(StageStatus::Active));
        assert!(!StageStatus::Error.can_transition_to(StageStatus::Completed));
        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Completed));
    }

    #[test]
    fn test_stage_serde() {
        let json = serde_json::to_value(StageId::Generate(Discipline::Hvac)).expect("serialize");
        assert_eq!(json["stage"], "generate");
        assert_eq!(json["discipline"], "hvac");
    }
}
