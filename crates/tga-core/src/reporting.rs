use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::compliance::{project_score, summarize, ComplianceSummary};
use crate::domain::{
    BuildingCategory, ComplianceResult, DesignArtifact, Discipline, Project, Region,
};

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Artifact listing entry in results.json.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactEntry {
    pub id: String,
    pub discipline: Discipline,
    pub file_name: String,
    pub size_bytes: u64,
    pub inputs_digest: String,
}

impl From<&DesignArtifact> for ArtifactEntry {
    fn from(artifact: &DesignArtifact) -> Self {
        Self {
            id: artifact.id.clone(),
            discipline: artifact.discipline,
            file_name: artifact.file_name.clone(),
            size_bytes: artifact.size_bytes,
            inputs_digest: artifact.metadata.inputs_digest.clone(),
        }
    }
}

/// Canonical results of one pipeline run, written as results.json and
/// rendered as compliance_report.md.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub run_id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub category: BuildingCategory,
    pub region: Region,
    pub standards_version: Option<String>,
    pub status: String,
    pub artifacts: Vec<ArtifactEntry>,
    pub summary: Vec<ComplianceSummary>,
    pub project_score: Option<f64>,
    pub compliance: Vec<ComplianceResult>,
    pub notices: Vec<String>,
    pub errors: Vec<String>,
}

impl RunReport {
    /// Report skeleton for `project`; summary and score derive from `compliance`.
    pub fn new(
        run_id: Uuid,
        project: &Project,
        artifacts: &[DesignArtifact],
        compliance: Vec<ComplianceResult>,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            run_id,
            project_id: project.id,
            project_name: project.name.clone(),
            category: project.category,
            region: project.region,
            standards_version: None,
            status: "processing".to_string(),
            artifacts: artifacts.iter().map(ArtifactEntry::from).collect(),
            summary: summarize(&compliance),
            project_score: project_score(&compliance),
            compliance,
            notices: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_standards_version(mut self, version: impl Into<String>) -> Self {
        self.standards_version = Some(version.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_notices(mut self, notices: Vec<String>) -> Self {
        self.notices = notices;
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

/// Write results.json in pretty JSON format.
pub fn write_results_json(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize run report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

fn score_cell(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{s:.1}"),
        None => "n/a".to_string(),
    }
}

/// Render the compliance report in markdown.
pub fn render_compliance_report_md(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str("# Compliance Report\n\n");
    out.push_str(&format!(
        "- project: {} ({}, {})\n- standards: {}\n- status: {}\n- project score: {}\n\n",
        report.project_name,
        report.category,
        report.region,
        report.standards_version.as_deref().unwrap_or("n/a"),
        report.status,
        score_cell(report.project_score),
    ));

    out.push_str("## Disciplines\n");
    out.push_str("| Discipline | Clauses | Passed | Violations | Score |\n");
    out.push_str("|---|---|---|---|---|\n");
    for s in &report.summary {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            s.discipline.display_name(),
            s.evaluated,
            s.passed,
            s.violations,
            score_cell(s.mean_score),
        ));
    }
    out.push('\n');

    let failed: Vec<&ComplianceResult> = report.compliance.iter().filter(|r| !r.passed).collect();
    if !failed.is_empty() {
        out.push_str("## Findings\n");
        for result in failed {
            out.push_str(&format!(
                "### {} {} (score {})\n",
                result.clause_id, result.title, result.score
            ));
            for v in &result.violations {
                out.push_str(&format!("- `{}`: {}\n", v.check_id, v.message));
            }
            for rec in &result.recommendations {
                out.push_str(&format!("- recommendation: {}\n", rec));
            }
            out.push('\n');
        }
    }

    if !report.notices.is_empty() {
        out.push_str("## Notices\n");
        for n in &report.notices {
            out.push_str(&format!("- {}\n", n));
        }
        out.push('\n');
    }

    if !report.errors.is_empty() {
        out.push_str("## Errors\n");
        for e in &report.errors {
            out.push_str(&format!("- {}\n", e));
        }
        out.push('\n');
    }
    out
}
