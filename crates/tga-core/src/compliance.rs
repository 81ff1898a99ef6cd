//! Compliance validator.
//!
//! Evaluates a [`DesignArtifact`] against the clauses applicable to its
//! discipline. The artifact payload is decoded from bytes, so the validator
//! never sees generator internals. Each clause yields one
//! [`ComplianceResult`]; its score starts at 100 and loses the weight of
//! every violated check, saturating at 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{
    ArtifactDocument, ComplianceResult, DesignArtifact, Discipline, ValidationError, Violation,
};
use crate::standards::{CheckScope, Comparison, RuleCheck, StandardClause};

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate `artifact` against `clauses`, one result per clause in input order.
///
/// Fails when the payload cannot be decoded, when it belongs to a different
/// discipline than the artifact claims, or when a project-scope metric a
/// clause needs is absent.
pub fn validate_artifact(
    artifact: &DesignArtifact,
    clauses: &[StandardClause],
) -> Result<Vec<ComplianceResult>, ValidationError> {
    let invalid = |reason: String| ValidationError {
        discipline: artifact.discipline,
        artifact_id: artifact.id.clone(),
        reason,
    };
    let document = artifact
        .document()
        .map_err(|e| invalid(format!("payload is not a readable artifact document: {e}")))?;
    if document.discipline != artifact.discipline {
        return Err(invalid(format!(
            "payload belongs to {} but artifact is {}",
            document.discipline, artifact.discipline
        )));
    }

    clauses
        .iter()
        .map(|clause| evaluate_clause(artifact, &document, clause).map_err(&invalid))
        .collect()
}

fn evaluate_clause(
    artifact: &DesignArtifact,
    document: &ArtifactDocument,
    clause: &StandardClause,
) -> Result<ComplianceResult, String> {
    let mut violations = Vec::new();
    let mut recommendations = Vec::new();
    let mut deduction: u32 = 0;

    for check in &clause.checks {
        let found: Vec<Violation> = match check.scope {
            CheckScope::Project => {
                let actual = document.metric(&check.metric).ok_or_else(|| {
                    format!(
                        "clause '{}' check '{}' needs metric '{}' which the artifact lacks",
                        clause.id, check.id, check.metric
                    )
                })?;
                check_value(clause, check, None, actual).into_iter().collect()
            }
            CheckScope::Room => document
                .rooms
                .iter()
                .filter_map(|room| {
                    let actual = room.metrics.get(&check.metric)?;
                    check_value(clause, check, Some(&room.room_id), *actual)
                })
                .collect(),
        };
        if !found.is_empty() {
            deduction += u32::from(check.weight);
            recommendations.push(format!(
                "[{} / {}] {}",
                clause.id, check.id, check.recommendation
            ));
            violations.extend(found);
        }
    }

    let score = 100u32.saturating_sub(deduction) as u8;
    Ok(ComplianceResult {
        standard: clause.standard.clone(),
        clause_id: clause.id.clone(),
        title: clause.title.clone(),
        discipline: document.discipline,
        artifact_id: artifact.id.clone(),
        passed: violations.is_empty(),
        score,
        violations,
        recommendations,
    })
}

fn check_value(
    clause: &StandardClause,
    check: &RuleCheck,
    room_id: Option<&str>,
    actual: f64,
) -> Option<Violation> {
    if check.comparison.holds(actual, check.threshold) {
        return None;
    }
    let subject = match room_id {
        Some(id) => format!("room {id}: "),
        None => String::new(),
    };
    let message = match check.comparison {
        Comparison::Required => format!("{subject}{} is required but missing", check.metric),
        _ => format!(
            "{subject}{} = {} violates {} {}",
            check.metric,
            round_for_display(actual),
            check.comparison.symbol(),
            round_for_display(check.threshold),
        ),
    };
    Some(Violation {
        clause_id: clause.id.clone(),
        check_id: check.id.clone(),
        metric: check.metric.clone(),
        room_id: room_id.map(str::to_string),
        actual: Some(actual),
        threshold: check.threshold,
        message,
    })
}

fn round_for_display(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Arithmetic mean of all scores; `None` without results.
pub fn project_score(results: &[ComplianceResult]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let total: f64 = results.iter().map(|r| f64::from(r.score)).sum();
    Some(total / results.len() as f64)
}

/// Per-discipline roll-up of compliance results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceSummary {
    pub discipline: Discipline,
    pub evaluated: usize,
    pub passed: usize,
    pub violations: usize,
    pub mean_score: Option<f64>,
}

/// Summaries in discipline priority order.
pub fn summarize(results: &[ComplianceResult]) -> Vec<ComplianceSummary> {
    let mut grouped: BTreeMap<Discipline, Vec<&ComplianceResult>> = BTreeMap::new();
    for result in results {
        grouped.entry(result.discipline).or_default().push(result);
    }
    grouped
        .into_iter()
        .map(|(discipline, items)| {
            let total: f64 = items.iter().map(|r| f64::from(r.score)).sum();
            ComplianceSummary {
                discipline,
                evaluated: items.len(),
                passed: items.iter().filter(|r| r.passed).count(),
                violations: items.iter().map(|r| r.violations.len()).sum(),
                mean_score: Some(total / items.len() as f64),
            }
        })
        .collect()
}
