//! Compliance results produced by the validator.

use serde::{Deserialize, Serialize};

use crate::domain::discipline::Discipline;

/// A failed check, traceable to its clause, check and metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub clause_id: String,
    pub check_id: String,
    pub metric: String,
    /// Room the violation applies to; `None` for project-scope checks.
    pub room_id: Option<String>,
    pub actual: Option<f64>,
    pub threshold: f64,
    pub message: String,
}

/// Scored outcome of one clause evaluated against one artifact.
///
/// # Invariants
///
/// `score` is in `0..=100`; `score == 100` implies `violations` is empty,
/// and `passed` is true exactly when `violations` is empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceResult {
    pub standard: String,
    pub clause_id: String,
    pub title: String,
    pub discipline: Discipline,
    pub artifact_id: String,
    pub passed: bool,
    pub score: u8,
    pub violations: Vec<Violation>,
    pub recommendations: Vec<String>,
}
