//! Standards dataset schema and load-time validation.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{BuildingCategory, Discipline, Region, StandardsError};

/// Issuing body of a standard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum StandardBody {
    Din,
    Vdi,
    Vob,
    En,
    Iso,
    Iec,
    Asr,
    Mbo,
    Geg,
}

impl fmt::Display for StandardBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StandardBody::Din => "DIN",
            StandardBody::Vdi => "VDI",
            StandardBody::Vob => "VOB",
            StandardBody::En => "EN",
            StandardBody::Iso => "ISO",
            StandardBody::Iec => "IEC",
            StandardBody::Asr => "ASR",
            StandardBody::Mbo => "MBO",
            StandardBody::Geg => "GEG",
        };
        f.write_str(s)
    }
}

/// Where a check reads its metric from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckScope {
    /// Artifact summary metrics; the metric must be present.
    Project,
    /// Every room calculation that carries the metric.
    Room,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    AtLeast,
    AtMost,
    Equals,
    /// Metric must be non-zero (boolean flags encoded as 0/1).
    Required,
}

impl Comparison {
    const EQUALS_TOLERANCE: f64 = 1e-6;

    pub fn holds(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => actual >= threshold,
            Comparison::AtMost => actual <= threshold,
            Comparison::Equals => (actual - threshold).abs() <= Self::EQUALS_TOLERANCE,
            Comparison::Required => actual != 0.0,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::AtLeast => "≥",
            Comparison::AtMost => "≤",
            Comparison::Equals => "=",
            Comparison::Required => "required",
        }
    }
}

/// One machine-checkable requirement of a clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleCheck {
    pub id: String,
    pub metric: String,
    pub scope: CheckScope,
    pub comparison: Comparison,
    #[serde(default)]
    pub threshold: f64,
    /// Score deduction when violated, 1..=100.
    pub weight: u8,
    pub description: String,
    pub recommendation: String,
}

/// Regions, categories and disciplines a clause applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Applicability {
    pub regions: Vec<Region>,
    /// Empty means every building category.
    #[serde(default)]
    pub categories: Vec<BuildingCategory>,
    pub disciplines: Vec<Discipline>,
}

impl Applicability {
    pub fn matches(&self, region: Region, category: BuildingCategory, discipline: Discipline) -> bool {
        self.regions.contains(&region)
            && (self.categories.is_empty() || self.categories.contains(&category))
            && self.disciplines.contains(&discipline)
    }
}

/// A normative requirement from a technical standard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardClause {
    /// Unique id, e.g. `DIN 18015-2 §5`.
    pub id: String,
    /// Standard designation, e.g. `DIN 18015-2`.
    pub standard: String,
    pub title: String,
    pub body: StandardBody,
    pub applicability: Applicability,
    pub checks: Vec<RuleCheck>,
}

/// A versioned, immutable set of clauses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardsSet {
    pub version: String,
    pub clauses: Vec<StandardClause>,
}

impl StandardsSet {
    /// Reject datasets that would make evaluation ambiguous.
    pub fn validate(&self) -> Result<(), StandardsError> {
        let invalid = |msg: String| Err(StandardsError::InvalidDataset(msg));
        if self.version.trim().is_empty() {
            return invalid("dataset version is empty".to_string());
        }
        let mut clause_ids = HashSet::new();
        for clause in &self.clauses {
            if !clause_ids.insert(clause.id.as_str()) {
                return invalid(format!("duplicate clause id '{}'", clause.id));
            }
            if clause.applicability.regions.is_empty() {
                return invalid(format!("clause '{}' applies to no region", clause.id));
            }
            if clause.applicability.disciplines.is_empty() {
                return invalid(format!("clause '{}' applies to no discipline", clause.id));
            }
            if clause.checks.is_empty() {
                return invalid(format!("clause '{}' has no checks", clause.id));
            }
            let mut check_ids = HashSet::new();
            for check in &clause.checks {
                if !check_ids.insert(check.id.as_str()) {
                    return invalid(format!(
                        "clause '{}' repeats check id '{}'",
                        clause.id, check.id
                    ));
                }
                if !(1..=100).contains(&check.weight) {
                    return invalid(format!(
                        "check '{}' of clause '{}' has weight {} outside 1..=100",
                        check.id, clause.id, check.weight
                    ));
                }
                if check.metric.trim().is_empty() {
                    return invalid(format!("check '{}' names no metric", check.id));
                }
                if !check.threshold.is_finite() {
                    return invalid(format!("check '{}' has a non-finite threshold", check.id));
                }
            }
        }
        Ok(())
    }
}
