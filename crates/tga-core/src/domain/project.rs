//! Project configuration: building category, size, region and disciplines.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::discipline::Discipline;
use crate::domain::error::{ParseVariantError, Result, TgaError};

/// Building use category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BuildingCategory {
    Residential,
    Office,
    Industrial,
    Retail,
    Healthcare,
    Education,
}

impl BuildingCategory {
    pub const ALL: [BuildingCategory; 6] = [
        BuildingCategory::Residential,
        BuildingCategory::Office,
        BuildingCategory::Industrial,
        BuildingCategory::Retail,
        BuildingCategory::Healthcare,
        BuildingCategory::Education,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuildingCategory::Residential => "residential",
            BuildingCategory::Office => "office",
            BuildingCategory::Industrial => "industrial",
            BuildingCategory::Retail => "retail",
            BuildingCategory::Healthcare => "healthcare",
            BuildingCategory::Education => "education",
        }
    }
}

impl fmt::Display for BuildingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildingCategory {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        BuildingCategory::ALL
            .iter()
            .copied()
            .find(|c| c.name() == needle)
            .ok_or(ParseVariantError {
                kind: "building category",
                value: s.to_string(),
            })
    }
}

/// Regulatory region that selects the applicable standards families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Germany,
    Europe,
    International,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Germany, Region::Europe, Region::International];

    pub fn name(&self) -> &'static str {
        match self {
            Region::Germany => "germany",
            Region::Europe => "europe",
            Region::International => "international",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.name() == needle)
            .ok_or(ParseVariantError {
                kind: "region",
                value: s.to_string(),
            })
    }
}

/// A building project submitted for design automation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Unique identifier; also the key for the one-run-per-project rule.
    pub id: Uuid,

    /// Human-readable project name.
    pub name: String,

    pub category: BuildingCategory,

    /// Declared gross floor area in square metres.
    pub total_area_m2: f64,

    /// Number of storeys above ground.
    pub floors: u32,

    pub region: Region,

    /// Selected disciplines, iterated in priority order.
    pub disciplines: BTreeSet<Discipline>,
}

impl Project {
    /// Create a new project with a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        category: BuildingCategory,
        total_area_m2: f64,
        floors: u32,
        region: Region,
        disciplines: impl IntoIterator<Item = Discipline>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
            total_area_m2,
            floors,
            region,
            disciplines: disciplines.into_iter().collect(),
        }
    }

    /// Check the invariants that must hold before a run may start.
    pub fn validate(&self) -> Result<()> {
        if !(self.total_area_m2.is_finite() && self.total_area_m2 > 0.0) {
            return Err(TgaError::InvalidProject(format!(
                "total area must be positive, got {}",
                self.total_area_m2
            )));
        }
        if self.floors < 1 {
            return Err(TgaError::InvalidProject(
                "floor count must be at least 1".to_string(),
            ));
        }
        if self.disciplines.is_empty() {
            return Err(TgaError::InvalidProject(
                "at least one discipline must be selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Selected disciplines ordered by priority.
    pub fn ordered_disciplines(&self) -> Vec<Discipline> {
        self.disciplines.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> Project {
        Project::new(
            "HQ",
            BuildingCategory::Office,
            1000.0,
            3,
            Region::Germany,
            [Discipline::Hydraulic, Discipline::Electrical],
        )
    }

    #[test]
    fn test_valid_project_passes() {
        assert!(office().validate().is_ok());
    }

    #[test]
    fn test_empty_disciplines_rejected() {
        let mut project = office();
        project.disciplines.clear();
        let err = project.validate().unwrap_err();
        assert!(err.to_string().contains("discipline"));
    }

    #[test]
    fn test_non_positive_area_rejected() {
        let mut project = office();
        project.total_area_m2 = 0.0;
        assert!(project.validate().is_err());
        project.total_area_m2 = f64::NAN;
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_zero_floors_rejected() {
        let mut project = office();
        project.floors = 0;
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_disciplines_ordered_by_priority() {
        assert_eq!(
            office().ordered_disciplines(),
            vec![Discipline::Electrical, Discipline::Hydraulic]
        );
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Office".parse::<BuildingCategory>(), Ok(BuildingCategory::Office));
        assert_eq!("germany".parse::<Region>(), Ok(Region::Germany));
        assert!("mars".parse::<Region>().is_err());
    }
}
