//! Engineering disciplines handled by the pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::ParseVariantError;

/// Closed set of engineering disciplines.
///
/// Variants are declared in priority order, so the derived `Ord` matches
/// [`Discipline::priority`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Architecture,
    Structural,
    Electrical,
    Hydraulic,
    Hvac,
    FireProtection,
    Automation,
    Lighting,
}

impl Discipline {
    pub const ALL: [Discipline; 8] = [
        Discipline::Architecture,
        Discipline::Structural,
        Discipline::Electrical,
        Discipline::Hydraulic,
        Discipline::Hvac,
        Discipline::FireProtection,
        Discipline::Automation,
        Discipline::Lighting,
    ];

    /// Two-letter discipline code used in file and artifact names.
    pub fn code(&self) -> &'static str {
        match self {
            Discipline::Architecture => "AR",
            Discipline::Structural => "ST",
            Discipline::Electrical => "EL",
            Discipline::Hydraulic => "HY",
            Discipline::Hvac => "HV",
            Discipline::FireProtection => "FP",
            Discipline::Automation => "GA",
            Discipline::Lighting => "LI",
        }
    }

    /// Stable snake_case identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Discipline::Architecture => "architecture",
            Discipline::Structural => "structural",
            Discipline::Electrical => "electrical",
            Discipline::Hydraulic => "hydraulic",
            Discipline::Hvac => "hvac",
            Discipline::FireProtection => "fire_protection",
            Discipline::Automation => "automation",
            Discipline::Lighting => "lighting",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Discipline::Architecture => "Architecture",
            Discipline::Structural => "Structural",
            Discipline::Electrical => "Electrical",
            Discipline::Hydraulic => "Hydraulic",
            Discipline::Hvac => "HVAC",
            Discipline::FireProtection => "Fire Protection",
            Discipline::Automation => "Building Automation",
            Discipline::Lighting => "Lighting",
        }
    }

    /// Ordering weight for UI sequencing (1 = first).
    pub fn priority(&self) -> u8 {
        match self {
            Discipline::Architecture => 1,
            Discipline::Structural => 2,
            Discipline::Electrical => 3,
            Discipline::Hydraulic => 4,
            Discipline::Hvac => 5,
            Discipline::FireProtection => 6,
            Discipline::Automation => 7,
            Discipline::Lighting => 8,
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Discipline {
    type Err = ParseVariantError;

    /// Accepts the snake_case name or the two-letter code, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Discipline::ALL
            .iter()
            .copied()
            .find(|d| d.name() == needle || d.code().eq_ignore_ascii_case(&needle))
            .or(match needle.as_str() {
                "plumbing" => Some(Discipline::Hydraulic),
                "fire" => Some(Discipline::FireProtection),
                "bacs" => Some(Discipline::Automation),
                _ => None,
            })
            .ok_or(ParseVariantError {
                kind: "discipline",
                value: s.to_string(),
            })
    }
}
