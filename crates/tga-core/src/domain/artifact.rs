//! Discipline design artifacts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::building::SpaceType;
use crate::domain::discipline::Discipline;

/// Per-room calculation row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomCalculation {
    pub room_id: String,
    pub level: usize,
    pub space_type: SpaceType,
    pub metrics: BTreeMap<String, f64>,
}

/// Tabular calculation output (cable schedule, pipe sizing, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CalculationTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CalculationTable {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Document body of an artifact: layout summary plus calculation tables.
///
/// Serialized as the artifact payload; the validator reads it back from the
/// payload bytes, never from generator internals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactDocument {
    pub discipline: Discipline,
    pub generator_version: String,
    /// Project-scope metrics keyed by metric name.
    pub metrics: BTreeMap<String, f64>,
    pub rooms: Vec<RoomCalculation>,
    pub tables: Vec<CalculationTable>,
}

impl ArtifactDocument {
    pub fn new(discipline: Discipline, generator_version: &str) -> Self {
        Self {
            discipline,
            generator_version: generator_version.to_string(),
            metrics: BTreeMap::new(),
            rooms: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn set_metric(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), value);
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

/// How and from what an artifact was generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactMetadata {
    /// SHA-256 over entities, applicable clause ids and project parameters.
    pub inputs_digest: String,
    pub generator_version: String,
    pub generated_at: DateTime<Utc>,
}

/// An immutable design output for one discipline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesignArtifact {
    /// Stable identifier: `<code>-<first 12 hex of inputs digest>`.
    pub id: String,
    pub discipline: Discipline,
    pub file_name: String,
    pub media_type: String,
    #[serde(skip_serializing, default)]
    pub payload: Vec<u8>,
    pub size_bytes: u64,
    pub metadata: ArtifactMetadata,
}

impl DesignArtifact {
    /// Build an artifact from its document, deriving id, file name and size.
    pub fn from_document(
        document: &ArtifactDocument,
        inputs_digest: String,
    ) -> serde_json::Result<Self> {
        let payload = document.to_payload()?;
        let short = &inputs_digest[..12.min(inputs_digest.len())];
        let discipline = document.discipline;
        Ok(Self {
            id: format!("{}-{}", discipline.code(), short),
            discipline,
            file_name: format!(
                "{}_{}.json",
                discipline.code(),
                discipline.display_name().replace(' ', "_")
            ),
            media_type: "application/json".to_string(),
            size_bytes: payload.len() as u64,
            payload,
            metadata: ArtifactMetadata {
                inputs_digest,
                generator_version: document.generator_version.clone(),
                generated_at: Utc::now(),
            },
        })
    }

    pub fn document(&self) -> serde_json::Result<ArtifactDocument> {
        ArtifactDocument::from_payload(&self.payload)
    }
}
