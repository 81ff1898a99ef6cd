//! Pipeline configuration.
//!
//! Values resolve in increasing priority: built-in defaults, an optional JSON
//! file ([`PipelineConfig::from_file`]), then `TGA_*` environment variables
//! ([`PipelineConfig::apply_env`]).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::error::Result;

/// Default upload limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Default cap on decompressed PDF content per document: 256 MiB.
pub const DEFAULT_MAX_INFLATED_BYTES: usize = 256 * 1024 * 1024;

/// Drawing ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Documents larger than this are rejected with `SizeExceeded`.
    pub max_upload_bytes: usize,

    /// Total bytes PDF content streams may inflate to before the document is
    /// rejected with `SizeExceeded`.
    pub max_inflated_bytes: usize,

    /// DXF layers (prefix match, case-insensitive) holding room boundaries.
    pub room_layers: Vec<String>,

    /// DXF layers holding wall lines.
    pub wall_layers: Vec<String>,

    /// DXF layers holding door block inserts.
    pub door_layers: Vec<String>,

    /// DXF layers holding window block inserts.
    pub window_layers: Vec<String>,

    pub default_door_width_m: f64,
    pub default_window_width_m: f64,

    /// Metres per PDF user-space point (0.3528 mm at 1:100).
    pub pdf_metres_per_point: f64,

    /// Polylines whose elevations differ by less than this share a level.
    pub level_tolerance_m: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_inflated_bytes: DEFAULT_MAX_INFLATED_BYTES,
            room_layers: vec!["A-AREA".into(), "A-ROOM".into(), "ROOM".into()],
            wall_layers: vec!["A-WALL".into(), "WALL".into()],
            door_layers: vec!["A-DOOR".into(), "DOOR".into()],
            window_layers: vec!["A-GLAZ".into(), "A-WIND".into(), "WINDOW".into()],
            default_door_width_m: 0.9,
            default_window_width_m: 1.2,
            pdf_metres_per_point: 0.035_278,
            level_tolerance_m: 0.1,
        }
    }
}

/// Entity extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractConfig {
    /// Open outlines whose end gap is within this distance are closed.
    pub snap_tolerance_m: f64,

    /// Minimum collinear overlap for two rooms to count as adjacent.
    pub min_shared_edge_m: f64,

    /// Maximum wall thickness between two adjacent room outlines.
    pub max_wall_gap_m: f64,

    /// Openings further than this from a room boundary are not assigned to it.
    pub opening_snap_m: f64,

    /// Storey height used for the top level or single-level drawings.
    pub default_storey_height_m: f64,

    /// Glazed height assumed for window area.
    pub window_height_m: f64,

    /// Outlines smaller than this are treated as drafting noise.
    pub min_room_area_m2: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_m: 0.05,
            min_shared_edge_m: 0.5,
            max_wall_gap_m: 0.4,
            opening_snap_m: 0.5,
            default_storey_height_m: 3.0,
            window_height_m: 1.5,
            min_room_area_m2: 0.5,
        }
    }
}

/// Top-level configuration for a pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub ingest: IngestConfig,
    pub extract: ExtractConfig,

    /// Upper bound on concurrently running discipline generators.
    pub max_parallel_generators: usize,

    /// Buffer size of the progress event channel.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            extract: ExtractConfig::default(),
            max_parallel_generators: 4,
            event_capacity: 256,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply `TGA_MAX_UPLOAD_BYTES`, `TGA_MAX_INFLATED_BYTES`,
    /// `TGA_MAX_PARALLEL_GENERATORS` and `TGA_EVENT_CAPACITY` overrides.
    /// Unparseable values are ignored.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_override(&lookup, "TGA_MAX_UPLOAD_BYTES") {
            self.ingest.max_upload_bytes = v;
        }
        if let Some(v) = parse_override(&lookup, "TGA_MAX_INFLATED_BYTES") {
            self.ingest.max_inflated_bytes = v;
        }
        if let Some(v) = parse_override(&lookup, "TGA_MAX_PARALLEL_GENERATORS") {
            self.max_parallel_generators = v;
        }
        if let Some(v) = parse_override(&lookup, "TGA_EVENT_CAPACITY") {
            self.event_capacity = v;
        }
        self
    }
}

fn parse_override(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!(key = key, value = %raw, "ignoring invalid configuration override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.ingest.max_upload_bytes, 52_428_800);
        assert_eq!(config.ingest.max_inflated_bytes, 268_435_456);
        assert_eq!(config.max_parallel_generators, 4);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_parallel_generators": 2, "extract": {"snap_tolerance_m": 0.1}}"#)
                .expect("parse");
        assert_eq!(config.max_parallel_generators, 2);
        assert_eq!(config.extract.snap_tolerance_m, 0.1);
        assert_eq!(config.extract.min_shared_edge_m, 0.5);
        assert_eq!(config.ingest, IngestConfig::default());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TGA_MAX_UPLOAD_BYTES", "1024"),
            ("TGA_MAX_INFLATED_BYTES", "4096"),
            ("TGA_MAX_PARALLEL_GENERATORS", "not-a-number"),
            ("TGA_EVENT_CAPACITY", "0"),
        ]
        .into_iter()
        .collect();
        let config = PipelineConfig::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.ingest.max_upload_bytes, 1024);
        assert_eq!(config.ingest.max_inflated_bytes, 4096);
        assert_eq!(config.max_parallel_generators, 4);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tga.json");
        std::fs::write(&path, r#"{"event_capacity": 16}"#).expect("write");
        let config = PipelineConfig::from_file(&path).expect("load");
        assert_eq!(config.event_capacity, 16);
    }
}
