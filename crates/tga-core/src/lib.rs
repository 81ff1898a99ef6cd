//! TGA Core Library
//!
//! Building blocks of the design automation pipeline:
//! - Drawing ingestion (DXF, vector PDF) into a normalized geometric model
//! - Entity extraction (rooms, areas, adjacency, fixture anchors)
//! - Versioned standards repository with applicability filtering
//! - One deterministic design generator per discipline
//! - Rule-based compliance validation and reporting

pub mod compliance;
pub mod config;
pub mod domain;
pub mod extract;
pub mod fixtures;
pub mod generate;
pub mod ingest;
pub mod obs;
pub mod reporting;
pub mod standards;
pub mod telemetry;

pub use compliance::{project_score, summarize, validate_artifact, ComplianceSummary};
pub use config::{ExtractConfig, IngestConfig, PipelineConfig};
pub use domain::{
    ArtifactDocument, ArtifactMetadata, BuildingCategory, BuildingModel, ComplianceResult,
    DesignArtifact, Discipline, DrawingDocument, DrawingFormat, ExtractError, GenerationError,
    GeometricModel, IngestError, Project, Region, Room, SpaceType, StandardsError, TgaError,
    ValidationError, Violation,
};
pub use extract::extract;
pub use generate::{DisciplineGenerator, GenerationInput, GeneratorRegistry};
pub use ingest::ingest;
pub use obs::{
    emit_compliance_evaluated, emit_run_finished, emit_run_started, emit_stage_error,
    emit_stage_transition, run_span,
};
pub use reporting::{
    render_compliance_report_md, write_results_json, ArtifactEntry, RunReport,
};
pub use standards::{
    EmbeddedStandards, FileStandards, StandardClause, StandardsRepository, StandardsSet,
    StandardsSource,
};
pub use telemetry::init_tracing;

/// TGA core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
