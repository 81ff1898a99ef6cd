//! Domain model for the TGA pipeline.

pub mod artifact;
pub mod building;
pub mod compliance;
pub mod digest;
pub mod discipline;
pub mod error;
pub mod geometry;
pub mod project;

pub use artifact::{
    ArtifactDocument, ArtifactMetadata, CalculationTable, DesignArtifact, RoomCalculation,
};
pub use building::{
    Adjacency, BuildingModel, FixtureAnchor, FixtureKind, LevelInfo, Room, SpaceType,
};
pub use compliance::{ComplianceResult, Violation};
pub use digest::compute_digest;
pub use discipline::Discipline;
pub use error::{
    ExtractError, GenerationError, IngestError, ParseVariantError, Result, StandardsError,
    TgaError, ValidationError,
};
pub use geometry::{
    polygon_edges, signed_area, DrawingDocument, DrawingFormat, GeometricModel, Label, Level,
    Opening, OpeningKind, Point, RoomOutline, Segment,
};
pub use project::{BuildingCategory, Project, Region};
