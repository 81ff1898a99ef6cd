//! Domain-level error taxonomy for the TGA pipeline.

use crate::domain::discipline::Discipline;

/// Errors produced while turning uploaded bytes into a geometric model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported format: {detail}")]
    UnsupportedFormat { detail: String },

    #[error("corrupt document: {detail}")]
    CorruptDocument { detail: String },

    #[error("document size {size} bytes exceeds limit of {max} bytes")]
    SizeExceeded { size: usize, max: usize },
}

impl IngestError {
    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            detail: detail.into(),
        }
    }

    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptDocument {
            detail: detail.into(),
        }
    }
}

/// Errors produced by the entity extractor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("incomplete geometry in {element}: {detail}")]
    IncompleteGeometry { element: String, detail: String },
}

/// Errors produced by the standards repository.
#[derive(Debug, thiserror::Error)]
pub enum StandardsError {
    #[error("no applicable standards for region {region}, category {category}, discipline {discipline}")]
    NoApplicableStandards {
        region: String,
        category: String,
        discipline: Discipline,
    },

    #[error("invalid standards dataset: {0}")]
    InvalidDataset(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A discipline generator could not produce its artifact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("generation failed for {discipline}: {reason}")]
pub struct GenerationError {
    pub discipline: Discipline,
    pub reason: String,
}

impl GenerationError {
    pub fn new(discipline: Discipline, reason: impl Into<String>) -> Self {
        Self {
            discipline,
            reason: reason.into(),
        }
    }
}

/// An artifact handed to the validator could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed for artifact {artifact_id} ({discipline}): {reason}")]
pub struct ValidationError {
    pub discipline: Discipline,
    pub artifact_id: String,
    pub reason: String,
}

/// Failure to parse a closed enumeration from text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseVariantError {
    pub kind: &'static str,
    pub value: String,
}

/// TGA domain errors.
#[derive(Debug, thiserror::Error)]
pub enum TgaError {
    #[error("invalid project: {0}")]
    InvalidProject(String),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("extract error: {0}")]
    Extract(#[from] ExtractError),

    #[error("standards error: {0}")]
    Standards(#[from] StandardsError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for TGA domain operations.
pub type Result<T> = std::result::Result<T, TgaError>;
