//! Where a standards dataset comes from.
//!
//! - `EmbeddedStandards`: the dataset bundled into the binary
//! - `FileStandards`: a JSON file on disk, read with `tokio::fs`
//!
//! Sources only fetch and parse; schema validation happens in
//! [`StandardsRepository::load`](super::StandardsRepository::load).

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::StandardsError;
use crate::standards::dataset::StandardsSet;

/// Bundled dataset, versioned with the crate.
const EMBEDDED_DATASET: &str = include_str!("../../standards/default_standards.json");

/// Async provider of a standards dataset.
#[async_trait]
pub trait StandardsSource: Send + Sync {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<StandardsSet, StandardsError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedStandards;

impl EmbeddedStandards {
    /// Parse the bundled dataset without going through the async seam.
    pub fn dataset() -> Result<StandardsSet, StandardsError> {
        Ok(serde_json::from_str(EMBEDDED_DATASET)?)
    }
}

#[async_trait]
impl StandardsSource for EmbeddedStandards {
    fn describe(&self) -> String {
        "embedded dataset".to_string()
    }

    async fn load(&self) -> Result<StandardsSet, StandardsError> {
        Self::dataset()
    }
}

#[derive(Debug, Clone)]
pub struct FileStandards {
    path: PathBuf,
}

impl FileStandards {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StandardsSource for FileStandards {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<StandardsSet, StandardsError> {
        let raw = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
