//! Discipline design generators.
//!
//! Each generator turns the shared, read-only [`GenerationInput`] into one
//! [`DesignArtifact`]. Generators never see each other's output, so they may
//! run in any order or concurrently.

pub mod architecture;
pub mod automation;
pub mod electrical;
pub mod fire;
pub mod hvac;
pub mod hydraulic;
pub mod lighting;
pub mod structural;
pub mod tables;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{
    compute_digest, ArtifactDocument, BuildingCategory, BuildingModel, DesignArtifact,
    Discipline, GenerationError, Project, Region, Room, RoomCalculation,
};
use crate::standards::StandardClause;

pub use architecture::ArchitectureGenerator;
pub use automation::AutomationGenerator;
pub use electrical::ElectricalGenerator;
pub use fire::FireProtectionGenerator;
pub use hvac::HvacGenerator;
pub use hydraulic::HydraulicGenerator;
pub use lighting::LightingGenerator;
pub use structural::StructuralGenerator;

/// Version stamped into every built-in artifact.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a generator may read.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub building: Arc<BuildingModel>,
    /// Clauses applicable to this discipline; may be empty.
    pub standards: Arc<[StandardClause]>,
    pub project: Arc<Project>,
}

impl GenerationInput {
    pub fn new(
        building: Arc<BuildingModel>,
        standards: impl Into<Arc<[StandardClause]>>,
        project: Arc<Project>,
    ) -> Self {
        Self {
            building,
            standards: standards.into(),
            project,
        }
    }
}

/// Digest material: entities, applicable clause ids and project parameters.
///
/// The project id and name are left out so identical buildings produce
/// identical artifact ids across projects.
#[derive(Serialize)]
struct DigestInput<'a> {
    discipline: Discipline,
    generator_version: &'a str,
    building: &'a BuildingModel,
    clause_ids: Vec<&'a str>,
    category: BuildingCategory,
    region: Region,
    total_area_m2: f64,
    floors: u32,
}

/// Produces the design artifact of one discipline.
pub trait DisciplineGenerator: Send + Sync {
    fn discipline(&self) -> Discipline;

    fn version(&self) -> &str {
        GENERATOR_VERSION
    }

    /// Compute the artifact document. Must be deterministic.
    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError>;

    /// Design and package the artifact with its inputs digest.
    fn generate(&self, input: &GenerationInput) -> Result<DesignArtifact, GenerationError> {
        let discipline = self.discipline();
        let document = self.design(input)?;
        if document.discipline != discipline {
            return Err(GenerationError::new(
                discipline,
                format!("generator produced a {} document", document.discipline),
            ));
        }
        let digest = inputs_digest(discipline, self.version(), input)
            .map_err(|e| GenerationError::new(discipline, format!("digest: {e}")))?;
        DesignArtifact::from_document(&document, digest)
            .map_err(|e| GenerationError::new(discipline, format!("encode artifact: {e}")))
    }
}

/// SHA-256 over the generator's inputs.
pub fn inputs_digest(
    discipline: Discipline,
    generator_version: &str,
    input: &GenerationInput,
) -> crate::domain::Result<String> {
    let project = &input.project;
    compute_digest(&DigestInput {
        discipline,
        generator_version,
        building: &input.building,
        clause_ids: input.standards.iter().map(|c| c.id.as_str()).collect(),
        category: project.category,
        region: project.region,
        total_area_m2: project.total_area_m2,
        floors: project.floors,
    })
}

/// Generators keyed by discipline.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<Discipline, Arc<dyn DisciplineGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in generator of every discipline.
    pub fn standard() -> Self {
        Self::new()
            .with(ArchitectureGenerator)
            .with(StructuralGenerator)
            .with(ElectricalGenerator)
            .with(HydraulicGenerator)
            .with(HvacGenerator)
            .with(FireProtectionGenerator)
            .with(AutomationGenerator)
            .with(LightingGenerator)
    }

    /// Register `generator`, replacing any generator of the same discipline.
    pub fn with(mut self, generator: impl DisciplineGenerator + 'static) -> Self {
        self.register(Arc::new(generator));
        self
    }

    pub fn register(&mut self, generator: Arc<dyn DisciplineGenerator>) {
        self.generators.insert(generator.discipline(), generator);
    }

    pub fn get(&self, discipline: Discipline) -> Option<Arc<dyn DisciplineGenerator>> {
        self.generators.get(&discipline).cloned()
    }

    pub fn disciplines(&self) -> Vec<Discipline> {
        self.generators.keys().copied().collect()
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("disciplines", &self.disciplines())
            .finish()
    }
}

/// Empty calculation row for a room.
pub(crate) fn room_row(room: &Room) -> RoomCalculation {
    RoomCalculation {
        room_id: room.id.clone(),
        level: room.level,
        space_type: room.space_type,
        metrics: BTreeMap::new(),
    }
}

pub(crate) trait MetricsExt {
    fn put(&mut self, key: &str, value: f64);
}

impl MetricsExt for RoomCalculation {
    fn put(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), tables::round(value));
    }
}

impl MetricsExt for ArtifactDocument {
    fn put(&mut self, key: &str, value: f64) {
        self.set_metric(key, tables::round(value));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{ExtractConfig, IngestConfig};
    use crate::domain::DrawingDocument;
    use crate::fixtures::{sample_office_dxf, sample_office_project};
    use crate::standards::{EmbeddedStandards, StandardsRepository};

    /// Extracted sample office.
    pub fn sample_building() -> Arc<BuildingModel> {
        let document = DrawingDocument::from_upload(sample_office_dxf().into_bytes(), "office.dxf")
            .expect("upload");
        let model = crate::ingest::ingest(&document, &IngestConfig::default()).expect("ingest");
        Arc::new(crate::extract::extract(&model, &ExtractConfig::default()).expect("extract"))
    }

    /// Sample office input with the embedded clauses for `discipline`.
    pub fn sample_input(discipline: Discipline) -> GenerationInput {
        let project = sample_office_project([discipline]);
        let set = EmbeddedStandards::dataset().expect("standards");
        let repo = StandardsRepository::from_set(set).expect("valid");
        let clauses = repo.applicable_standards(project.region, project.category, discipline);
        GenerationInput::new(sample_building(), clauses, Arc::new(project))
    }

    pub fn room<'a>(doc: &'a ArtifactDocument, id: &str) -> &'a RoomCalculation {
        doc.rooms
            .iter()
            .find(|r| r.room_id == id)
            .unwrap_or_else(|| panic!("room {id} missing"))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample_input;
    use super::*;

    struct Broken;

    impl DisciplineGenerator for Broken {
        fn discipline(&self) -> Discipline {
            Discipline::Hvac
        }

        fn design(&self, _input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
            Ok(ArtifactDocument::new(Discipline::Lighting, "0"))
        }
    }

    #[test]
    fn test_standard_registry_covers_all() {
        let registry = GeneratorRegistry::standard();
        assert_eq!(registry.disciplines(), Discipline::ALL.to_vec());
        for d in Discipline::ALL {
            assert_eq!(registry.get(d).map(|g| g.discipline()), Some(d));
        }
    }

    #[test]
    fn test_every_generator_is_deterministic() {
        let registry = GeneratorRegistry::standard();
        for d in Discipline::ALL {
            let input = sample_input(d);
            let generator = registry.get(d).expect("generator");
            let a = generator.generate(&input).expect("first");
            let b = generator.generate(&input).expect("second");
            assert_eq!(a.id, b.id, "{d}");
            assert_eq!(a.payload, b.payload, "{d}");
            assert!(a.id.starts_with(d.code()));
            assert_eq!(a.size_bytes, a.payload.len() as u64);
        }
    }

    #[test]
    fn test_digest_ignores_project_identity() {
        let input = sample_input(Discipline::Electrical);
        let mut renamed = (*input.project).clone();
        renamed.id = uuid::Uuid::new_v4();
        renamed.name = "Other".to_string();
        let other = GenerationInput::new(
            input.building.clone(),
            input.standards.clone(),
            Arc::new(renamed.clone()),
        );
        let a = inputs_digest(Discipline::Electrical, "1", &input).expect("digest");
        let b = inputs_digest(Discipline::Electrical, "1", &other).expect("digest");
        assert_eq!(a, b);

        renamed.total_area_m2 += 1.0;
        let changed = GenerationInput::new(input.building.clone(), input.standards.clone(), Arc::new(renamed));
        assert_ne!(a, inputs_digest(Discipline::Electrical, "1", &changed).expect("digest"));
    }

    #[test]
    fn test_mismatched_document_rejected() {
        let err = Broken.generate(&sample_input(Discipline::Hvac)).unwrap_err();
        assert_eq!(err.discipline, Discipline::Hvac);
        assert!(err.reason.contains("lighting"));
    }
}
