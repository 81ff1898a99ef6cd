//! End-to-end tests from drawing bytes to scored compliance results.

use std::sync::Arc;

use tga_core::fixtures::{sample_office_dxf, sample_office_pdf, sample_office_project};
use tga_core::{
    extract, ingest, project_score, validate_artifact, ComplianceResult, DesignArtifact,
    Discipline, DrawingDocument, EmbeddedStandards, ExtractConfig, GenerationInput,
    GeneratorRegistry, IngestConfig, Project, StandardsRepository,
};

struct Outcome {
    artifacts: Vec<DesignArtifact>,
    results: Vec<ComplianceResult>,
}

async fn run(bytes: Vec<u8>, filename: &str, project: Project) -> Outcome {
    let document = DrawingDocument::from_upload(bytes, filename).expect("upload");
    let geometry = ingest(&document, &IngestConfig::default()).expect("ingest");
    let building = Arc::new(extract(&geometry, &ExtractConfig::default()).expect("extract"));
    let repo = StandardsRepository::load(&EmbeddedStandards)
        .await
        .expect("standards");
    let project = Arc::new(project);
    let registry = GeneratorRegistry::standard();

    let mut artifacts = Vec::new();
    let mut results = Vec::new();
    for discipline in project.ordered_disciplines() {
        let clauses = repo.applicable_standards(project.region, project.category, discipline);
        let input = GenerationInput::new(building.clone(), clauses.clone(), project.clone());
        let generator = registry.get(discipline).expect("registered");
        let artifact = generator.generate(&input).expect("generate");
        let found = validate_artifact(&artifact, &clauses).expect("validate");
        assert_eq!(found.len(), clauses.len(), "{discipline}: one result per clause");
        results.extend(found);
        artifacts.push(artifact);
    }
    Outcome { artifacts, results }
}

fn result<'a>(results: &'a [ComplianceResult], clause_id: &str) -> &'a ComplianceResult {
    results
        .iter()
        .find(|r| r.clause_id == clause_id)
        .unwrap_or_else(|| panic!("no result for {clause_id}"))
}

#[tokio::test]
async fn test_office_germany_all_disciplines() {
    let outcome = run(
        sample_office_dxf().into_bytes(),
        "office.dxf",
        sample_office_project(Discipline::ALL),
    )
    .await;
    assert_eq!(outcome.artifacts.len(), 8);

    for artifact in &outcome.artifacts {
        assert!(artifact.id.starts_with(artifact.discipline.code()));
        assert_eq!(artifact.size_bytes as usize, artifact.payload.len());
    }

    // north offices have two windows on 40 m²
    let daylight = result(&outcome.results, "ASR A3.4 §4.1");
    assert!(!daylight.passed);
    assert_eq!(daylight.score, 90);
    assert!(daylight
        .violations
        .iter()
        .any(|v| v.room_id.as_deref() == Some("L0-R08")));

    assert!(result(&outcome.results, "DIN 277 §4").passed);
    assert!(result(&outcome.results, "MBO §35").passed);
    assert!(result(&outcome.results, "DIN 1988-300 §5.3").passed);
    assert!(result(&outcome.results, "ASR A4.1 §5.2").passed);

    let score = project_score(&outcome.results).expect("score");
    assert!(score > 90.0 && score < 100.0, "{score}");
}

#[tokio::test]
async fn test_results_only_for_applicable_clauses() {
    let outcome = run(
        sample_office_dxf().into_bytes(),
        "office.dxf",
        sample_office_project([Discipline::Electrical, Discipline::Hydraulic]),
    )
    .await;
    assert_eq!(outcome.artifacts.len(), 2);
    assert!(!outcome.results.is_empty());
    for r in &outcome.results {
        assert!(matches!(
            r.discipline,
            Discipline::Electrical | Discipline::Hydraulic
        ));
        assert!(!r.clause_id.starts_with("ISO"));
        // residential-only clauses never apply to an office
        assert_ne!(r.clause_id, "DIN 14676-1 §4");
    }
}

#[tokio::test]
async fn test_no_orphan_violations_and_score_bounds() {
    let outcome = run(
        sample_office_dxf().into_bytes(),
        "office.dxf",
        sample_office_project(Discipline::ALL),
    )
    .await;
    let repo = StandardsRepository::from_set(EmbeddedStandards::dataset().expect("dataset")).expect("repository");
    for r in &outcome.results {
        assert!(r.score <= 100);
        assert_eq!(r.passed, r.violations.is_empty());
        if r.score == 100 {
            assert!(r.violations.is_empty());
        }
        let clause = repo.clause(&r.clause_id).expect("clause exists");
        for v in &r.violations {
            assert_eq!(v.clause_id, r.clause_id);
            assert!(clause.checks.iter().any(|c| c.id == v.check_id && c.metric == v.metric));
        }
        assert!(outcome.artifacts.iter().any(|a| a.id == r.artifact_id));
    }
}

#[tokio::test]
async fn test_identical_inputs_give_identical_outputs() {
    let project = sample_office_project(Discipline::ALL);
    let first = run(sample_office_dxf().into_bytes(), "office.dxf", project.clone()).await;
    let second = run(sample_office_dxf().into_bytes(), "office.dxf", project).await;
    for (a, b) in first.artifacts.iter().zip(&second.artifacts) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.payload, b.payload);
        assert_eq!(a.metadata.inputs_digest, b.metadata.inputs_digest);
    }
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn test_pdf_floor_plan_flags_area_deviation() {
    let outcome = run(
        sample_office_pdf().expect("pdf"),
        "ground-floor.pdf",
        sample_office_project([Discipline::Architecture]),
    )
    .await;
    let doc = outcome.artifacts[0].document().expect("document");
    assert_eq!(doc.metric("room_count"), Some(12.0));
    let area = doc.metric("net_floor_area_m2").expect("area");
    assert!((area - 360.0).abs() < 0.5, "{area}");

    // 360 m² drawn against 1000 m² declared
    let deviation = result(&outcome.results, "DIN 277 §4");
    assert!(!deviation.passed);
    let actual = deviation.violations[0].actual.expect("actual");
    assert!((actual - 64.0).abs() < 0.1, "{actual}");
    assert_eq!(deviation.score, 70);
    assert!(deviation.recommendations[0].contains("DIN 277 §4"));
}
