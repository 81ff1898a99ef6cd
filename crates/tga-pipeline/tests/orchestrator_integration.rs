//! Integration tests for the run orchestrator on the sample office drawing.

use std::collections::BTreeMap;
use std::sync::{mpsc, Arc, Mutex};

use tga_core::fixtures::{sample_office_dxf, sample_office_project};
use tga_core::{
    ArtifactDocument, BuildingCategory, Discipline, DisciplineGenerator, DrawingDocument,
    GenerationError, GenerationInput, GeneratorRegistry, PipelineConfig, Project, Region,
};
use tga_pipeline::{
    FailureReason, Orchestrator, PipelineError, RunStatus, StageId, StageStatus, REPORT_DOCUMENT,
};

fn sample_document() -> DrawingDocument {
    DrawingDocument::from_upload(sample_office_dxf().into_bytes(), "office.dxf").expect("upload")
}

/// Always fails.
struct FailingGenerator(Discipline);

impl DisciplineGenerator for FailingGenerator {
    fn discipline(&self) -> Discipline {
        self.0
    }

    fn design(&self, _input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        Err(GenerationError::new(self.0, "solver diverged"))
    }
}

/// Panics instead of returning.
struct PanickingGenerator(Discipline);

impl DisciplineGenerator for PanickingGenerator {
    fn discipline(&self) -> Discipline {
        self.0
    }

    fn design(&self, _input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        panic!("index out of bounds in riser sizing");
    }
}

/// Blocks until its release channel is signalled or dropped, then delegates
/// to the built-in generator.
struct BlockingGenerator {
    inner: Arc<dyn DisciplineGenerator>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl BlockingGenerator {
    fn new(discipline: Discipline) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                inner: GeneratorRegistry::standard()
                    .get(discipline)
                    .expect("built-in generator"),
                release: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl DisciplineGenerator for BlockingGenerator {
    fn discipline(&self) -> Discipline {
        self.inner.discipline()
    }

    fn design(&self, input: &GenerationInput) -> Result<ArtifactDocument, GenerationError> {
        let _ = self.release.lock().expect("release lock").recv();
        self.inner.design(input)
    }
}

/// Test: office in Germany with electrical and hydraulic completes end to end
#[tokio::test]
async fn test_office_run_completes() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let project = sample_office_project([Discipline::Electrical, Discipline::Hydraulic]);
    let project_id = project.id;

    let handle = orchestrator.start(project, sample_document()).expect("start");
    let run = handle.wait().await.expect("run task");

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.failure, None);
    assert!(run.errors.is_empty(), "errors: {:?}", run.errors);
    assert_eq!(run.artifacts.len(), 2);
    assert_eq!(run.artifacts[0].discipline, Discipline::Electrical);
    assert_eq!(run.artifacts[1].discipline, Discipline::Hydraulic);
    assert!(run.stages.iter().all(|s| s.status == StageStatus::Completed));
    assert_eq!(run.progress(), 100);
    assert!(run.standards_version.is_some());

    assert!(!run.compliance.is_empty());
    assert!(run
        .compliance
        .iter()
        .all(|r| matches!(r.discipline, Discipline::Electrical | Discipline::Hydraulic)));
    let score = run.project_score.expect("project score");
    assert!((0.0..=100.0).contains(&score));

    let report = run.report.as_ref().expect("report");
    assert_eq!(report.status, "completed");
    assert_eq!(report.artifacts.len(), 2);
    let doc = run.document(REPORT_DOCUMENT).expect("report document");
    assert_eq!(doc.media_type, "text/markdown");
    assert!(doc.content.starts_with("# Compliance Report"));

    assert_eq!(orchestrator.active_run(project_id), None);
}

/// Test: a failing generator does not stop the others
#[tokio::test]
async fn test_partial_generator_failure() {
    let registry =
        GeneratorRegistry::standard().with(FailingGenerator(Discipline::Hydraulic));
    let orchestrator = Orchestrator::new(PipelineConfig::default()).with_registry(registry);
    let project = sample_office_project([
        Discipline::Electrical,
        Discipline::Hydraulic,
        Discipline::Lighting,
    ]);

    let run = orchestrator
        .start(project, sample_document())
        .expect("start")
        .wait()
        .await
        .expect("run task");

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.failure, Some(FailureReason::DisciplineErrors { count: 1 }));
    assert_eq!(run.artifacts.len(), 2);
    assert!(run.artifact(Discipline::Hydraulic).is_none());
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].discipline, Some(Discipline::Hydraulic));
    assert!(run.errors[0].message.contains("solver diverged"));

    let failed = run
        .stage(StageId::Generate(Discipline::Hydraulic))
        .expect("hydraulic stage");
    assert_eq!(failed.status, StageStatus::Error);
    assert_eq!(
        run.stage(StageId::Validate).map(|s| s.status),
        Some(StageStatus::Completed)
    );
    assert_eq!(
        run.stage(StageId::Document).map(|s| s.status),
        Some(StageStatus::Completed)
    );
    assert!(run
        .compliance
        .iter()
        .all(|r| r.discipline != Discipline::Hydraulic));
    let report = run.report.expect("report");
    assert_eq!(report.errors.len(), 1);
}

/// Test: a panicking generator fails its own stage and the run
#[tokio::test]
async fn test_panicking_generator_fails_its_stage() {
    let registry =
        GeneratorRegistry::standard().with(PanickingGenerator(Discipline::Hvac));
    let orchestrator = Orchestrator::new(PipelineConfig::default()).with_registry(registry);
    let project = sample_office_project([Discipline::Electrical, Discipline::Hvac]);

    let run = orchestrator
        .start(project, sample_document())
        .expect("start")
        .wait()
        .await
        .expect("run task");

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.failure, Some(FailureReason::DisciplineErrors { count: 1 }));
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].discipline, Some(Discipline::Hvac));
    assert!(run.errors[0].message.contains("generator task failed"));
    assert_eq!(
        run.stage(StageId::Generate(Discipline::Hvac)).map(|s| s.status),
        Some(StageStatus::Error)
    );
    assert!(run
        .stages
        .iter()
        .all(|s| s.status != StageStatus::Active && s.status != StageStatus::Pending));
    assert!(run.artifact(Discipline::Electrical).is_some());
}

/// Test: a project without disciplines is rejected before ingestion
#[tokio::test]
async fn test_empty_disciplines_rejected() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let project = Project::new(
        "Empty",
        BuildingCategory::Office,
        500.0,
        1,
        Region::Germany,
        Vec::<Discipline>::new(),
    );
    let project_id = project.id;
    // Not a drawing at all; ingestion would reject it.
    let garbage = DrawingDocument::from_upload(b"garbage".to_vec(), "x.dxf").expect("upload");

    let err = match orchestrator.start(project, garbage) {
        Err(e) => e,
        Ok(_) => panic!("run should be rejected"),
    };
    assert!(matches!(err, PipelineError::InvalidProject(_)));
    assert_eq!(orchestrator.active_run(project_id), None);
}

/// Test: undecodable drawing fails the ingest stage and nothing later runs
#[tokio::test]
async fn test_ingest_failure_ends_run() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let project = sample_office_project([Discipline::Electrical]);
    let garbage = DrawingDocument::from_upload(b"garbage".to_vec(), "x.dxf").expect("upload");

    let run = orchestrator
        .start(project, garbage)
        .expect("start")
        .wait()
        .await
        .expect("run task");

    assert_eq!(run.status, RunStatus::Error);
    assert!(matches!(
        run.failure,
        Some(FailureReason::StageFailed { ref stage, .. }) if stage == "ingest"
    ));
    assert_eq!(
        run.stage(StageId::Ingest).map(|s| s.status),
        Some(StageStatus::Error)
    );
    assert!(run
        .stages
        .iter()
        .skip(1)
        .all(|s| s.status == StageStatus::Pending));
    assert!(run.artifacts.is_empty());
    assert!(run.report.is_none());
}

/// Test: events are sequenced and each stage moves forward only
#[tokio::test]
async fn test_progress_event_ordering() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let project = sample_office_project([
        Discipline::Architecture,
        Discipline::Electrical,
        Discipline::Hvac,
    ]);
    let handle = orchestrator.start(project, sample_document()).expect("start");
    let mut events = handle.subscribe();
    let run = handle.wait().await.expect("run task");

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(!received.is_empty());
    for pair in received.windows(2) {
        assert_eq!(pair[1].seq, pair[0].seq + 1);
    }
    assert!(received.iter().all(|e| e.run_id == run.id));

    let mut per_stage: BTreeMap<String, Vec<(StageStatus, u8)>> = BTreeMap::new();
    for event in &received {
        per_stage
            .entry(event.stage.clone())
            .or_default()
            .push((event.status, event.progress));
    }
    assert_eq!(per_stage.len(), run.stages.len());
    for (stage, transitions) in &per_stage {
        assert_eq!(transitions.first().map(|t| t.0), Some(StageStatus::Active), "{stage}");
        assert_eq!(transitions.last(), Some(&(StageStatus::Completed, 100)), "{stage}");
        for pair in transitions.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "{stage}: progress went backwards");
        }
    }

    // Run-wide stages never overlap.
    let position = |name: &str, status: StageStatus| {
        received
            .iter()
            .position(|e| e.stage == name && e.status == status)
            .expect("event present")
    };
    assert!(position("ingest", StageStatus::Completed) < position("extract", StageStatus::Active));
    assert!(
        position("load_standards", StageStatus::Completed)
            < position("generate:AR", StageStatus::Active)
    );
    assert!(
        position("generate:HV", StageStatus::Completed) < position("validate", StageStatus::Active)
    );
}

/// Test: cancelling during generation abandons in-flight generators
#[tokio::test]
async fn test_cancel_during_generation() {
    let (blocking, release) = BlockingGenerator::new(Discipline::Electrical);
    let orchestrator = Orchestrator::new(PipelineConfig::default())
        .with_registry(GeneratorRegistry::standard().with(blocking));
    let project = sample_office_project([Discipline::Architecture, Discipline::Electrical]);
    let project_id = project.id;

    let handle = orchestrator.start(project, sample_document()).expect("start");
    let mut snapshots = handle.watch();
    snapshots
        .wait_for(|run| {
            run.stage(StageId::Generate(Discipline::Electrical))
                .is_some_and(|s| s.status == StageStatus::Active)
        })
        .await
        .expect("electrical generator started");
    assert_eq!(orchestrator.active_run(project_id), Some(handle.run_id()));

    handle.cancel();
    let run = handle.wait().await.expect("run task");
    drop(release);

    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(run.failure, Some(FailureReason::Cancelled));
    assert!(run.artifact(Discipline::Electrical).is_none());
    let electrical = run
        .stage(StageId::Generate(Discipline::Electrical))
        .expect("electrical stage");
    assert_eq!(electrical.status, StageStatus::Error);
    assert_eq!(electrical.error.as_deref(), Some("cancelled"));
    assert_eq!(
        run.stage(StageId::Validate).map(|s| s.status),
        Some(StageStatus::Pending)
    );
    assert!(run.compliance.is_empty());
    assert_eq!(orchestrator.active_run(project_id), None);
}

/// Test: a second run of the same project is refused while the first is active
#[tokio::test]
async fn test_one_active_run_per_project() {
    let (blocking, release) = BlockingGenerator::new(Discipline::Hydraulic);
    let orchestrator = Orchestrator::new(PipelineConfig::default())
        .with_registry(GeneratorRegistry::standard().with(blocking));
    let project = sample_office_project([Discipline::Hydraulic]);

    let first = orchestrator
        .start(project.clone(), sample_document())
        .expect("first start");
    match orchestrator.start(project.clone(), sample_document()) {
        Err(PipelineError::RunAlreadyActive { project_id, run_id }) => {
            assert_eq!(project_id, project.id);
            assert_eq!(run_id, first.run_id());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("second run should be refused"),
    }

    // Another project is unaffected.
    let other = sample_office_project([Discipline::Architecture]);
    let second = orchestrator.start(other, sample_document()).expect("other project");
    assert_eq!(
        second.wait().await.expect("run task").status,
        RunStatus::Completed
    );

    release.send(()).expect("release generator");
    let run = first.wait().await.expect("run task");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(orchestrator.active_run(project.id), None);
}

/// Test: identical inputs give identical artifacts and results
#[tokio::test]
async fn test_runs_are_reproducible() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let project = sample_office_project([Discipline::Structural, Discipline::FireProtection]);

    let first = orchestrator
        .start(project.clone(), sample_document())
        .expect("start")
        .wait()
        .await
        .expect("run task");
    let second = orchestrator
        .start(project, sample_document())
        .expect("start")
        .wait()
        .await
        .expect("run task");

    let ids = |run: &tga_pipeline::PipelineRun| {
        run.artifacts
            .iter()
            .map(|a| (a.id.clone(), a.payload.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.compliance, second.compliance);
    assert_eq!(first.project_score, second.project_score);
    assert_ne!(first.id, second.id);
}

/// Test: a discipline without applicable clauses still produces its artifact
#[tokio::test]
async fn test_no_applicable_standards_is_a_notice() {
    let orchestrator = Orchestrator::new(PipelineConfig::default());
    let project = Project::new(
        "Lab",
        BuildingCategory::Office,
        1000.0,
        3,
        Region::International,
        [Discipline::Hydraulic],
    );

    let run = orchestrator
        .start(project, sample_document())
        .expect("start")
        .wait()
        .await
        .expect("run task");

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.artifact(Discipline::Hydraulic).is_some());
    assert_eq!(run.notices.len(), 1);
    assert!(run.notices[0].contains("no applicable standards"));
    assert!(run.compliance.is_empty());
    assert_eq!(run.project_score, None);
}
