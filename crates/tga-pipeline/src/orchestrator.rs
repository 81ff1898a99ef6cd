//! Run orchestration.
//!
//! Each run is driven by one task that executes the stages in order and is
//! the only writer of its [`PipelineRun`]. Observers read snapshots from a
//! `watch` channel and transitions from a `broadcast` channel. Generators run
//! on the blocking pool, bounded by a semaphore, and race against the
//! cancellation flag.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, OnceCell, Semaphore};
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use tga_core::{
    emit_compliance_evaluated, emit_run_finished, emit_run_started, emit_stage_error,
    emit_stage_transition, extract, ingest, project_score, render_compliance_report_md, run_span,
    validate_artifact, BuildingModel, DesignArtifact, Discipline, DisciplineGenerator,
    DrawingDocument, EmbeddedStandards, GenerationError, GenerationInput, GeneratorRegistry,
    PipelineConfig, Project, RunReport, StandardClause, StandardsRepository, StandardsSource,
};

use crate::error::{PipelineError, PipelineResult};
use crate::events::ProgressEvent;
use crate::run::{FailureReason, PipelineRun, RunDocument, RunError, RunStatus};
use crate::stage::{StageId, StageStatus};

/// Name of the rendered compliance report in [`PipelineRun::documents`].
pub const REPORT_DOCUMENT: &str = "compliance_report.md";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Starts runs and enforces one active run per project.
#[derive(Clone)]
pub struct Orchestrator {
    config: PipelineConfig,
    registry: GeneratorRegistry,
    source: Arc<dyn StandardsSource>,
    /// Loaded on the first run's `load_standards` stage, then shared.
    standards: Arc<OnceCell<Arc<StandardsRepository>>>,
    /// project id → active run id
    active: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl Orchestrator {
    /// Orchestrator with every discipline generator and the embedded dataset.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            registry: GeneratorRegistry::standard(),
            source: Arc::new(EmbeddedStandards),
            standards: Arc::new(OnceCell::new()),
            active: Arc::default(),
        }
    }

    pub fn with_registry(mut self, registry: GeneratorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_standards_source(mut self, source: Arc<dyn StandardsSource>) -> Self {
        self.source = source;
        self.standards = Arc::new(OnceCell::new());
        self
    }

    /// Use an already loaded repository.
    pub fn with_standards(mut self, repository: StandardsRepository) -> Self {
        self.standards = Arc::new(OnceCell::from(Arc::new(repository)));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run currently active for `project_id`, if any.
    pub fn active_run(&self, project_id: Uuid) -> Option<Uuid> {
        lock(&self.active).get(&project_id).copied()
    }

    /// Validate `project` and spawn its run. Must be called within a tokio
    /// runtime.
    ///
    /// Subscribe to the returned handle before yielding to the runtime to
    /// observe every progress event.
    pub fn start(&self, project: Project, document: DrawingDocument) -> PipelineResult<RunHandle> {
        project.validate()?;
        let run_id = Uuid::new_v4();
        let project_id = project.id;
        {
            let mut active = lock(&self.active);
            if let Some(existing) = active.get(&project_id) {
                return Err(PipelineError::RunAlreadyActive {
                    project_id,
                    run_id: *existing,
                });
            }
            active.insert(project_id, run_id);
        }
        let guard = ActiveRun {
            active: Arc::clone(&self.active),
            project_id,
            run_id,
        };

        let run = PipelineRun::new(run_id, &project);
        let (snapshot_tx, snapshot_rx) = watch::channel(run.clone());
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let span = run_span(&run_id.to_string(), &project_id.to_string());

        let driver = RunDriver {
            run,
            seq: 0,
            project: Arc::new(project),
            document,
            config: self.config.clone(),
            registry: self.registry.clone(),
            source: Arc::clone(&self.source),
            standards: Arc::clone(&self.standards),
            snapshots: snapshot_tx,
            events: events.clone(),
            cancel: cancel_rx,
            guard: Some(guard),
        };
        let task = tokio::spawn(driver.drive().instrument(span));

        Ok(RunHandle {
            run_id,
            project_id,
            events,
            snapshots: snapshot_rx,
            cancel: cancel_tx,
            task,
        })
    }
}

/// Releases the project's registry slot when the run ends.
struct ActiveRun {
    active: Arc<Mutex<HashMap<Uuid, Uuid>>>,
    project_id: Uuid,
    run_id: Uuid,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        let mut active = lock(&self.active);
        if active.get(&self.project_id) == Some(&self.run_id) {
            active.remove(&self.project_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Caller's view of a running pipeline.
pub struct RunHandle {
    run_id: Uuid,
    project_id: Uuid,
    events: broadcast::Sender<ProgressEvent>,
    snapshots: watch::Receiver<PipelineRun>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<PipelineRun>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn project_id(&self) -> Uuid {
        self.project_id
    }

    /// Progress events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> PipelineRun {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<PipelineRun> {
        self.snapshots.clone()
    }

    /// Request cancellation. Takes effect at the next stage boundary, or
    /// immediately while generators are in flight.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the terminal state.
    pub async fn wait(self) -> PipelineResult<PipelineRun> {
        self.task
            .await
            .map_err(|e| PipelineError::RunTask(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Why the stage sequence stopped early.
enum Halt {
    Cancelled,
    Failed,
}

type Clauses = BTreeMap<Discipline, Vec<StandardClause>>;
type GeneratorOutcome = Result<Result<DesignArtifact, GenerationError>, JoinError>;

struct RunDriver {
    run: PipelineRun,
    seq: u64,
    project: Arc<Project>,
    document: DrawingDocument,
    config: PipelineConfig,
    registry: GeneratorRegistry,
    source: Arc<dyn StandardsSource>,
    standards: Arc<OnceCell<Arc<StandardsRepository>>>,
    snapshots: watch::Sender<PipelineRun>,
    events: broadcast::Sender<ProgressEvent>,
    cancel: watch::Receiver<bool>,
    guard: Option<ActiveRun>,
}

impl RunDriver {
    async fn drive(mut self) -> PipelineRun {
        let started = Instant::now();
        emit_run_started(
            &self.run.id.to_string(),
            &self.project.id.to_string(),
            self.project.disciplines.len(),
        );
        self.run.status = RunStatus::Processing;
        self.run.started_at = Some(Utc::now());
        self.publish();

        if let Err(Halt::Cancelled) = self.stages().await {
            self.mark_cancelled();
        }
        self.finish(started)
    }

    async fn stages(&mut self) -> Result<(), Halt> {
        let building = self.ingest_and_extract().await?;
        let clauses = self.load_standards().await?;
        self.generate(building, &clauses).await?;
        self.validate(&clauses)?;
        self.document()
    }

    fn checkpoint(&self) -> Result<(), Halt> {
        if *self.cancel.borrow() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn ingest_and_extract(&mut self) -> Result<Arc<BuildingModel>, Halt> {
        self.checkpoint()?;
        self.begin(StageId::Ingest);
        let document = self.document.clone();
        let ingest_config = self.config.ingest.clone();
        let geometry =
            match tokio::task::spawn_blocking(move || ingest(&document, &ingest_config)).await {
                Ok(Ok(model)) => model,
                Ok(Err(e)) => return Err(self.abort(StageId::Ingest, e.to_string())),
                Err(e) => return Err(self.abort(StageId::Ingest, e.to_string())),
            };
        self.complete(StageId::Ingest);

        self.checkpoint()?;
        self.begin(StageId::Extract);
        let extract_config = self.config.extract.clone();
        let building =
            match tokio::task::spawn_blocking(move || extract(&geometry, &extract_config)).await {
                Ok(Ok(building)) => building,
                Ok(Err(e)) => return Err(self.abort(StageId::Extract, e.to_string())),
                Err(e) => return Err(self.abort(StageId::Extract, e.to_string())),
            };
        self.complete(StageId::Extract);
        Ok(Arc::new(building))
    }

    async fn load_standards(&mut self) -> Result<Clauses, Halt> {
        self.checkpoint()?;
        self.begin(StageId::LoadStandards);
        let cell = Arc::clone(&self.standards);
        let source = Arc::clone(&self.source);
        let loaded = cell
            .get_or_try_init(|| async move {
                StandardsRepository::load(source.as_ref()).await.map(Arc::new)
            })
            .await;
        let repository = match loaded {
            Ok(repository) => Arc::clone(repository),
            Err(e) => return Err(self.abort(StageId::LoadStandards, e.to_string())),
        };

        self.run.standards_version = Some(repository.version().to_string());
        let mut clauses = Clauses::new();
        for discipline in self.project.ordered_disciplines() {
            let found = match repository.lookup(self.project.region, self.project.category, discipline) {
                Ok(found) => found,
                Err(e) => {
                    info!(event = "standards.none", discipline = %discipline, "{e}");
                    self.run.notices.push(e.to_string());
                    Vec::new()
                }
            };
            clauses.insert(discipline, found);
        }
        self.complete(StageId::LoadStandards);
        Ok(clauses)
    }

    async fn generate(&mut self, building: Arc<BuildingModel>, clauses: &Clauses) -> Result<(), Halt> {
        self.checkpoint()?;
        let permits = Arc::new(Semaphore::new(self.config.max_parallel_generators.max(1)));
        let (started_tx, mut started_rx) = mpsc::unbounded_channel::<Discipline>();
        let mut tasks: JoinSet<GeneratorOutcome> = JoinSet::new();
        let mut spawned: HashMap<Id, Discipline> = HashMap::new();

        for discipline in self.project.ordered_disciplines() {
            let Some(generator) = self.registry.get(discipline) else {
                self.fail_stage(
                    StageId::Generate(discipline),
                    Some(discipline),
                    format!("no generator registered for {discipline}"),
                );
                continue;
            };
            let input = GenerationInput::new(
                Arc::clone(&building),
                clauses.get(&discipline).cloned().unwrap_or_default(),
                Arc::clone(&self.project),
            );
            let permits = Arc::clone(&permits);
            let started_tx = started_tx.clone();
            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let _ = started_tx.send(discipline);
                tokio::task::spawn_blocking(move || generator.generate(&input)).await
            });
            spawned.insert(handle.id(), discipline);
        }
        drop(started_tx);

        let mut cancel = self.cancel.clone();
        let mut cancel_open = true;
        loop {
            tokio::select! {
                biased;
                changed = cancel.changed(), if cancel_open => {
                    if changed.is_err() {
                        cancel_open = false;
                    } else if *cancel.borrow() {
                        // In-flight blocking work is detached, not interrupted.
                        tasks.abort_all();
                        return Err(Halt::Cancelled);
                    }
                }
                Some(discipline) = started_rx.recv() => {
                    self.begin(StageId::Generate(discipline));
                }
                joined = tasks.join_next_with_id() => {
                    let (id, outcome) = match joined {
                        None => break,
                        Some(Ok((id, outcome))) => (id, outcome),
                        Some(Err(e)) => (e.id(), Err(e)),
                    };
                    let Some(discipline) = spawned.remove(&id) else {
                        warn!(task = %id, "result from unknown generator task");
                        continue;
                    };
                    let stage = StageId::Generate(discipline);
                    match outcome {
                        Ok(Ok(artifact)) => {
                            info!(discipline = %discipline, artifact = %artifact.id, size = artifact.size_bytes, "artifact generated");
                            self.run.artifacts.push(artifact);
                            self.complete(stage);
                        }
                        Ok(Err(e)) => self.fail_stage(stage, Some(discipline), e.reason),
                        Err(e) => self.fail_stage(
                            stage,
                            Some(discipline),
                            format!("generator task failed: {e}"),
                        ),
                    }
                }
            }
        }

        self.run.artifacts.sort_by_key(|a| a.discipline);
        self.publish();
        Ok(())
    }

    fn validate(&mut self, clauses: &Clauses) -> Result<(), Halt> {
        self.checkpoint()?;
        self.begin(StageId::Validate);
        let run_id = self.run.id.to_string();
        let total = self.run.artifacts.len();
        let mut failures = 0;
        for i in 0..total {
            let discipline = self.run.artifacts[i].discipline;
            let applicable = clauses.get(&discipline).map(Vec::as_slice).unwrap_or(&[]);
            match validate_artifact(&self.run.artifacts[i], applicable) {
                Ok(results) => {
                    let passed = results.iter().filter(|r| r.passed).count();
                    emit_compliance_evaluated(
                        &run_id,
                        discipline.name(),
                        results.len(),
                        passed,
                        project_score(&results),
                    );
                    self.run.compliance.extend(results);
                }
                Err(e) => {
                    failures += 1;
                    self.record_error(StageId::Validate, Some(discipline), e.to_string());
                }
            }
            self.transition(StageId::Validate, StageStatus::Active, ((i + 1) * 100 / total) as u8, None);
        }
        if failures > 0 {
            self.transition(
                StageId::Validate,
                StageStatus::Error,
                100,
                Some(format!("{failures} artifact(s) could not be validated")),
            );
        } else {
            self.complete(StageId::Validate);
        }
        Ok(())
    }

    fn document(&mut self) -> Result<(), Halt> {
        self.checkpoint()?;
        self.begin(StageId::Document);
        let status = if self.run.errors.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::Error
        };
        let mut report = RunReport::new(
            self.run.id,
            &self.project,
            &self.run.artifacts,
            self.run.compliance.clone(),
        )
        .with_status(status.name())
        .with_notices(self.run.notices.clone())
        .with_errors(self.run.errors.iter().map(ToString::to_string).collect());
        if let Some(version) = &self.run.standards_version {
            report = report.with_standards_version(version.clone());
        }
        self.run.documents.push(RunDocument {
            name: REPORT_DOCUMENT.to_string(),
            media_type: "text/markdown".to_string(),
            content: render_compliance_report_md(&report),
        });
        self.run.report = Some(report);
        self.complete(StageId::Document);
        Ok(())
    }

    fn mark_cancelled(&mut self) {
        let abandoned: Vec<StageId> = self
            .run
            .stages
            .iter()
            .filter(|s| {
                s.status == StageStatus::Active
                    || (s.status == StageStatus::Pending && matches!(s.id, StageId::Generate(_)))
            })
            .map(|s| s.id)
            .collect();
        for id in abandoned {
            let progress = self.run.stage(id).map_or(0, |s| s.progress);
            self.transition(id, StageStatus::Error, progress, Some("cancelled".to_string()));
        }
        self.run.failure = Some(FailureReason::Cancelled);
        info!(event = "run.cancelled", run_id = %self.run.id);
    }

    fn finish(mut self, started: Instant) -> PipelineRun {
        self.run.project_score = project_score(&self.run.compliance);
        if self.run.failure.is_none() && !self.run.errors.is_empty() {
            self.run.failure = Some(FailureReason::DisciplineErrors {
                count: self.run.errors.len(),
            });
        }
        self.run.status = if self.run.failure.is_some() {
            RunStatus::Error
        } else {
            RunStatus::Completed
        };
        self.run.finished_at = Some(Utc::now());
        emit_run_finished(
            &self.run.id.to_string(),
            self.run.status.name(),
            started.elapsed().as_millis() as u64,
            self.run.artifacts.len(),
            self.run.errors.len(),
        );
        // Free the project slot before observers can see the terminal state.
        drop(self.guard.take());
        self.publish();
        self.run
    }

    // -- state writes -------------------------------------------------------

    fn publish(&self) {
        self.snapshots.send_replace(self.run.clone());
    }

    fn transition(&mut self, id: StageId, status: StageStatus, progress: u8, error: Option<String>) {
        let Some(stage) = self.run.stage_mut(id) else {
            return;
        };
        if !stage.status.can_transition_to(status) {
            warn!(stage = %stage.name, from = %stage.status, to = %status, "ignoring invalid stage transition");
            return;
        }
        let now = Utc::now();
        if status == StageStatus::Active && stage.started_at.is_none() {
            stage.started_at = Some(now);
        }
        if status.is_settled() {
            stage.finished_at = Some(now);
        }
        stage.status = status;
        stage.progress = progress.min(100);
        if error.is_some() {
            stage.error = error;
        }
        let name = stage.name.clone();
        let progress = stage.progress;

        self.seq += 1;
        emit_stage_transition(&self.run.id.to_string(), &name, status.name(), progress);
        // No subscribers is fine.
        let _ = self.events.send(ProgressEvent {
            run_id: self.run.id,
            seq: self.seq,
            stage: name,
            status,
            progress,
            at: now,
        });
        self.publish();
    }

    fn begin(&mut self, id: StageId) {
        self.transition(id, StageStatus::Active, 0, None);
    }

    fn complete(&mut self, id: StageId) {
        self.transition(id, StageStatus::Completed, 100, None);
    }

    fn record_error(&mut self, id: StageId, discipline: Option<Discipline>, message: String) {
        emit_stage_error(&self.run.id.to_string(), &id.name(), &message);
        self.run.errors.push(RunError {
            stage: id.name(),
            discipline,
            message,
        });
    }

    fn fail_stage(&mut self, id: StageId, discipline: Option<Discipline>, message: String) {
        self.record_error(id, discipline, message.clone());
        let progress = self.run.stage(id).map_or(0, |s| s.progress);
        self.transition(id, StageStatus::Error, progress, Some(message));
    }

    /// Fail a run-wide stage; later stages never run.
    fn abort(&mut self, id: StageId, reason: String) -> Halt {
        self.fail_stage(id, None, reason.clone());
        self.run.failure = Some(FailureReason::StageFailed {
            stage: id.name(),
            reason,
        });
        Halt::Failed
    }
}
