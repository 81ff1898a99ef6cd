//! Structured observability hooks for pipeline run lifecycle events.
//!
//! - `run_span` for run-scoped spans
//! - `emit_*` functions for run start, stage transitions, compliance
//!   evaluation, errors and run finish
//!
//! All events carry an `event` key so log pipelines can filter on it.

use tracing::{info, warn, Span};

/// Run-scoped span; attach to the run task with `Instrument`.
///
/// ```ignore
/// driver.drive().instrument(run_span("run-123", "project-9")).await
/// ```
pub fn run_span(run_id: &str, project_id: &str) -> Span {
    tracing::info_span!("tga.run", run_id = %run_id, project_id = %project_id)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, project_id: &str, disciplines: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        project_id = %project_id,
        disciplines = disciplines,
    );
}

/// Emit event: a stage changed status.
pub fn emit_stage_transition(run_id: &str, stage: &str, status: &str, progress: u8) {
    info!(
        event = "stage.transition",
        run_id = %run_id,
        stage = %stage,
        status = %status,
        progress = progress,
    );
}

/// Emit event: a discipline's artifact was validated.
pub fn emit_compliance_evaluated(
    run_id: &str,
    discipline: &str,
    evaluated: usize,
    passed: usize,
    mean_score: Option<f64>,
) {
    info!(
        event = "compliance.evaluated",
        run_id = %run_id,
        discipline = %discipline,
        evaluated = evaluated,
        passed = passed,
        mean_score = mean_score.unwrap_or(0.0),
    );
}

/// Emit event: a stage failed (warning level).
pub fn emit_stage_error(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "stage.error", run_id = %run_id, stage = %stage, error = %error);
}

/// Emit event: run reached a terminal state.
pub fn emit_run_finished(
    run_id: &str,
    status: &str,
    duration_ms: u64,
    artifacts: usize,
    errors: usize,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = %status,
        duration_ms = duration_ms,
        artifacts = artifacts,
        errors = errors,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _entered = run_span("test-run", "test-project").entered();
        emit_stage_transition("test-run", "ingest", "active", 0);
    }
}
