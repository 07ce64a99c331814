//! Persistence of finished runs

use agent::db::{Database, RunRecord, RunStatus};
use anyhow::Result;

use crate::runner::{Run, RunOutcome};

/// Accepts finished runs for storage and later replay
pub trait RunStore: Send + Sync {
    fn save_finished_run(&self, run: &Run) -> Result<()>;
}

impl RunStore for Database {
    fn save_finished_run(&self, run: &Run) -> Result<()> {
        self.save_run(&to_record(run)?)
    }
}

/// Convert a terminal run into its stored form
pub fn to_record(run: &Run) -> Result<RunRecord> {
    let completed_at = run.completed_at.unwrap_or_else(chrono::Utc::now);
    let (status, artifacts, error) = match &run.outcome {
        Some(RunOutcome::Finished { artifacts }) => (
            RunStatus::Finished,
            Some(serde_json::to_value(artifacts)?),
            None,
        ),
        Some(RunOutcome::Failed { error }) => (RunStatus::Failed, None, Some(error.clone())),
        Some(RunOutcome::Cancelled { reason }) => {
            (RunStatus::Cancelled, None, Some(reason.clone()))
        }
        None => anyhow::bail!("run {} has not finished", run.id),
    };

    Ok(RunRecord {
        id: run.id.clone(),
        goal: run.goal.text.clone(),
        status,
        started_at: run.started_at,
        completed_at,
        duration_ms: (completed_at - run.started_at).num_milliseconds(),
        uploaded_file: run.goal.file.as_ref().map(serde_json::to_value).transpose()?,
        plan: serde_json::to_value(&run.plan)?,
        log: serde_json::to_value(&run.log)?,
        scratchpad: run.scratchpad.render(),
        artifacts,
        error,
    })
}
