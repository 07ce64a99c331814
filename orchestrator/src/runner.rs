//! Plan runner
//!
//! Owns a run from goal submission to its terminal state:
//!
//! ```text
//! Idle → PlanRequested → PlanReady → [AwaitingApproval] → Executing(0..n) → Finished
//!                                                                  ╲
//!                                               any non-terminal → Failed | Cancelled
//! ```
//!
//! Steps run strictly in ordinal order. Each step is resolved by the
//! [`RetryController`]; an approved step's output is appended to the
//! scratchpad exactly once, and the first unresolvable step ends the run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use agent::config::OrchestratorSectionConfig;

use crate::artifact::Artifact;
use crate::checkpoint::{AutoApproveHandler, PlanApproval, PlanApprovalHandler};
use crate::error::{OrchestratorError, PlanError};
use crate::events::{LogEntry, RunEventSender, RunLog};
use crate::history::RunStore;
use crate::plan::{AgentRole, Goal, Plan};
use crate::retry::{RetryController, StepResolution, MAX_RETRIES};
use crate::review::ReviewerGate;
use crate::scratchpad::Scratchpad;
use crate::services::{with_deadline, Services};
use crate::tools::{ToolDispatcher, MAX_SELECTED_FILES};

// ============================================================================
// Run State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    PlanRequested,
    PlanReady,
    AwaitingApproval,
    Executing { step_index: usize },
    Finished,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Finished | RunState::Failed | RunState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state
    pub fn allows(&self, next: &RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (current, Failed | Cancelled) => !current.is_terminal(),
            (Idle, PlanRequested | PlanReady) => true,
            (PlanRequested, PlanReady) => true,
            (PlanReady, AwaitingApproval) => true,
            (PlanReady | AwaitingApproval, Executing { step_index: 0 }) => true,
            (Executing { step_index: from }, Executing { step_index: to }) => *to == from + 1,
            (Executing { .. }, Finished) => true,
            _ => false,
        }
    }
}

// ============================================================================
// Run
// ============================================================================

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Finished { artifacts: Vec<Artifact> },
    Failed { error: String },
    Cancelled { reason: String },
}

/// One orchestration run. Terminal runs are never mutated again.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: String,
    pub goal: Goal,
    pub plan: Option<Plan>,
    pub state: RunState,
    pub log: Vec<LogEntry>,
    pub scratchpad: Scratchpad,
    pub outcome: Option<RunOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(goal: Goal) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scratchpad: Scratchpad::new(goal.context()),
            goal,
            plan: None,
            state: RunState::Idle,
            log: Vec::new(),
            outcome: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.outcome, Some(RunOutcome::Finished { .. }))
    }

    /// Artifacts of a finished run (empty otherwise)
    pub fn artifacts(&self) -> &[Artifact] {
        match &self.outcome {
            Some(RunOutcome::Finished { artifacts }) => artifacts,
            _ => &[],
        }
    }

    /// Error or cancellation reason of an unsuccessful run
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Some(RunOutcome::Failed { error }) => Some(error),
            Some(RunOutcome::Cancelled { reason }) => Some(reason),
            _ => None,
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Retries after the first attempt of a step
    pub max_retries: u32,

    /// Pause in `AwaitingApproval` before executing
    pub require_plan_approval: bool,

    /// Deadline per collaborator call (None = wait indefinitely)
    pub collaborator_timeout: Option<Duration>,

    /// Files a tool step may select or fetch
    pub max_files: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            require_plan_approval: true,
            collaborator_timeout: None,
            max_files: MAX_SELECTED_FILES,
        }
    }
}

impl RunnerConfig {
    /// Create from the `[orchestrator]` config section
    pub fn from_section(section: &OrchestratorSectionConfig) -> Self {
        Self {
            max_retries: section.max_retries,
            require_plan_approval: section.require_plan_approval,
            collaborator_timeout: section.collaborator_timeout_secs.map(Duration::from_secs),
            max_files: MAX_SELECTED_FILES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_plan_approval(mut self, required: bool) -> Self {
        self.require_plan_approval = required;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = Some(timeout);
        self
    }

    /// Align the tool file cap with the repository source's own limit
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }
}

/// Drives runs against a set of collaborators
pub struct PlanRunner {
    services: Services,
    config: RunnerConfig,
    approval: Arc<dyn PlanApprovalHandler>,
    events: RunEventSender,
    cancel: CancellationToken,
    store: Option<Arc<dyn RunStore>>,
}

impl PlanRunner {
    pub fn new(services: Services, config: RunnerConfig) -> Self {
        Self {
            services,
            config,
            approval: Arc::new(AutoApproveHandler),
            events: RunEventSender::none(),
            cancel: CancellationToken::new(),
            store: None,
        }
    }

    /// Set the plan approval strategy
    pub fn with_approval_handler(mut self, handler: Arc<dyn PlanApprovalHandler>) -> Self {
        self.approval = handler;
        self
    }

    /// Publish run events to a channel
    pub fn with_event_sender(mut self, events: RunEventSender) -> Self {
        self.events = events;
        self
    }

    /// Stop between steps once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Save every finished run
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Plan the goal and execute the plan
    pub async fn run(&self, goal: Goal) -> Run {
        self.execute(goal, None).await
    }

    /// Execute a ready-made plan without calling the planner
    pub async fn run_with_plan(&self, goal: Goal, plan: Plan) -> Run {
        self.execute(goal, Some(plan)).await
    }

    /// Ask the planner for a plan without executing it
    pub async fn request_plan(&self, goal: &Goal) -> Result<Plan, OrchestratorError> {
        let raw = with_deadline(
            self.config.collaborator_timeout,
            "plan generation",
            self.services.planner.create_plan(&goal.context()),
        )
        .await
        .map_err(|e| OrchestratorError::PlanGeneration(format!("{:#}", e)))?;

        Ok(Plan::from_raw(raw)?)
    }

    async fn execute(&self, goal: Goal, plan: Option<Plan>) -> Run {
        let mut run = Run::new(goal);
        let mut log = RunLog::new(self.events.clone());
        tracing::info!(run_id = %run.id, "Run started");

        let result = self.drive(&mut run, &mut log, plan).await;
        self.finish(run, log, result)
    }

    async fn drive(
        &self,
        run: &mut Run,
        log: &mut RunLog,
        supplied: Option<Plan>,
    ) -> Result<Vec<Artifact>, OrchestratorError> {
        log.info(AgentRole::User, format!("Goal: {}", run.goal.text));
        if let Some(file) = &run.goal.file {
            log.info(
                AgentRole::User,
                format!(
                    "Attached file: {} ({} characters)",
                    file.name,
                    file.content.chars().count()
                ),
            );
        }

        let plan = match supplied {
            Some(plan) => {
                log.info(
                    AgentRole::Orchestrator,
                    format!("Using supplied plan with {} step(s).", plan.len()),
                );
                plan
            }
            None => {
                self.transition(run, RunState::PlanRequested)?;
                self.check_cancelled()?;
                log.info(AgentRole::Supervisor, "Creating plan...");
                let plan = self.request_plan(&run.goal).await?;
                log.info(
                    AgentRole::Supervisor,
                    format!("Plan created with {} step(s).", plan.len()),
                );
                plan
            }
        };

        if plan.is_empty() {
            return Err(PlanError::Empty.into());
        }
        run.plan = Some(plan.clone());
        self.transition(run, RunState::PlanReady)?;

        if self.config.require_plan_approval {
            self.transition(run, RunState::AwaitingApproval)?;
            log.info(AgentRole::Orchestrator, "Waiting for plan approval...");
            match self.approval.review_plan(&plan).await {
                PlanApproval::Approved => log.info(AgentRole::User, "Plan approved."),
                PlanApproval::Rejected(reason) => {
                    return Err(OrchestratorError::PlanRejected(reason))
                }
            }
        }

        let controller = self.retry_controller();
        for (index, step) in plan.steps().iter().enumerate() {
            self.check_cancelled()?;
            self.transition(run, RunState::Executing { step_index: index })?;
            self.events.step_started(step.ordinal, step.role, &step.task);
            log.info(
                step.role,
                format!("Executing step {}: {}", step.ordinal, step.task),
            );

            match controller.resolve(step, &run.scratchpad, log).await {
                StepResolution::Approved { output, attempts } => {
                    run.scratchpad.append(step.ordinal, step.role, output)?;
                    log.info(
                        step.role,
                        format!("Step {} approved after {} attempt(s).", step.ordinal, attempts),
                    );
                    self.events
                        .scratchpad_updated(step.ordinal, run.scratchpad.render());
                }
                StepResolution::Exhausted {
                    attempts,
                    last_reason,
                } => {
                    log.error(
                        step.role,
                        format!(
                            "Step {} failed after {} retries.",
                            step.ordinal,
                            controller.max_retries()
                        ),
                    );
                    return Err(OrchestratorError::StepFailed {
                        ordinal: step.ordinal,
                        attempts,
                        reason: last_reason,
                    });
                }
                StepResolution::Fatal(source) => {
                    return Err(OrchestratorError::Tool {
                        ordinal: step.ordinal,
                        source,
                    })
                }
            }
        }

        self.check_cancelled()?;
        log.info(AgentRole::Synthesizer, "Synthesizing final artifacts...");
        let artifacts = with_deadline(
            self.config.collaborator_timeout,
            "synthesis",
            self.services
                .synthesizer
                .synthesize_artifacts(&run.scratchpad.render()),
        )
        .await
        .map_err(|e| OrchestratorError::Synthesis(format!("{:#}", e)))?;

        if artifacts.is_empty() {
            return Err(OrchestratorError::Synthesis(
                "synthesizer returned no artifacts".to_string(),
            ));
        }

        log.info(
            AgentRole::Synthesizer,
            format!("Final workspace created with {} file(s).", artifacts.len()),
        );
        self.events.artifacts_ready(&artifacts);
        self.transition(run, RunState::Finished)?;
        Ok(artifacts)
    }

    fn finish(
        &self,
        mut run: Run,
        mut log: RunLog,
        result: Result<Vec<Artifact>, OrchestratorError>,
    ) -> Run {
        let (state, outcome) = match result {
            Ok(artifacts) => (RunState::Finished, RunOutcome::Finished { artifacts }),
            Err(err) if err.is_cancellation() => {
                log.warning(AgentRole::Orchestrator, format!("Run cancelled: {}", err));
                (
                    RunState::Cancelled,
                    RunOutcome::Cancelled {
                        reason: err.to_string(),
                    },
                )
            }
            Err(err) => {
                log.error(AgentRole::Orchestrator, format!("Run failed: {}", err));
                (
                    RunState::Failed,
                    RunOutcome::Failed {
                        error: err.to_string(),
                    },
                )
            }
        };

        if run.state != state {
            if let Err(e) = self.transition(&mut run, state.clone()) {
                tracing::warn!(run_id = %run.id, error = %e, "Forcing terminal state");
                run.state = state;
            }
        }

        run.outcome = Some(outcome);
        run.completed_at = Some(Utc::now());
        run.log = log.into_entries();
        tracing::info!(run_id = %run.id, state = ?run.state, "Run ended");

        if let Some(store) = &self.store {
            if let Err(e) = store.save_finished_run(&run) {
                tracing::warn!(run_id = %run.id, error = %e, "Failed to save run history");
            }
        }

        run
    }

    fn transition(&self, run: &mut Run, next: RunState) -> Result<(), OrchestratorError> {
        if !run.state.allows(&next) {
            return Err(OrchestratorError::IllegalTransition {
                from: format!("{:?}", run.state),
                to: format!("{:?}", next),
            });
        }
        tracing::debug!(run_id = %run.id, from = ?run.state, to = ?next, "State change");
        self.events.state_changed(&next);
        run.state = next;
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), OrchestratorError> {
        if self.cancel.is_cancelled() {
            Err(OrchestratorError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn retry_controller(&self) -> RetryController {
        let deadline = self.config.collaborator_timeout;
        RetryController::new(
            self.services.executor.clone(),
            ReviewerGate::new(self.services.reviewer.clone(), deadline),
            ToolDispatcher::new(
                self.services.repo.clone(),
                self.services.selector.clone(),
                deadline,
            )
            .with_max_files(self.config.max_files),
            self.config.max_retries,
            deadline,
        )
    }
}
