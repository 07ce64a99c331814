//! Retry controller
//!
//! Resolves one step through a bounded sequence of attempts:
//!
//! ```text
//! Attempting(0) ──fail/REVISE──▶ Attempting(1) ──▶ ... ──▶ Attempting(max)
//!      │                              │                         │
//!   approve                        approve                  fail/REVISE
//!      ▼                              ▼                         ▼
//!   Approved                       Approved              ExhaustedFailure
//! ```
//!
//! Every call to [`RetryController::resolve`] starts from `Attempting(0)`
//! with empty retry reasoning; no state is carried between steps.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;
use crate::events::RunLog;
use crate::plan::PlanStep;
use crate::review::{ReviewDecision, ReviewResult, ReviewerGate};
use crate::scratchpad::{Scratchpad, StepOutput};
use crate::services::{with_deadline, StepExecutor};
use crate::tools::ToolDispatcher;

/// Retries after the first attempt (three attempts in total)
pub const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Attempting(u32),
    Approved,
    ExhaustedFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Approved,
    Rejected,
    Failed,
}

impl AttemptState {
    /// State after attempt `n` ended with `outcome`
    pub fn next(n: u32, outcome: AttemptOutcome, max_retries: u32) -> Self {
        match outcome {
            AttemptOutcome::Approved => AttemptState::Approved,
            AttemptOutcome::Rejected | AttemptOutcome::Failed if n < max_retries => {
                AttemptState::Attempting(n + 1)
            }
            AttemptOutcome::Rejected | AttemptOutcome::Failed => AttemptState::ExhaustedFailure,
        }
    }
}

/// One pass through executor and reviewer; discarded once the step resolves
#[derive(Debug, Clone)]
pub struct ExecutionAttempt {
    pub step_ordinal: u32,
    pub attempt_number: u32,
    pub retry_reasoning: String,
    pub output: Option<StepOutput>,
    pub outcome: AttemptOutcome,
}

/// How a step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResolution {
    Approved { output: StepOutput, attempts: u32 },
    Exhausted { attempts: u32, last_reason: String },
    Fatal(ToolError),
}

enum AttemptError {
    Retryable(String),
    Fatal(ToolError),
}

pub struct RetryController {
    executor: Arc<dyn StepExecutor>,
    gate: ReviewerGate,
    tools: ToolDispatcher,
    max_retries: u32,
    deadline: Option<Duration>,
}

impl RetryController {
    pub fn new(
        executor: Arc<dyn StepExecutor>,
        gate: ReviewerGate,
        tools: ToolDispatcher,
        max_retries: u32,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            executor,
            gate,
            tools,
            max_retries,
            deadline,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Drive `step` to approval, exhaustion, or a fatal tool error
    pub async fn resolve(
        &self,
        step: &PlanStep,
        scratchpad: &Scratchpad,
        log: &mut RunLog,
    ) -> StepResolution {
        let mut state = AttemptState::Attempting(0);
        let mut retry_reasoning = String::new();

        while let AttemptState::Attempting(n) = state {
            if n > 0 {
                log.warning(step.role, format!("Retrying step (Attempt {})...", n + 1));
            }

            let mut attempt = ExecutionAttempt {
                step_ordinal: step.ordinal,
                attempt_number: n,
                retry_reasoning: std::mem::take(&mut retry_reasoning),
                output: None,
                outcome: AttemptOutcome::Failed,
            };

            match self.attempt(step, scratchpad, &attempt.retry_reasoning, log).await {
                Ok((output, None)) => {
                    attempt.output = Some(output);
                    attempt.outcome = AttemptOutcome::Approved;
                }
                Ok((output, Some(review))) => {
                    attempt.output = Some(output);
                    if review.decision == ReviewDecision::Approve {
                        attempt.outcome = AttemptOutcome::Approved;
                    } else {
                        attempt.outcome = AttemptOutcome::Rejected;
                        if n < self.max_retries {
                            log.warning(
                                step.role,
                                format!("Step needs revision. Reason: {}", review.reasoning),
                            );
                        }
                        retry_reasoning = review.reasoning;
                    }
                }
                Err(AttemptError::Retryable(message)) => {
                    log.error(step.role, format!("Execution failed: {}", message));
                    retry_reasoning = format!(
                        "The step failed with an error: {}. You must fix this.",
                        message
                    );
                }
                Err(AttemptError::Fatal(err)) => {
                    log.error(step.role, format!("Tool failed: {}", err));
                    return StepResolution::Fatal(err);
                }
            }

            tracing::debug!(
                step = attempt.step_ordinal,
                attempt = attempt.attempt_number,
                outcome = ?attempt.outcome,
                "Attempt finished"
            );

            state = AttemptState::next(n, attempt.outcome, self.max_retries);
            match state {
                AttemptState::Approved => {
                    if let Some(output) = attempt.output {
                        return StepResolution::Approved {
                            output,
                            attempts: n + 1,
                        };
                    }
                }
                AttemptState::ExhaustedFailure => {
                    return StepResolution::Exhausted {
                        attempts: n + 1,
                        last_reason: retry_reasoning,
                    };
                }
                AttemptState::Attempting(_) => {}
            }
        }

        // Approved always carries output, so this is only reached on a logic error
        StepResolution::Exhausted {
            attempts: self.max_retries + 1,
            last_reason: "step resolved without output".to_string(),
        }
    }

    /// One attempt. Returns the output and, for reviewed steps, the review.
    async fn attempt(
        &self,
        step: &PlanStep,
        scratchpad: &Scratchpad,
        retry_reasoning: &str,
        log: &mut RunLog,
    ) -> Result<(StepOutput, Option<ReviewResult>), AttemptError> {
        if step.tool.is_tool() {
            return match self.tools.dispatch(step, scratchpad, log).await {
                Ok(output) => Ok((output, None)),
                Err(err) if err.is_retryable() => Err(AttemptError::Retryable(err.to_string())),
                Err(err) => Err(AttemptError::Fatal(err)),
            };
        }

        let rendered = scratchpad.render();
        let output = with_deadline(
            self.deadline,
            "step execution",
            self.executor.execute_step(step, &rendered, retry_reasoning),
        )
        .await
        .map_err(|e| AttemptError::Retryable(format!("{:#}", e)))?;

        let review = self
            .gate
            .review(step, &output, &rendered, log)
            .await
            .map_err(|e| AttemptError::Retryable(format!("{:#}", e)))?;

        Ok((StepOutput::Text(output), Some(review)))
    }
}
