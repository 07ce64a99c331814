//! Error types for planning, tool dispatch and run orchestration

use thiserror::Error;

/// A plan that cannot be executed as written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("plan contains no steps")]
    Empty,

    #[error("step ordinals must be dense and start at 1 (expected {expected}, found {found})")]
    NonDenseOrdinals { expected: u32, found: u32 },

    #[error("step {ordinal}: unknown tool '{tool}'")]
    UnknownTool { ordinal: u32, tool: String },

    #[error("step {ordinal}: tool '{tool}' requires parameter '{parameter}'")]
    MissingParameter {
        ordinal: u32,
        tool: String,
        parameter: String,
    },

    #[error("failed to parse plan: {0}")]
    Parse(String),
}

/// Failure inside a tool step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// The preceding record is missing, unparseable or empty
    #[error("step {ordinal}: missing upstream output: {reason}")]
    MissingUpstreamOutput { ordinal: u32, reason: String },

    /// The external source failed; retried like any execution error
    #[error("{0}")]
    Collaborator(String),

    #[error("step {ordinal}: {requested} files requested, at most {max} can be fetched")]
    TooManyFiles {
        ordinal: u32,
        requested: usize,
        max: usize,
    },

    /// A tool parameter the source cannot use, e.g. a non-GitHub URL
    #[error("step {ordinal}: invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        ordinal: u32,
        parameter: String,
        reason: String,
    },

    #[error("step {ordinal} does not declare a tool")]
    NoTool { ordinal: u32 },
}

impl ToolError {
    /// Whether the retry controller may attempt the step again
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Collaborator(_))
    }
}

/// Run-level failure surfaced by the plan runner
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("plan generation failed: {0}")]
    PlanGeneration(String),

    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    #[error("Step {ordinal} failed after {attempts} attempts. Last reason: {reason}")]
    StepFailed {
        ordinal: u32,
        attempts: u32,
        reason: String,
    },

    #[error("Step {ordinal} tool failure: {source}")]
    Tool {
        ordinal: u32,
        #[source]
        source: ToolError,
    },

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("plan rejected: {0}")]
    PlanRejected(String),

    #[error("illegal run state transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("scratchpad already holds a record for step {0}")]
    DuplicateRecord(u32),
}

impl OrchestratorError {
    /// Errors that end a run as cancelled rather than failed
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Cancelled | OrchestratorError::PlanRejected(_)
        )
    }
}
