//! Multi-agent orchestration engine for agentflow
//!
//! This crate provides:
//! - A plan model with typed tool calls and agent roles
//! - A plan runner that executes steps in order with reviewer-gated retries
//! - A tool dispatcher for repository tree, file selection and content steps
//! - An append-only scratchpad shared by all steps
//! - LLM-backed planner, executor, reviewer and synthesizer collaborators
//!
//! # Example
//!
//! ```rust,ignore
//! use orchestrator::{Goal, PlanRunner, RunnerConfig};
//!
//! let runner = PlanRunner::new(services, RunnerConfig::default());
//! let run = runner.run(Goal::new("Review https://github.com/acme/widgets")).await;
//!
//! for artifact in run.artifacts() {
//!     println!("{}", artifact.name);
//! }
//! ```

pub mod agent_config;
pub mod artifact;
pub mod checkpoint;
pub mod error;
pub mod events;
pub mod executor;
pub mod github;
pub mod history;
pub mod plan;
pub mod planner;
pub mod prompts;
pub mod retry;
pub mod review;
pub mod runner;
pub mod scratchpad;
pub mod selector;
pub mod selftest;
pub mod services;
pub mod synthesizer;
pub mod tools;

pub use agent_config::{RoleProfile, RoleRegistry};
pub use artifact::{Artifact, MediaKind};
pub use checkpoint::{PlanApproval, PlanApprovalHandler};
pub use error::{OrchestratorError, PlanError, ToolError};
pub use events::{event_channel, LogEntry, LogLevel, RunEvent, RunEventSender};
pub use plan::{AgentRole, Goal, Plan, PlanStep, RawPlanStep, ToolCall, UploadedFile};
pub use review::{ReviewDecision, ReviewResult, ReviewVerdict};
pub use runner::{PlanRunner, Run, RunOutcome, RunState, RunnerConfig};
pub use scratchpad::{Scratchpad, StepOutput, StepRecord};
pub use services::{
    FileContent, FileSelector, Planner, RepoSource, Reviewer, Services, StepExecutor,
    Synthesizer, TreeEntry,
};

/// Re-export commonly used types from the agent crate
pub use agent::config::AgentFileConfig;
pub use agent::db::Database;
