//! Collaborator contracts used by the orchestration core
//!
//! The runner only talks to these traits. LLM-backed implementations live in
//! `planner`, `executor`, `review` and `synthesizer`; repository access in
//! `github`, `selector` and `selftest`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::artifact::Artifact;
use crate::plan::{PlanStep, RawPlanStep};
use crate::review::ReviewVerdict;

// ============================================================================
// Repository Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[serde(alias = "blob")]
    File,
    #[serde(alias = "tree")]
    Dir,
}

/// One entry of a repository tree listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(alias = "type")]
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Content of one repository file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
}

impl FileContent {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Decomposes the goal context into step descriptors
#[async_trait]
pub trait Planner: Send + Sync {
    async fn create_plan(&self, context: &str) -> Result<Vec<RawPlanStep>>;
}

/// Runs a generic (no-tool) step and returns its raw text
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute_step(
        &self,
        step: &PlanStep,
        scratchpad: &str,
        retry_reasoning: &str,
    ) -> Result<String>;
}

/// Judges a generic step's output
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review_step(
        &self,
        step: &PlanStep,
        output: &str,
        scratchpad: &str,
    ) -> Result<ReviewVerdict>;
}

/// Turns the final scratchpad into deliverables
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize_artifacts(&self, scratchpad: &str) -> Result<Vec<Artifact>>;
}

/// Read access to one public repository
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn get_repo_tree(&self, repo_url: &str) -> Result<Vec<TreeEntry>>;

    async fn get_files_content(&self, repo_url: &str, paths: &[String]) -> Result<Vec<FileContent>>;
}

/// Chooses a small set of files worth reading
#[async_trait]
pub trait FileSelector: Send + Sync {
    async fn select_files(
        &self,
        tree: &[TreeEntry],
        scratchpad: &str,
        step: &PlanStep,
    ) -> Result<Vec<String>>;
}

/// All collaborators a runner needs
#[derive(Clone)]
pub struct Services {
    pub planner: Arc<dyn Planner>,
    pub executor: Arc<dyn StepExecutor>,
    pub reviewer: Arc<dyn Reviewer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub repo: Arc<dyn RepoSource>,
    pub selector: Arc<dyn FileSelector>,
}

impl Services {
    /// Replace the repository source (used by the self-test fixture)
    pub fn with_repo(mut self, repo: Arc<dyn RepoSource>) -> Self {
        self.repo = repo;
        self
    }

    /// Replace the file selector
    pub fn with_selector(mut self, selector: Arc<dyn FileSelector>) -> Self {
        self.selector = selector;
        self
    }
}

/// Await a collaborator call, failing it if the optional deadline passes
pub async fn with_deadline<T, F>(deadline: Option<Duration>, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", what, limit))?,
        None => call.await,
    }
}
