//! Tool dispatcher
//!
//! Runs the non-LLM steps. Tool results are never reviewed: a tool call
//! either produces typed output, which counts as approved, or fails.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;
use crate::events::RunLog;
use crate::github::GitHubError;
use crate::plan::{PlanStep, ToolCall};
use crate::scratchpad::{Scratchpad, StepOutput};
use crate::services::{with_deadline, FileSelector, RepoSource, TreeEntry};

/// Upper bound on files selected for, and fetched by, a single step
pub const MAX_SELECTED_FILES: usize = 5;

#[derive(Deserialize)]
#[serde(untagged)]
enum TreePayload {
    Wrapped { tree: Vec<TreeEntry> },
    Bare(Vec<TreeEntry>),
}

#[derive(Deserialize)]
struct SelectionPayload {
    files: Vec<String>,
}

/// Executes tool steps against the repository collaborators
pub struct ToolDispatcher {
    repo: Arc<dyn RepoSource>,
    selector: Arc<dyn FileSelector>,
    deadline: Option<Duration>,
    max_files: usize,
}

impl ToolDispatcher {
    pub fn new(
        repo: Arc<dyn RepoSource>,
        selector: Arc<dyn FileSelector>,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            repo,
            selector,
            deadline,
            max_files: MAX_SELECTED_FILES,
        }
    }

    /// Lower the per-step file cap (never above [`MAX_SELECTED_FILES`])
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.clamp(1, MAX_SELECTED_FILES);
        self
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Run the tool declared by `step`
    pub async fn dispatch(
        &self,
        step: &PlanStep,
        scratchpad: &Scratchpad,
        log: &mut RunLog,
    ) -> Result<StepOutput, ToolError> {
        match &step.tool {
            ToolCall::None => Err(ToolError::NoTool {
                ordinal: step.ordinal,
            }),
            ToolCall::RepoTreeFetch { repo_url } => self.fetch_tree(step, repo_url, log).await,
            ToolCall::FileSelection => self.select_files(step, scratchpad, log).await,
            ToolCall::FileContentFetch { repo_url } => {
                self.fetch_contents(step, repo_url, scratchpad, log).await
            }
        }
    }

    async fn fetch_tree(
        &self,
        step: &PlanStep,
        repo_url: &str,
        log: &mut RunLog,
    ) -> Result<StepOutput, ToolError> {
        log.info(step.role, format!("Fetching file tree for {}...", repo_url));

        let tree = with_deadline(self.deadline, "repository tree fetch", self.repo.get_repo_tree(repo_url))
            .await
            .map_err(|e| classify(step.ordinal, e))?;

        log.info(
            step.role,
            format!("File tree fetched successfully. Total files: {}.", tree.len()),
        );
        Ok(StepOutput::RepoTree(tree))
    }

    async fn select_files(
        &self,
        step: &PlanStep,
        scratchpad: &Scratchpad,
        log: &mut RunLog,
    ) -> Result<StepOutput, ToolError> {
        let tree = upstream_tree(step.ordinal, scratchpad)?;
        log.info(
            step.role,
            format!("Selecting relevant files from {} entries...", tree.len()),
        );

        let rendered = scratchpad.render();
        let mut files = with_deadline(
            self.deadline,
            "file selection",
            self.selector.select_files(&tree, &rendered, step),
        )
        .await
        .map_err(|e| classify(step.ordinal, e))?;

        if files.len() > self.max_files {
            log.warning(
                step.role,
                format!(
                    "Selector returned {} files; keeping the first {}.",
                    files.len(),
                    self.max_files
                ),
            );
            files.truncate(self.max_files);
        }

        log.info(
            step.role,
            format!("Selected {} file(s): {}", files.len(), files.join(", ")),
        );
        Ok(StepOutput::FileSelection(files))
    }

    async fn fetch_contents(
        &self,
        step: &PlanStep,
        repo_url: &str,
        scratchpad: &Scratchpad,
        log: &mut RunLog,
    ) -> Result<StepOutput, ToolError> {
        let files = upstream_selection(step.ordinal, scratchpad)?;
        if files.len() > self.max_files {
            return Err(ToolError::TooManyFiles {
                ordinal: step.ordinal,
                requested: files.len(),
                max: self.max_files,
            });
        }

        log.info(
            step.role,
            format!("Fetching content for {} file(s) from {}...", files.len(), repo_url),
        );

        let contents = with_deadline(
            self.deadline,
            "file content fetch",
            self.repo.get_files_content(repo_url, &files),
        )
        .await
        .map_err(|e| classify(step.ordinal, e))?;

        log.info(
            step.role,
            format!("Fetched content for {} file(s).", contents.len()),
        );
        Ok(StepOutput::FileContents(contents))
    }
}

/// Bad input from the plan is fatal; anything else from the source is retried
fn classify(ordinal: u32, err: anyhow::Error) -> ToolError {
    match err.downcast_ref::<GitHubError>() {
        Some(GitHubError::InvalidRepoUrl(url)) => ToolError::InvalidParameter {
            ordinal,
            parameter: "repoUrl".to_string(),
            reason: format!("'{}' is not a GitHub repository URL", url),
        },
        Some(GitHubError::TooManyFiles { requested, max }) => ToolError::TooManyFiles {
            ordinal,
            requested: *requested,
            max: *max,
        },
        _ => ToolError::Collaborator(format!("{:#}", err)),
    }
}

fn missing(ordinal: u32, reason: impl Into<String>) -> ToolError {
    ToolError::MissingUpstreamOutput {
        ordinal,
        reason: reason.into(),
    }
}

/// Repository tree from the most recent record
fn upstream_tree(ordinal: u32, scratchpad: &Scratchpad) -> Result<Vec<TreeEntry>, ToolError> {
    let record = scratchpad
        .last_record()
        .ok_or_else(|| missing(ordinal, "no preceding step output to select files from"))?;

    let tree = match &record.output {
        StepOutput::RepoTree(tree) => tree.clone(),
        StepOutput::Text(text) => match agent::llm::parse_json::<TreePayload>(text) {
            Ok(TreePayload::Wrapped { tree }) | Ok(TreePayload::Bare(tree)) => tree,
            Err(e) => {
                return Err(missing(
                    ordinal,
                    format!("step {} output is not a file tree: {}", record.ordinal, e),
                ))
            }
        },
        _ => {
            return Err(missing(
                ordinal,
                format!("step {} did not produce a file tree", record.ordinal),
            ))
        }
    };

    if tree.is_empty() {
        return Err(missing(ordinal, "the file tree is empty"));
    }
    Ok(tree)
}

/// Selected paths from the most recent record
fn upstream_selection(ordinal: u32, scratchpad: &Scratchpad) -> Result<Vec<String>, ToolError> {
    let record = scratchpad
        .last_record()
        .ok_or_else(|| missing(ordinal, "no preceding step output with a file list"))?;

    let files = match &record.output {
        StepOutput::FileSelection(files) => files.clone(),
        StepOutput::Text(text) => agent::llm::parse_json::<SelectionPayload>(text)
            .map(|payload| payload.files)
            .map_err(|e| {
                missing(
                    ordinal,
                    format!("step {} output has no file list: {}", record.ordinal, e),
                )
            })?,
        _ => {
            return Err(missing(
                ordinal,
                format!("step {} did not produce a file selection", record.ordinal),
            ))
        }
    };

    if files.is_empty() {
        return Err(missing(ordinal, "the file list is empty"));
    }
    Ok(files)
}
