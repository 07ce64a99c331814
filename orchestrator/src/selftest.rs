//! End-to-end self-test against a fixture repository
//!
//! Runs the real planner, executor, reviewer and synthesizer with the
//! repository source swapped for fixed content, so only the model endpoint
//! is exercised.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::checkpoint::AutoApproveHandler;
use crate::plan::Goal;
use crate::runner::{PlanRunner, Run, RunnerConfig};
use crate::services::{FileContent, RepoSource, Services, TreeEntry};
use crate::tools::MAX_SELECTED_FILES;

pub const SELF_TEST_REPO: &str = "https://github.com/test-owner/test-repo";

pub const SELF_TEST_GOAL: &str =
    "Perform a code review on the repository at https://github.com/test-owner/test-repo";

const FIXTURE_FILES: [&str; 5] = [
    "src/index.js",
    "src/App.js",
    "package.json",
    "README.md",
    "src/components/Button.js",
];

/// Repository source with five fixed files and stub content
#[derive(Debug, Default)]
pub struct FixtureRepoSource;

#[async_trait]
impl RepoSource for FixtureRepoSource {
    async fn get_repo_tree(&self, _repo_url: &str) -> Result<Vec<TreeEntry>> {
        let mut tree = vec![TreeEntry::dir("src"), TreeEntry::dir("src/components")];
        tree.extend(FIXTURE_FILES.iter().map(|p| TreeEntry::file(*p)));
        Ok(tree)
    }

    async fn get_files_content(&self, repo_url: &str, paths: &[String]) -> Result<Vec<FileContent>> {
        if paths.len() > MAX_SELECTED_FILES {
            bail!(
                "{} files requested, at most {} per request",
                paths.len(),
                MAX_SELECTED_FILES
            );
        }
        Ok(paths
            .iter()
            .map(|path| {
                FileContent::new(
                    path.clone(),
                    format!("/* Mock content for {} from {} */", path, repo_url),
                )
            })
            .collect())
    }
}

/// Outcome of a self-test run
#[derive(Debug)]
pub struct SelfTestReport {
    pub run: Run,
    pub passed: bool,
    pub problems: Vec<String>,
}

/// Run the self-test goal with the fixture repository.
///
/// Passes when the run finishes with at least one artifact and every plan
/// step left exactly one scratchpad record.
pub async fn run_self_test(services: Services, config: RunnerConfig) -> SelfTestReport {
    let runner = PlanRunner::new(services.with_repo(Arc::new(FixtureRepoSource)), config)
        .with_approval_handler(Arc::new(AutoApproveHandler));
    let run = runner.run(Goal::new(SELF_TEST_GOAL)).await;

    let mut problems = Vec::new();
    if !run.is_finished() {
        problems.push(format!(
            "run did not finish: {}",
            run.error().unwrap_or("no outcome")
        ));
    }
    if run.is_finished() && run.artifacts().is_empty() {
        problems.push("run produced no artifacts".to_string());
    }
    if let Some(plan) = &run.plan {
        if run.is_finished() && run.scratchpad.records().len() != plan.len() {
            problems.push(format!(
                "{} plan steps but {} scratchpad records",
                plan.len(),
                run.scratchpad.records().len()
            ));
        }
    }

    SelfTestReport {
        passed: problems.is_empty(),
        problems,
        run,
    }
}
