//! Scripted collaborators shared by the scenario tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use orchestrator::github::parse_repo_url;
use orchestrator::history::RunStore;
use orchestrator::{
    Artifact, FileContent, FileSelector, LogLevel, PlanRunner, PlanStep, Planner, RawPlanStep,
    RepoSource, ReviewVerdict, Reviewer, Run, RunState, RunnerConfig, Services, StepExecutor,
    Synthesizer, TreeEntry,
};

pub const ACME_REPO: &str = "https://github.com/acme/widgets";

/// Build planner descriptors from JSON the way a model would emit them
pub fn raw_steps(value: Value) -> Vec<RawPlanStep> {
    serde_json::from_value(value).expect("valid step descriptors")
}

/// `count` generic steps handled by the Report Writer
pub fn text_steps(count: u32) -> Vec<RawPlanStep> {
    (1..=count)
        .map(|n| RawPlanStep {
            step: Some(n),
            task: format!("Write section {}", n),
            agent: "Report Writer".to_string(),
            ..Default::default()
        })
        .collect()
}

// ============================================================================
// Planner
// ============================================================================

pub struct ScriptedPlanner {
    steps: Vec<RawPlanStep>,
    pub calls: AtomicUsize,
}

impl ScriptedPlanner {
    pub fn new(steps: Vec<RawPlanStep>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn create_plan(&self, _context: &str) -> Result<Vec<RawPlanStep>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.steps.clone())
    }
}

// ============================================================================
// Executor
// ============================================================================

#[derive(Debug, Clone)]
pub struct ExecutorCall {
    pub ordinal: u32,
    pub scratchpad: String,
    pub retry_reasoning: String,
}

type ExecuteFn = dyn Fn(&PlanStep, usize) -> Result<String> + Send + Sync;

/// Executor whose reply depends on the step and the attempt index (0-based)
pub struct ScriptedExecutor {
    respond: Box<ExecuteFn>,
    pub calls: Mutex<Vec<ExecutorCall>>,
}

impl ScriptedExecutor {
    pub fn new(respond: impl Fn(&PlanStep, usize) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies "output of step N" on every attempt
    pub fn echo() -> Self {
        Self::new(|step, _| Ok(format!("output of step {}", step.ordinal)))
    }

    /// Fails every attempt at `ordinal`, echoes otherwise
    pub fn failing_at(ordinal: u32) -> Self {
        Self::new(move |step, _| {
            if step.ordinal == ordinal {
                Err(anyhow!("model unavailable"))
            } else {
                Ok(format!("output of step {}", step.ordinal))
            }
        })
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, ordinal: u32) -> Vec<ExecutorCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.ordinal == ordinal)
            .collect()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute_step(
        &self,
        step: &PlanStep,
        scratchpad: &str,
        retry_reasoning: &str,
    ) -> Result<String> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let attempt = calls.iter().filter(|c| c.ordinal == step.ordinal).count();
            calls.push(ExecutorCall {
                ordinal: step.ordinal,
                scratchpad: scratchpad.to_string(),
                retry_reasoning: retry_reasoning.to_string(),
            });
            attempt
        };
        (self.respond)(step, attempt)
    }
}

// ============================================================================
// Reviewer
// ============================================================================

type ReviewFn = dyn Fn(&PlanStep, &str, usize) -> ReviewVerdict + Send + Sync;

/// Reviewer whose verdict depends on the step, output and review index
pub struct ScriptedReviewer {
    decide: Box<ReviewFn>,
    pub calls: Mutex<Vec<(u32, String)>>,
}

impl ScriptedReviewer {
    pub fn new(decide: impl Fn(&PlanStep, &str, usize) -> ReviewVerdict + Send + Sync + 'static) -> Self {
        Self {
            decide: Box::new(decide),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn approving() -> Self {
        Self::new(|_, _, _| ReviewVerdict::approve("Looks good"))
    }

    /// Rejects the first `times` reviews of `ordinal`, approves everything else
    pub fn rejecting(ordinal: u32, times: usize, reason: &'static str) -> Self {
        Self::new(move |step, _, n| {
            if step.ordinal == ordinal && n < times {
                ReviewVerdict::revise(reason)
            } else {
                ReviewVerdict::approve("Looks good")
            }
        })
    }

    pub fn reviewed_ordinals(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(o, _)| *o).collect()
    }

    pub fn count_for(&self, ordinal: u32) -> usize {
        self.reviewed_ordinals()
            .into_iter()
            .filter(|o| *o == ordinal)
            .count()
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn review_step(
        &self,
        step: &PlanStep,
        output: &str,
        _scratchpad: &str,
    ) -> Result<ReviewVerdict> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.iter().filter(|(o, _)| *o == step.ordinal).count();
            calls.push((step.ordinal, output.to_string()));
            n
        };
        Ok((self.decide)(step, output, n))
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

pub struct ScriptedSynthesizer {
    reply: Result<Vec<Artifact>, String>,
    pub received: Mutex<Vec<String>>,
}

impl ScriptedSynthesizer {
    pub fn returning(artifacts: Vec<Artifact>) -> Self {
        Self {
            reply: Ok(artifacts),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize_artifacts(&self, scratchpad: &str) -> Result<Vec<Artifact>> {
        self.received.lock().unwrap().push(scratchpad.to_string());
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

// ============================================================================
// Repository
// ============================================================================

/// acme/widgets: two directories and five files
pub struct WidgetsRepo {
    fail_tree: bool,
    pub tree_calls: AtomicUsize,
    pub content_requests: Mutex<Vec<Vec<String>>>,
}

impl WidgetsRepo {
    pub fn new() -> Self {
        Self {
            fail_tree: false,
            tree_calls: AtomicUsize::new(0),
            content_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_tree: true,
            ..Self::new()
        }
    }

    pub fn tree_call_count(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst)
    }

    pub fn content_requests(&self) -> Vec<Vec<String>> {
        self.content_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepoSource for WidgetsRepo {
    async fn get_repo_tree(&self, repo_url: &str) -> Result<Vec<TreeEntry>> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        parse_repo_url(repo_url)?;
        if self.fail_tree {
            return Err(anyhow!("connection refused"));
        }
        Ok(vec![
            TreeEntry::dir("src"),
            TreeEntry::file("src/lib.rs"),
            TreeEntry::file("src/widget.rs"),
            TreeEntry::file("src/gadget.rs"),
            TreeEntry::dir("docs"),
            TreeEntry::file("docs/guide.md"),
            TreeEntry::file("README.md"),
        ])
    }

    async fn get_files_content(&self, repo_url: &str, paths: &[String]) -> Result<Vec<FileContent>> {
        self.content_requests.lock().unwrap().push(paths.to_vec());
        Ok(paths
            .iter()
            .map(|p| FileContent::new(p.clone(), format!("// {} from {}", p, repo_url)))
            .collect())
    }
}

/// Picks the first `count` files of the tree
pub struct FirstFiles {
    count: usize,
    pub calls: AtomicUsize,
}

impl FirstFiles {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSelector for FirstFiles {
    async fn select_files(
        &self,
        tree: &[TreeEntry],
        _scratchpad: &str,
        _step: &PlanStep,
    ) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(tree
            .iter()
            .filter(|e| e.is_file())
            .take(self.count)
            .map(|e| e.path.clone())
            .collect())
    }
}

// ============================================================================
// History
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<(String, RunState)>>,
}

impl RunStore for MemoryStore {
    fn save_finished_run(&self, run: &Run) -> Result<()> {
        self.saved
            .lock()
            .unwrap()
            .push((run.id.clone(), run.state.clone()));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub planner: Arc<ScriptedPlanner>,
    pub executor: Arc<ScriptedExecutor>,
    pub reviewer: Arc<ScriptedReviewer>,
    pub synthesizer: Arc<ScriptedSynthesizer>,
    pub repo: Arc<WidgetsRepo>,
    pub selector: Arc<FirstFiles>,
}

impl Harness {
    /// Echoing executor, approving reviewer, one `summary.md` artifact
    pub fn new(steps: Vec<RawPlanStep>) -> Self {
        Self {
            planner: Arc::new(ScriptedPlanner::new(steps)),
            executor: Arc::new(ScriptedExecutor::echo()),
            reviewer: Arc::new(ScriptedReviewer::approving()),
            synthesizer: Arc::new(ScriptedSynthesizer::returning(vec![Artifact::new(
                "summary.md",
                "# Summary",
            )])),
            repo: Arc::new(WidgetsRepo::new()),
            selector: Arc::new(FirstFiles::new(3)),
        }
    }

    pub fn with_executor(mut self, executor: ScriptedExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn with_reviewer(mut self, reviewer: ScriptedReviewer) -> Self {
        self.reviewer = Arc::new(reviewer);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: ScriptedSynthesizer) -> Self {
        self.synthesizer = Arc::new(synthesizer);
        self
    }

    pub fn with_repo(mut self, repo: WidgetsRepo) -> Self {
        self.repo = Arc::new(repo);
        self
    }

    pub fn services(&self) -> Services {
        Services {
            planner: self.planner.clone(),
            executor: self.executor.clone(),
            reviewer: self.reviewer.clone(),
            synthesizer: self.synthesizer.clone(),
            repo: self.repo.clone(),
            selector: self.selector.clone(),
        }
    }

    /// Runner that skips the approval checkpoint
    pub fn runner(&self) -> PlanRunner {
        self.runner_with(RunnerConfig::default())
    }

    /// Runner over these collaborators with plan approval switched off
    pub fn runner_with(&self, config: RunnerConfig) -> PlanRunner {
        PlanRunner::new(self.services(), config.with_plan_approval(false))
    }
}

// ============================================================================
// Log helpers
// ============================================================================

pub fn messages(run: &Run) -> Vec<String> {
    run.log.iter().map(|e| e.message.clone()).collect()
}

pub fn warnings_starting_with(run: &Run, prefix: &str) -> usize {
    run.log
        .iter()
        .filter(|e| e.level == LogLevel::Warning && e.message.starts_with(prefix))
        .count()
}
