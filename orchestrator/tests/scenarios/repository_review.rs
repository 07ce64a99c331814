use serde_json::json;

use orchestrator::{AgentRole, Artifact, Goal, LogLevel, MediaKind, RunState, RunnerConfig, StepOutput};

use crate::support::{
    messages, raw_steps, warnings_starting_with, Harness, ScriptedExecutor, ScriptedSynthesizer,
    WidgetsRepo, ACME_REPO,
};

fn review_plan() -> Vec<orchestrator::RawPlanStep> {
    raw_steps(json!([
        {
            "step": 1,
            "task": "Fetch the file tree of the repository",
            "agent": "GitHub Tool User",
            "tool": "repo-tree-fetch",
            "toolInput": { "repoUrl": ACME_REPO }
        },
        {
            "step": 2,
            "task": "Pick the files most relevant to a code review",
            "agent": "Code Generator",
            "tool": "file-selection",
            "dependencies": [1]
        },
        {
            "step": 3,
            "task": "Fetch the selected files",
            "agent": "GitHub Tool User",
            "tool": "file-content-fetch",
            "toolInput": { "repoUrl": ACME_REPO },
            "dependencies": [2]
        },
        {
            "step": 4,
            "task": "Analyze the code for bugs and style problems",
            "agent": "Data Analyst",
            "dependencies": [3]
        },
        {
            "step": 5,
            "task": "Write the code review report",
            "agent": "Report Writer",
            "dependencies": [4]
        }
    ]))
}

fn review_harness() -> Harness {
    Harness::new(review_plan()).with_synthesizer(ScriptedSynthesizer::returning(vec![
        Artifact::new("report.md", "# Code review of acme/widgets"),
    ]))
}

#[tokio::test]
async fn test_repository_review_end_to_end() {
    let harness = review_harness();
    let goal = format!("review {}", ACME_REPO);
    let run = harness.runner().run(Goal::new(goal)).await;

    assert_eq!(run.state, RunState::Finished);
    assert_eq!(run.scratchpad.records().len(), 5);

    let artifacts = run.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].name, "report.md");
    assert_eq!(artifacts[0].media_kind, MediaKind::Markdown);

    assert_eq!(harness.repo.tree_call_count(), 1);
    assert_eq!(harness.selector.call_count(), 1);
    assert_eq!(
        harness.repo.content_requests(),
        vec![vec![
            "src/lib.rs".to_string(),
            "src/widget.rs".to_string(),
            "src/gadget.rs".to_string(),
        ]]
    );

    assert_eq!(warnings_starting_with(&run, "Retrying"), 0);
}

#[tokio::test]
async fn test_tool_steps_are_never_reviewed() {
    let harness = review_harness();
    harness.runner().run(Goal::new("Review acme/widgets")).await;

    assert_eq!(harness.reviewer.reviewed_ordinals(), vec![4, 5]);
    let executed: Vec<u32> = harness.executor.calls().iter().map(|c| c.ordinal).collect();
    assert_eq!(executed, vec![4, 5]);
}

#[tokio::test]
async fn test_tool_records_are_typed() {
    let harness = review_harness();
    let run = harness.runner().run(Goal::new("Review acme/widgets")).await;
    let pad = &run.scratchpad;

    match &pad.record_for_ordinal(1).unwrap().output {
        StepOutput::RepoTree(tree) => {
            assert_eq!(tree.len(), 7);
            assert_eq!(tree.iter().filter(|e| e.is_file()).count(), 5);
        }
        other => panic!("expected a tree, got {:?}", other),
    }

    match &pad.record_for_ordinal(2).unwrap().output {
        StepOutput::FileSelection(files) => assert_eq!(files.len(), 3),
        other => panic!("expected a selection, got {:?}", other),
    }

    match &pad.record_for_ordinal(3).unwrap().output {
        StepOutput::FileContents(contents) => {
            assert_eq!(contents.len(), 3);
            assert_eq!(contents[0].path, "src/lib.rs");
            assert_eq!(
                contents[0].content,
                format!("// src/lib.rs from {}", ACME_REPO)
            );
        }
        other => panic!("expected file contents, got {:?}", other),
    }

    assert_eq!(
        pad.record_for_ordinal(3).unwrap().role,
        AgentRole::GitHubToolUser
    );
}

#[tokio::test]
async fn test_analysis_step_sees_fetched_files() {
    let harness = review_harness();
    harness.runner().run(Goal::new("Review acme/widgets")).await;

    let analysis = &harness.executor.calls_for(4)[0];
    assert!(analysis.scratchpad.contains("--- FILE: src/widget.rs ---"));
    assert!(analysis.scratchpad.contains("// src/gadget.rs from"));
    assert!(!analysis.scratchpad.contains("docs/guide.md from"));
}

#[tokio::test]
async fn test_unreachable_repository_is_retried_then_fails() {
    let harness = review_harness().with_repo(WidgetsRepo::unreachable());
    let run = harness.runner().run(Goal::new("Review acme/widgets")).await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(harness.repo.tree_call_count(), 3);
    assert_eq!(warnings_starting_with(&run, "Retrying step"), 2);
    assert_eq!(harness.selector.call_count(), 0);
    assert!(harness.reviewer.reviewed_ordinals().is_empty());
    assert!(run.scratchpad.records().is_empty());
    assert!(run.error().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_selection_without_tree_fails_without_retry() {
    let plan = raw_steps(json!([
        { "task": "Pick files", "agent": "Code Generator", "tool": "file-selection" }
    ]));
    let harness = Harness::new(plan);
    let run = harness.runner().run(Goal::new("Review acme/widgets")).await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(harness.selector.call_count(), 0);
    assert_eq!(warnings_starting_with(&run, "Retrying"), 0);
    assert!(run.error().unwrap().contains("missing upstream output"));
}

#[tokio::test]
async fn test_demo_plan_file_runs() {
    let plan = orchestrator::Plan::from_toml(include_str!("../../../demos/review-plan.toml")).unwrap();
    assert_eq!(plan.len(), 5);

    let harness = review_harness();
    let run = harness
        .runner()
        .run_with_plan(Goal::new(format!("review {}", ACME_REPO)), plan)
        .await;

    assert_eq!(run.state, RunState::Finished);
    assert_eq!(run.scratchpad.records().len(), 5);
    assert_eq!(harness.planner.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(harness.reviewer.reviewed_ordinals(), vec![4, 5]);
}

#[tokio::test]
async fn test_configured_file_cap_limits_selection() {
    let harness = review_harness();
    let run = harness
        .runner_with(RunnerConfig::default().with_max_files(2))
        .run(Goal::new("Review acme/widgets"))
        .await;

    assert_eq!(run.state, RunState::Finished);
    assert_eq!(
        harness.repo.content_requests(),
        vec![vec!["src/lib.rs".to_string(), "src/widget.rs".to_string()]]
    );
    assert!(messages(&run).contains(&"Selector returned 3 files; keeping the first 2.".to_string()));
}

#[tokio::test]
async fn test_file_list_over_configured_cap_fails_without_retry() {
    let plan = raw_steps(json!([
        { "step": 1, "task": "List the files worth reading", "agent": "Code Generator" },
        {
            "step": 2,
            "task": "Fetch the listed files",
            "agent": "GitHub Tool User",
            "tool": "file-content-fetch",
            "toolInput": { "repoUrl": ACME_REPO },
            "dependencies": [1]
        }
    ]));
    let harness = Harness::new(plan).with_executor(ScriptedExecutor::new(|_, _| {
        Ok(r#"{"files": ["src/lib.rs", "src/widget.rs", "src/gadget.rs"]}"#.to_string())
    }));

    let run = harness
        .runner_with(RunnerConfig::default().with_max_files(2))
        .run(Goal::new("Review acme/widgets"))
        .await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(warnings_starting_with(&run, "Retrying step"), 0);
    assert!(harness.repo.content_requests().is_empty());
    assert!(run.error().unwrap().contains("3 files requested"));
}

#[tokio::test]
async fn test_non_github_repository_fails_without_retry() {
    let plan = raw_steps(json!([
        {
            "task": "Fetch the file tree",
            "agent": "GitHub Tool User",
            "tool": "repo-tree-fetch",
            "toolInput": { "repoUrl": "https://gitlab.com/acme/widgets" }
        }
    ]));
    let harness = Harness::new(plan);
    let run = harness.runner().run(Goal::new("Review acme/widgets")).await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(harness.repo.tree_call_count(), 1);
    assert_eq!(warnings_starting_with(&run, "Retrying step"), 0);
    assert_eq!(
        run.log
            .iter()
            .filter(|e| e.level == LogLevel::Error && e.message.starts_with("Tool failed"))
            .count(),
        1
    );
    assert!(run.error().unwrap().contains("repoUrl"));
}
