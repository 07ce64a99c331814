use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use agent::db::{Database, RunStatus};
use orchestrator::checkpoint::{AutoApproveHandler, RejectHandler};
use orchestrator::scratchpad::parse_last_record;
use orchestrator::{
    event_channel, Goal, Plan, PlanRunner, RunEvent, RunEventSender, RunOutcome, RunState,
    RunnerConfig, UploadedFile,
};

use crate::support::{
    messages, raw_steps, text_steps, Harness, MemoryStore, ScriptedExecutor, ScriptedSynthesizer,
};

#[tokio::test]
async fn test_rejected_plan_cancels_run() {
    let harness = Harness::new(text_steps(2));
    let runner = PlanRunner::new(harness.services(), RunnerConfig::default())
        .with_approval_handler(Arc::new(RejectHandler));

    let run = runner.run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Cancelled);
    assert!(run.plan.is_some());
    assert!(harness.executor.calls().is_empty());
    assert!(run.error().unwrap().contains("Plan auto-rejected"));
}

#[tokio::test]
async fn test_approved_plan_runs() {
    let harness = Harness::new(text_steps(1));
    let runner = PlanRunner::new(harness.services(), RunnerConfig::default())
        .with_approval_handler(Arc::new(AutoApproveHandler));

    let run = runner.run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Finished);
    assert!(messages(&run).contains(&"Plan approved.".to_string()));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let harness = Harness::new(text_steps(2));
    let token = CancellationToken::new();
    token.cancel();

    let run = harness
        .runner()
        .with_cancellation(token)
        .run(Goal::new("Write a report"))
        .await;

    assert_eq!(run.state, RunState::Cancelled);
    assert_eq!(harness.planner.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(messages(&run).contains(&"Goal: Write a report".to_string()));
    assert!(matches!(run.outcome, Some(RunOutcome::Cancelled { .. })));
}

#[tokio::test]
async fn test_cancelled_between_steps() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let harness = Harness::new(text_steps(3)).with_executor(ScriptedExecutor::new(
        move |step, _| {
            trigger.cancel();
            Ok(format!("output of step {}", step.ordinal))
        },
    ));

    let run = harness
        .runner()
        .with_cancellation(token)
        .run(Goal::new("Write a report"))
        .await;

    // The step in flight completes; nothing after it starts
    assert_eq!(run.state, RunState::Cancelled);
    assert_eq!(run.scratchpad.records().len(), 1);
    assert!(harness.executor.calls_for(2).is_empty());
    assert_eq!(harness.synthesizer.call_count(), 0);
}

#[tokio::test]
async fn test_synthesis_failure_keeps_scratchpad() {
    let harness =
        Harness::new(text_steps(2)).with_synthesizer(ScriptedSynthesizer::failing("model crashed"));

    let run = harness.runner().run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.scratchpad.records().len(), 2);
    assert!(run.artifacts().is_empty());
    assert!(run.error().unwrap().contains("model crashed"));
}

#[tokio::test]
async fn test_empty_synthesis_fails() {
    let harness = Harness::new(text_steps(1)).with_synthesizer(ScriptedSynthesizer::returning(vec![]));

    let run = harness.runner().run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Failed);
    assert!(run.error().unwrap().contains("no artifacts"));
}

#[tokio::test]
async fn test_invalid_plan_fails_before_execution() {
    let harness = Harness::new(raw_steps(json!([
        { "task": "Search the web", "agent": "Web Researcher", "tool": "web-search" }
    ])));

    let run = harness.runner().run(Goal::new("Research something")).await;

    assert_eq!(run.state, RunState::Failed);
    assert!(run.plan.is_none());
    assert!(harness.executor.calls().is_empty());
    assert!(run.error().unwrap().contains("unknown tool 'web-search'"));
}

#[tokio::test]
async fn test_empty_plan_fails() {
    let harness = Harness::new(Vec::new());
    let run = harness.runner().run(Goal::new("Nothing to do")).await;

    assert_eq!(run.state, RunState::Failed);
    assert!(run.error().unwrap().contains("no steps"));
}

#[tokio::test]
async fn test_supplied_plan_skips_planner() {
    let harness = Harness::new(text_steps(5));
    let plan = Plan::from_toml(
        r#"
[[steps]]
task = "Summarize the attached notes"
agent = "Report Writer"
"#,
    )
    .unwrap();

    let goal = Goal::new("Summarize").with_file(UploadedFile::new("notes.txt", "alpha beta"));
    let run = harness.runner().run_with_plan(goal, plan).await;

    assert_eq!(run.state, RunState::Finished);
    assert_eq!(harness.planner.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(harness.executor.calls().len(), 1);
    assert!(harness.executor.calls()[0]
        .scratchpad
        .contains("--- FILE CONTENT (notes.txt) ---\nalpha beta"));
}

#[tokio::test]
async fn test_events_follow_the_run() {
    let harness = Harness::new(text_steps(2));
    let (tx, mut rx) = event_channel();
    let runner = harness.runner().with_event_sender(RunEventSender::new(tx));

    let run = runner.run(Goal::new("Write a report")).await;
    drop(runner);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let started: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::StepStarted { ordinal, .. } => Some(*ordinal),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![1, 2]);

    let updates = events
        .iter()
        .filter(|e| matches!(e, RunEvent::ScratchpadUpdated { .. }))
        .count();
    assert_eq!(updates, 2);

    let logs = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Log(_)))
        .count();
    assert_eq!(logs, run.log.len());

    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::ArtifactsReady { artifacts } if artifacts.len() == 1)));
    assert!(matches!(
        events.last(),
        Some(RunEvent::StateChanged {
            state: RunState::Finished
        })
    ));
}

#[tokio::test]
async fn test_finished_and_failed_runs_are_stored() {
    let store = Arc::new(MemoryStore::default());

    let ok = Harness::new(text_steps(1));
    ok.runner()
        .with_store(store.clone())
        .run(Goal::new("first"))
        .await;

    let failing = Harness::new(text_steps(1)).with_executor(ScriptedExecutor::failing_at(1));
    failing
        .runner()
        .with_store(store.clone())
        .run(Goal::new("second"))
        .await;

    let saved = store.saved.lock().unwrap();
    let states: Vec<RunState> = saved.iter().map(|(_, s)| s.clone()).collect();
    assert_eq!(states, vec![RunState::Finished, RunState::Failed]);
}

#[tokio::test]
async fn test_run_is_replayable_from_database() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let harness = Harness::new(text_steps(2));

    let run = harness
        .runner()
        .with_store(db.clone())
        .run(Goal::new("Write a report"))
        .await;

    let record = db.get_run(&run.id).unwrap().expect("stored run");
    assert_eq!(record.status, RunStatus::Finished);
    assert_eq!(record.goal, "Write a report");
    assert_eq!(record.scratchpad, run.scratchpad.render());
    assert_eq!(record.log.as_array().unwrap().len(), run.log.len());
    assert_eq!(record.artifacts.unwrap()[0]["name"], "summary.md");
    assert!(record.error.is_none());

    let last = parse_last_record(&record.scratchpad).expect("last step record");
    assert_eq!(last.ordinal, 2);
    assert_eq!(last.role, "Report Writer");

    let listed = db.list_runs(10).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, run.id);
}
