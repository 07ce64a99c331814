use orchestrator::{Goal, LogLevel, RunOutcome, RunState, StepOutput};

use crate::support::{
    messages, text_steps, warnings_starting_with, Harness, ScriptedExecutor, ScriptedReviewer,
};

#[tokio::test]
async fn test_rejected_twice_then_approved() {
    let harness = Harness::new(text_steps(3))
        .with_executor(ScriptedExecutor::new(|step, attempt| {
            Ok(format!("draft {} of step {}", attempt + 1, step.ordinal))
        }))
        .with_reviewer(ScriptedReviewer::rejecting(2, 2, "Too vague"));

    let run = harness.runner().run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Finished);
    assert_eq!(harness.executor.calls_for(2).len(), 3);
    assert_eq!(harness.reviewer.count_for(2), 3);
    assert_eq!(harness.executor.calls_for(1).len(), 1);
    assert_eq!(harness.executor.calls_for(3).len(), 1);

    assert_eq!(warnings_starting_with(&run, "Step needs revision"), 2);
    assert_eq!(warnings_starting_with(&run, "Retrying step"), 2);
    assert!(messages(&run).contains(&"Retrying step (Attempt 2)...".to_string()));
    assert!(messages(&run).contains(&"Retrying step (Attempt 3)...".to_string()));

    // Only the approved attempt reaches the scratchpad
    let record = run.scratchpad.record_for_ordinal(2).unwrap();
    assert_eq!(record.output, StepOutput::Text("draft 3 of step 2".to_string()));
    let rendered = run.scratchpad.render();
    assert!(!rendered.contains("draft 1 of step 2"));
    assert!(!rendered.contains("draft 2 of step 2"));
    assert_eq!(run.scratchpad.records().len(), 3);
}

#[tokio::test]
async fn test_rejection_reason_reaches_next_attempt() {
    let harness = Harness::new(text_steps(1))
        .with_reviewer(ScriptedReviewer::rejecting(1, 1, "Cite the sources"));

    harness.runner().run(Goal::new("Write a report")).await;

    let calls = harness.executor.calls_for(1);
    assert_eq!(calls.len(), 2);
    assert!(calls[0].retry_reasoning.is_empty());
    assert_eq!(calls[1].retry_reasoning, "Cite the sources");
}

#[tokio::test]
async fn test_executor_error_exhausts_and_halts() {
    let harness = Harness::new(text_steps(3)).with_executor(ScriptedExecutor::failing_at(2));

    let run = harness.runner().run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(harness.executor.calls_for(2).len(), 3);
    assert!(harness.executor.calls_for(3).is_empty());
    assert_eq!(harness.reviewer.count_for(2), 0);
    assert_eq!(harness.synthesizer.call_count(), 0);

    // Step 1 stays recorded, nothing for step 2
    assert_eq!(run.scratchpad.records().len(), 1);
    assert!(run.scratchpad.record_for_ordinal(2).is_none());

    let errors = run
        .log
        .iter()
        .filter(|e| e.level == LogLevel::Error && e.message.starts_with("Execution failed"))
        .count();
    assert_eq!(errors, 3);
    assert!(messages(&run).contains(&"Step 2 failed after 2 retries.".to_string()));

    let retry = &harness.executor.calls_for(2)[1];
    assert!(retry.retry_reasoning.contains("model unavailable"));
    assert!(retry.retry_reasoning.ends_with("You must fix this."));

    match run.outcome {
        Some(RunOutcome::Failed { error }) => {
            assert!(error.starts_with("Step 2 failed after 3 attempts"));
        }
        other => panic!("expected a failed outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_every_time() {
    let harness = Harness::new(text_steps(2))
        .with_reviewer(ScriptedReviewer::rejecting(1, usize::MAX, "Wrong topic"));

    let run = harness.runner().run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(harness.executor.calls_for(1).len(), 3);
    assert_eq!(harness.reviewer.count_for(1), 3);
    assert!(harness.executor.calls_for(2).is_empty());
    // The final rejection ends the step instead of asking for a revision
    assert_eq!(warnings_starting_with(&run, "Step needs revision"), 2);
    assert!(run.error().unwrap().contains("Wrong topic"));
}

#[tokio::test]
async fn test_max_retries_is_configurable() {
    let harness = Harness::new(text_steps(1)).with_executor(ScriptedExecutor::failing_at(1));
    let runner = orchestrator::PlanRunner::new(
        harness.services(),
        orchestrator::RunnerConfig::default()
            .with_plan_approval(false)
            .with_max_retries(0),
    );

    let run = runner.run(Goal::new("Write a report")).await;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(harness.executor.calls_for(1).len(), 1);
    assert_eq!(warnings_starting_with(&run, "Retrying step"), 0);
}
