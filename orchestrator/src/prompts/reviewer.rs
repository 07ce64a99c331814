//! Reviewer prompt

pub const REVIEWER_PROMPT: &str = r#"You are a strict reviewer. Decide whether the output below fully completes its step.

## Step
{ordinal}. {task} (Agent: {role})

## Output
{output}

## Context
{scratchpad}

Answer APPROVE only if the output is complete and correct for the task. Otherwise answer REVISE and say briefly what must change.

Respond with JSON only, matching this schema:
{schema}
"#;
