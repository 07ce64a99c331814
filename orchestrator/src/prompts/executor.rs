//! Step executor prompt

pub const EXECUTOR_PROMPT: &str = r#"You are the {role}, a specialist agent. {guidance}

## Task
{task}

## Work so far
{scratchpad}
{feedback}
Deliver the complete work product for this task. No summaries of what you would do and no placeholders.
"#;

/// Appended when a previous attempt was rejected or failed
pub const REVISION_FEEDBACK: &str = r#"
## Reviewer feedback
Your previous answer to this task was not accepted:
{reasoning}

Correct these problems. Do not repeat the previous answer.
"#;
