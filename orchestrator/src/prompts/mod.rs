//! Prompt templates for the LLM-backed collaborators
//!
//! Templates use `{name}` placeholders filled by [`render`].

mod executor;
mod planner;
mod reviewer;
mod roles;
mod synthesizer;

pub use executor::{EXECUTOR_PROMPT, REVISION_FEEDBACK};
pub use planner::PLANNER_PROMPT;
pub use reviewer::REVIEWER_PROMPT;
pub use roles::{
    CODE_GENERATOR_GUIDANCE, DATA_ANALYST_GUIDANCE, DEFAULT_GUIDANCE, GITHUB_TOOL_USER_GUIDANCE,
    REPORT_WRITER_GUIDANCE, WEB_RESEARCHER_GUIDANCE,
};
pub use synthesizer::SYNTHESIZER_PROMPT;

/// Fill `{name}` placeholders in a single pass.
///
/// Substituted values are never scanned again, so a scratchpad that happens
/// to contain `{task}` is left as written. Unknown placeholders stay verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });

        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
