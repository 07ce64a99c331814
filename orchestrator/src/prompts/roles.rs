//! Per-role guidance for the step executor

pub const WEB_RESEARCHER_GUIDANCE: &str =
    "Report detailed findings with their sources and cite them. Keep the structure easy to scan.";

pub const DATA_ANALYST_GUIDANCE: &str =
    "Analyze the material thoroughly. Summarize the data you used and state each insight it supports.";

pub const REPORT_WRITER_GUIDANCE: &str =
    "Write complete, well-structured documents. Deliver the full text, not an outline.";

pub const CODE_GENERATOR_GUIDANCE: &str =
    "Write complete, working code with correct syntax, including every import and function it needs.";

pub const GITHUB_TOOL_USER_GUIDANCE: &str =
    "Work with the repository data in the scratchpad and return structured, specific output.";

pub const DEFAULT_GUIDANCE: &str = "Complete the task thoroughly and give detailed output.";
