//! Scratchpad: the shared, append-only context of a run
//!
//! Records are kept as typed structures. The text form handed to models is
//! rendered from them with delimiters that ordinary output will not contain,
//! and [`parse_last_record`] can recover the newest record from that text.

use serde::Serialize;

use crate::error::OrchestratorError;
use crate::plan::AgentRole;
use crate::services::{FileContent, TreeEntry};

const RECORD_OPEN: &str = "<<<<AGENTFLOW:STEP-RECORD ";
const RECORD_CLOSE: &str = "<<<<AGENTFLOW:END-STEP-RECORD ";
const MARKER_END: &str = ">>>>";

/// Text written when a single file could not be fetched
pub const FILE_FETCH_FAILED: &str = "Error: Could not fetch content for this file.";

/// Output of one approved step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepOutput {
    Text(String),
    RepoTree(Vec<TreeEntry>),
    FileSelection(Vec<String>),
    FileContents(Vec<FileContent>),
}

impl StepOutput {
    /// Text form embedded in the scratchpad
    pub fn render(&self) -> String {
        match self {
            StepOutput::Text(text) => text.clone(),
            StepOutput::RepoTree(entries) => pretty_json(&serde_json::json!({
                "message": format!(
                    "File tree fetched successfully. Total files: {}.",
                    entries.len()
                ),
                "tree": entries,
            })),
            StepOutput::FileSelection(files) => pretty_json(&serde_json::json!({ "files": files })),
            StepOutput::FileContents(files) => {
                let blocks: Vec<String> = files
                    .iter()
                    .map(|f| format!("--- FILE: {} ---\n{}", f.path, f.content))
                    .collect();
                format!("Fetched file contents:\n{}", blocks.join("\n\n"))
            }
        }
    }
}

fn pretty_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// An approved step's entry in the scratchpad
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub ordinal: u32,
    pub role: AgentRole,
    pub output: StepOutput,
}

impl StepRecord {
    fn render(&self) -> String {
        format!(
            "\n{open}{n} | Agent: {role}{end}\n{output}\n{close}{n}{end}\n\n",
            open = RECORD_OPEN,
            close = RECORD_CLOSE,
            end = MARKER_END,
            n = self.ordinal,
            role = self.role,
            output = self.output.render(),
        )
    }
}

/// Append-only record list seeded with the goal context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scratchpad {
    initial_context: String,
    records: Vec<StepRecord>,
}

impl Scratchpad {
    pub fn new(initial_context: impl Into<String>) -> Self {
        Self {
            initial_context: initial_context.into(),
            records: Vec::new(),
        }
    }

    /// Append an approved step's output. Each ordinal may appear only once.
    pub fn append(
        &mut self,
        ordinal: u32,
        role: AgentRole,
        output: StepOutput,
    ) -> Result<&StepRecord, OrchestratorError> {
        if self.record_for_ordinal(ordinal).is_some() {
            return Err(OrchestratorError::DuplicateRecord(ordinal));
        }
        self.records.push(StepRecord {
            ordinal,
            role,
            output,
        });
        Ok(&self.records[self.records.len() - 1])
    }

    /// Most recently appended record
    pub fn last_record(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    pub fn record_for_ordinal(&self, ordinal: u32) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.ordinal == ordinal)
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn initial_context(&self) -> &str {
        &self.initial_context
    }

    /// Full text form passed to executors, reviewers and the synthesizer
    pub fn render(&self) -> String {
        let mut text = format!("INITIAL CONTEXT:\n{}\n\n", self.initial_context);
        for record in &self.records {
            text.push_str(&record.render());
        }
        text
    }
}

/// A record recovered from rendered scratchpad text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub ordinal: u32,
    pub role: String,
    pub output: String,
}

/// Recover the newest record from rendered scratchpad text.
///
/// Locates the last opening delimiter, so earlier records and output that
/// quotes record-like text do not confuse it.
pub fn parse_last_record(text: &str) -> Option<ParsedRecord> {
    let start = text.rfind(RECORD_OPEN)? + RECORD_OPEN.len();
    let header_len = text[start..].find(MARKER_END)?;
    let header = &text[start..start + header_len];

    let (ordinal, role) = header.split_once(" | Agent: ")?;
    let ordinal: u32 = ordinal.trim().parse().ok()?;

    let body_start = start + header_len + MARKER_END.len();
    let body = text[body_start..].strip_prefix('\n')?;
    let close = format!("{}{}{}", RECORD_CLOSE, ordinal, MARKER_END);
    let body_end = body.rfind(&close)?;
    let output = body[..body_end].strip_suffix('\n')?;

    Some(ParsedRecord {
        ordinal,
        role: role.to_string(),
        output: output.to_string(),
    })
}
