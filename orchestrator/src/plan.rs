//! Plan model: goals, agent roles, tool calls and validated plan steps
//!
//! Planners (LLM or TOML file) produce loosely-typed [`RawPlanStep`]s.
//! [`Plan::from_raw`] turns them into [`PlanStep`]s with a closed
//! [`ToolCall`] enum, so a tool step that lacks its parameters is rejected
//! before anything runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

use crate::error::PlanError;

// ============================================================================
// Goal
// ============================================================================

/// A file attached to the goal, already reduced to text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub content: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The user's request for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub text: String,
    #[serde(default)]
    pub file: Option<UploadedFile>,
}

impl Goal {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file: None,
        }
    }

    /// Attach a file to the goal
    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    /// Initial context handed to the planner and seeded into the scratchpad
    pub fn context(&self) -> String {
        let mut context = format!("User Goal: {}", self.text);
        if let Some(file) = &self.file {
            context.push_str(&format!(
                "\n\n--- FILE CONTENT ({}) ---\n{}",
                file.name, file.content
            ));
        }
        context
    }
}

// ============================================================================
// Agent Roles
// ============================================================================

/// Persona a step is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    Supervisor,
    #[serde(rename = "Web Researcher")]
    WebResearcher,
    #[serde(rename = "Data Analyst")]
    DataAnalyst,
    #[serde(rename = "Report Writer")]
    ReportWriter,
    #[serde(rename = "Code Generator")]
    CodeGenerator,
    #[serde(rename = "GitHub Tool User")]
    GitHubToolUser,
    Reviewer,
    Synthesizer,
    Orchestrator,
    User,
}

impl AgentRole {
    pub const ALL: [AgentRole; 10] = [
        AgentRole::Supervisor,
        AgentRole::WebResearcher,
        AgentRole::DataAnalyst,
        AgentRole::ReportWriter,
        AgentRole::CodeGenerator,
        AgentRole::GitHubToolUser,
        AgentRole::Reviewer,
        AgentRole::Synthesizer,
        AgentRole::Orchestrator,
        AgentRole::User,
    ];

    /// Roles a planner may assign to work steps
    pub const WORKERS: [AgentRole; 5] = [
        AgentRole::WebResearcher,
        AgentRole::DataAnalyst,
        AgentRole::ReportWriter,
        AgentRole::CodeGenerator,
        AgentRole::GitHubToolUser,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Supervisor => "Supervisor",
            AgentRole::WebResearcher => "Web Researcher",
            AgentRole::DataAnalyst => "Data Analyst",
            AgentRole::ReportWriter => "Report Writer",
            AgentRole::CodeGenerator => "Code Generator",
            AgentRole::GitHubToolUser => "GitHub Tool User",
            AgentRole::Reviewer => "Reviewer",
            AgentRole::Synthesizer => "Synthesizer",
            AgentRole::Orchestrator => "Orchestrator",
            AgentRole::User => "User",
        }
    }

    /// Match a role name ignoring case, spaces, dashes and underscores
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|role| normalize(role.display_name()) == wanted)
    }

    /// Like [`AgentRole::from_name`], but unknown names become `Supervisor`
    pub fn parse_lenient(name: &str) -> Self {
        Self::from_name(name).unwrap_or(AgentRole::Supervisor)
    }

    /// Guess the worker role from the wording of a task
    pub fn infer_from_task(task: &str) -> Self {
        let task = task.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| task.contains(w));

        if mentions(&["code", "script", "program"]) {
            AgentRole::CodeGenerator
        } else if mentions(&["research", "search", "web"]) {
            AgentRole::WebResearcher
        } else if mentions(&["analyze", "analyse", "data", "statistics"]) {
            AgentRole::DataAnalyst
        } else if mentions(&["write", "report", "document"]) {
            AgentRole::ReportWriter
        } else if mentions(&["github", "repository", "repo"]) {
            AgentRole::GitHubToolUser
        } else {
            AgentRole::ReportWriter
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Tool Calls
// ============================================================================

pub const REPO_TREE_FETCH: &str = "repo-tree-fetch";
pub const FILE_SELECTION: &str = "file-selection";
pub const FILE_CONTENT_FETCH: &str = "file-content-fetch";

const REPO_URL: &str = "repoUrl";

/// External capability a step invokes instead of a generic model call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ToolCall {
    #[default]
    None,
    RepoTreeFetch {
        repo_url: String,
    },
    FileSelection,
    FileContentFetch {
        repo_url: String,
    },
}

impl ToolCall {
    /// Build a tool call from a planner's tool id and input payload
    pub fn from_descriptor(
        ordinal: u32,
        tool: Option<&str>,
        input: Option<&Map<String, Value>>,
    ) -> Result<Self, PlanError> {
        let id = match tool.map(str::trim) {
            None | Some("") => return Ok(ToolCall::None),
            Some(id) => id,
        };

        let repo_url = || -> Result<String, PlanError> {
            input
                .and_then(|map| map.get(REPO_URL).or_else(|| map.get("repo_url")))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PlanError::MissingParameter {
                    ordinal,
                    tool: id.to_string(),
                    parameter: REPO_URL.to_string(),
                })
        };

        match id {
            REPO_TREE_FETCH | "github:getRepoTree" => Ok(ToolCall::RepoTreeFetch {
                repo_url: repo_url()?,
            }),
            FILE_SELECTION | "gemini:selectFiles" => Ok(ToolCall::FileSelection),
            FILE_CONTENT_FETCH | "github:getFilesContent" => Ok(ToolCall::FileContentFetch {
                repo_url: repo_url()?,
            }),
            other => Err(PlanError::UnknownTool {
                ordinal,
                tool: other.to_string(),
            }),
        }
    }

    /// Canonical tool id, `None` for generic steps
    pub fn id(&self) -> Option<&'static str> {
        match self {
            ToolCall::None => None,
            ToolCall::RepoTreeFetch { .. } => Some(REPO_TREE_FETCH),
            ToolCall::FileSelection => Some(FILE_SELECTION),
            ToolCall::FileContentFetch { .. } => Some(FILE_CONTENT_FETCH),
        }
    }

    pub fn is_tool(&self) -> bool {
        !matches!(self, ToolCall::None)
    }
}

// ============================================================================
// Plan Steps
// ============================================================================

/// Step descriptor as emitted by a planner, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlanStep {
    #[serde(default)]
    pub step: Option<u32>,
    pub task: String,
    #[serde(default, alias = "agentRole", alias = "role")]
    pub agent: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default, rename = "toolInput", alias = "tool_input")]
    pub tool_input: Option<Map<String, Value>>,
    #[serde(default)]
    pub dependencies: Vec<u32>,
}

/// One validated unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub ordinal: u32,
    pub task: String,
    pub role: AgentRole,
    pub tool: ToolCall,
    /// Descriptive only; steps always run in ordinal order
    pub dependencies: Vec<u32>,
}

impl PlanStep {
    fn from_raw(position: u32, raw: RawPlanStep) -> Result<Self, PlanError> {
        let ordinal = raw.step.unwrap_or(position);
        if ordinal != position {
            return Err(PlanError::NonDenseOrdinals {
                expected: position,
                found: ordinal,
            });
        }

        let tool = ToolCall::from_descriptor(ordinal, raw.tool.as_deref(), raw.tool_input.as_ref())?;

        let mut role = AgentRole::parse_lenient(&raw.agent);
        if !tool.is_tool() && role == AgentRole::Supervisor {
            role = AgentRole::infer_from_task(&raw.task);
        }

        Ok(Self {
            ordinal,
            task: raw.task,
            role,
            tool,
            dependencies: raw.dependencies,
        })
    }
}

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    steps: Vec<RawPlanStep>,
}

/// Ordered, validated list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Validate planner output
    pub fn from_raw(raw: Vec<RawPlanStep>) -> Result<Self, PlanError> {
        if raw.is_empty() {
            return Err(PlanError::Empty);
        }

        let steps = raw
            .into_iter()
            .zip(1u32..)
            .map(|(step, position)| PlanStep::from_raw(position, step))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { steps })
    }

    /// Load a plan from TOML (`[[steps]]` tables)
    pub fn from_toml(toml_str: &str) -> Result<Self, PlanError> {
        let file: PlanFile = toml::from_str(toml_str).map_err(|e| PlanError::Parse(e.to_string()))?;
        Self::from_raw(file.steps)
    }

    /// Load a plan from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlanError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Human-readable listing used at the approval checkpoint
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&format!("{}. [{}] {}\n", step.ordinal, step.role, step.task));
            match &step.tool {
                ToolCall::None => {}
                ToolCall::RepoTreeFetch { repo_url } | ToolCall::FileContentFetch { repo_url } => {
                    out.push_str(&format!(
                        "   tool: {} ({})\n",
                        step.tool.id().unwrap_or_default(),
                        repo_url
                    ));
                }
                ToolCall::FileSelection => {
                    out.push_str(&format!("   tool: {}\n", FILE_SELECTION));
                }
            }
            if !step.dependencies.is_empty() {
                let deps: Vec<String> = step.dependencies.iter().map(u32::to_string).collect();
                out.push_str(&format!("   depends on: {}\n", deps.join(", ")));
            }
        }
        out
    }
}
