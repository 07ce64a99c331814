//! Configuration loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up by [`AgentFileConfig::load`]
pub const CONFIG_FILE_NAME: &str = ".agentflow.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/agentflow/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let global_path = dirs::config_dir()?.join("agentflow").join(filename);
    global_path.exists().then_some(global_path)
}

// ============================================================================
// File Configuration (.agentflow.toml)
// ============================================================================

/// Top-level configuration (from .agentflow.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentFileConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSectionConfig,
    #[serde(default)]
    pub github: GitHubSectionConfig,
    #[serde(default)]
    pub history: HistorySectionConfig,
    /// Per-role overrides
    #[serde(default)]
    pub roles: Vec<RoleOverride>,
}

/// LLM configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

/// Orchestration loop settings
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSectionConfig {
    /// Retries after the first attempt of a reviewed step
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause for plan approval before executing
    #[serde(default = "default_true")]
    pub require_plan_approval: bool,
    /// Deadline for a single collaborator call; unset means wait indefinitely
    #[serde(default)]
    pub collaborator_timeout_secs: Option<u64>,
    /// Where the CLI writes artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// GitHub REST source settings
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSectionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum paths per content fetch
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

/// Run history settings
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Database path (defaults to ~/.agentflow/history.db)
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Override for one agent role
#[derive(Debug, Clone, Deserialize)]
pub struct RoleOverride {
    /// Role name as written in plans (e.g. "Code Generator")
    pub role: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub guidance: Option<String>,
}

// Default value functions
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen3:14b".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_user_agent() -> String {
    format!("agentflow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_files() -> usize {
    5
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_model(),
        }
    }
}

impl Default for OrchestratorSectionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            require_plan_approval: default_true(),
            collaborator_timeout_secs: None,
            output_dir: default_output_dir(),
        }
    }
}

impl Default for GitHubSectionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            branch: default_branch(),
            user_agent: default_user_agent(),
            max_files: default_max_files(),
        }
    }
}

impl Default for HistorySectionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            db_path: None,
        }
    }
}

impl AgentFileConfig {
    /// Load config from .agentflow.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .agentflow.toml
    /// 2. Check ~/.config/agentflow/.agentflow.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default model (for use elsewhere)
    pub fn default_model() -> String {
        default_model()
    }

    /// Get the default Ollama URL (for use elsewhere)
    pub fn default_ollama_url() -> String {
        default_ollama_url()
    }
}
