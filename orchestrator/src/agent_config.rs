//! Role profiles and registry
//!
//! Each agent role carries the guidance text the step executor embeds in its
//! prompt and an optional model override.

use agent::config::RoleOverride;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::plan::AgentRole;
use crate::prompts;

/// Configuration for one agent role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleProfile {
    pub role: AgentRole,

    /// Display name for prompts and logs
    pub display_name: String,

    /// Instruction framing for the executor prompt
    pub guidance: String,

    /// Model for this role (None = the default model)
    #[serde(default)]
    pub model: Option<String>,
}

impl RoleProfile {
    pub fn new(role: AgentRole, guidance: impl Into<String>) -> Self {
        Self {
            role,
            display_name: role.display_name().to_string(),
            guidance: guidance.into(),
            model: None,
        }
    }

    /// Set the model override
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

/// Registry of role profiles
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    profiles: HashMap<AgentRole, RoleProfile>,
}

impl RoleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Create a registry with guidance for every role
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(RoleProfile::new(
            AgentRole::WebResearcher,
            prompts::WEB_RESEARCHER_GUIDANCE,
        ));
        registry.register(RoleProfile::new(
            AgentRole::DataAnalyst,
            prompts::DATA_ANALYST_GUIDANCE,
        ));
        registry.register(RoleProfile::new(
            AgentRole::ReportWriter,
            prompts::REPORT_WRITER_GUIDANCE,
        ));
        registry.register(RoleProfile::new(
            AgentRole::CodeGenerator,
            prompts::CODE_GENERATOR_GUIDANCE,
        ));
        registry.register(RoleProfile::new(
            AgentRole::GitHubToolUser,
            prompts::GITHUB_TOOL_USER_GUIDANCE,
        ));

        // Coordination roles rarely execute steps; give them the generic framing
        for role in AgentRole::ALL {
            if !registry.contains(role) {
                registry.register(RoleProfile::new(role, prompts::DEFAULT_GUIDANCE));
            }
        }

        registry
    }

    /// Register or replace a profile
    pub fn register(&mut self, profile: RoleProfile) {
        self.profiles.insert(profile.role, profile);
    }

    pub fn get(&self, role: AgentRole) -> Option<&RoleProfile> {
        self.profiles.get(&role)
    }

    pub fn contains(&self, role: AgentRole) -> bool {
        self.profiles.contains_key(&role)
    }

    /// Guidance for a role, falling back to the generic text
    pub fn guidance(&self, role: AgentRole) -> &str {
        self.get(role)
            .map(|p| p.guidance.as_str())
            .unwrap_or(prompts::DEFAULT_GUIDANCE)
    }

    /// Model override for a role, if any
    pub fn model_for(&self, role: AgentRole) -> Option<&str> {
        self.get(role).and_then(|p| p.model.as_deref())
    }

    /// Distinct model overrides across all roles
    pub fn override_models(&self) -> BTreeSet<String> {
        self.profiles
            .values()
            .filter_map(|p| p.model.clone())
            .collect()
    }

    /// Iterate over all profiles
    pub fn iter(&self) -> impl Iterator<Item = &RoleProfile> {
        self.profiles.values()
    }

    /// Apply `[[roles]]` entries from the config file.
    ///
    /// Unknown role names are skipped with a warning.
    pub fn apply_overrides(&mut self, overrides: &[RoleOverride]) {
        for entry in overrides {
            let Some(role) = AgentRole::from_name(&entry.role) else {
                tracing::warn!(role = %entry.role, "Ignoring override for unknown role");
                continue;
            };

            let profile = self
                .profiles
                .entry(role)
                .or_insert_with(|| RoleProfile::new(role, prompts::DEFAULT_GUIDANCE));
            if let Some(model) = &entry.model {
                profile.model = Some(model.clone());
            }
            if let Some(guidance) = &entry.guidance {
                profile.guidance = guidance.clone();
            }
        }
    }
}
