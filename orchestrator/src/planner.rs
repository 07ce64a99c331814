//! LLM-backed planner

use agent::llm::{parse_json, Llm};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::agent_config::RoleRegistry;
use crate::plan::{AgentRole, RawPlanStep};
use crate::prompts;
use crate::services::Planner;

/// Accepts a bare array or an object wrapping it
#[derive(Deserialize)]
#[serde(untagged)]
enum PlannerReply {
    Steps(Vec<RawPlanStep>),
    Wrapped {
        #[serde(alias = "plan")]
        steps: Vec<RawPlanStep>,
    },
}

/// Asks a model to decompose the goal into steps
pub struct LlmPlanner {
    llm: Arc<dyn Llm>,
    roles: RoleRegistry,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn Llm>, roles: RoleRegistry) -> Self {
        Self { llm, roles }
    }

    fn prompt(&self, context: &str) -> String {
        let roles: Vec<String> = AgentRole::WORKERS
            .iter()
            .map(|role| {
                let name = self
                    .roles
                    .get(*role)
                    .map(|p| p.display_name.as_str())
                    .unwrap_or(role.display_name());
                format!("- {}: {}", name, self.roles.guidance(*role))
            })
            .collect();

        prompts::render(
            prompts::PLANNER_PROMPT,
            &[("roles", roles.join("\n").as_str()), ("context", context)],
        )
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn create_plan(&self, context: &str) -> Result<Vec<RawPlanStep>> {
        let reply = self.llm.chat(&self.prompt(context)).await?;
        let steps = match parse_json(&reply).context("planner reply was not a JSON plan")? {
            PlannerReply::Steps(steps) | PlannerReply::Wrapped { steps } => steps,
        };
        tracing::debug!(steps = steps.len(), "Planner returned steps");
        Ok(steps)
    }
}
