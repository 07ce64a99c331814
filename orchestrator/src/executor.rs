//! LLM-backed step executor

use agent::llm::Llm;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent_config::RoleRegistry;
use crate::plan::PlanStep;
use crate::prompts;
use crate::services::StepExecutor;

/// Executes generic steps with one prompt per attempt.
///
/// Roles with a model override in the registry use the matching client
/// registered through [`LlmStepExecutor::with_model_client`].
pub struct LlmStepExecutor {
    default_llm: Arc<dyn Llm>,
    model_clients: HashMap<String, Arc<dyn Llm>>,
    roles: RoleRegistry,
}

impl LlmStepExecutor {
    pub fn new(default_llm: Arc<dyn Llm>, roles: RoleRegistry) -> Self {
        Self {
            default_llm,
            model_clients: HashMap::new(),
            roles,
        }
    }

    /// Register the client used for roles overridden to `model`
    pub fn with_model_client(mut self, model: impl Into<String>, llm: Arc<dyn Llm>) -> Self {
        self.model_clients.insert(model.into(), llm);
        self
    }

    fn llm_for(&self, step: &PlanStep) -> &Arc<dyn Llm> {
        self.roles
            .model_for(step.role)
            .and_then(|model| self.model_clients.get(model))
            .unwrap_or(&self.default_llm)
    }

    /// Build the instruction for one attempt
    pub fn prompt(&self, step: &PlanStep, scratchpad: &str, retry_reasoning: &str) -> String {
        let role = step.role.to_string();
        let feedback = if retry_reasoning.trim().is_empty() {
            String::new()
        } else {
            prompts::render(
                prompts::REVISION_FEEDBACK,
                &[("reasoning", retry_reasoning)],
            )
        };

        prompts::render(
            prompts::EXECUTOR_PROMPT,
            &[
                ("role", role.as_str()),
                ("guidance", self.roles.guidance(step.role)),
                ("task", step.task.as_str()),
                ("scratchpad", scratchpad),
                ("feedback", feedback.as_str()),
            ],
        )
    }
}

#[async_trait]
impl StepExecutor for LlmStepExecutor {
    async fn execute_step(
        &self,
        step: &PlanStep,
        scratchpad: &str,
        retry_reasoning: &str,
    ) -> Result<String> {
        let llm = self.llm_for(step);
        tracing::debug!(step = step.ordinal, role = %step.role, model = llm.model(), "Executing step");
        llm.chat(&self.prompt(step, scratchpad, retry_reasoning)).await
    }
}
