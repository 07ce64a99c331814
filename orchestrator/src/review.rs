//! Reviewer gate
//!
//! Generic step output goes to a reviewer collaborator. The gate's own job is
//! strict decision parsing and logging; judging quality is the reviewer's.

use agent::llm::{parse_json, Llm};
use anyhow::{Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::events::RunLog;
use crate::plan::{AgentRole, PlanStep};
use crate::prompts;
use crate::services::{with_deadline, Reviewer};

/// Verdict as returned by a reviewer collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewVerdict {
    /// "APPROVE" or "REVISE"
    pub decision: String,
    /// Short justification, fed back to the executor on REVISE
    #[serde(default)]
    pub reasoning: String,
}

impl ReviewVerdict {
    pub fn approve(reasoning: impl Into<String>) -> Self {
        Self {
            decision: "APPROVE".to_string(),
            reasoning: reasoning.into(),
        }
    }

    pub fn revise(reasoning: impl Into<String>) -> Self {
        Self {
            decision: "REVISE".to_string(),
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Approve,
    Revise,
}

impl ReviewDecision {
    /// Only a case-insensitive `APPROVE` approves
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("APPROVE") {
            ReviewDecision::Approve
        } else {
            ReviewDecision::Revise
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewDecision::Approve => write!(f, "APPROVE"),
            ReviewDecision::Revise => write!(f, "REVISE"),
        }
    }
}

/// Parsed outcome of one review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewResult {
    pub decision: ReviewDecision,
    pub reasoning: String,
}

impl From<ReviewVerdict> for ReviewResult {
    fn from(verdict: ReviewVerdict) -> Self {
        Self {
            decision: ReviewDecision::parse(&verdict.decision),
            reasoning: verdict.reasoning,
        }
    }
}

/// Submits generic step output for review and logs the decision
pub struct ReviewerGate {
    reviewer: Arc<dyn Reviewer>,
    deadline: Option<Duration>,
}

impl ReviewerGate {
    pub fn new(reviewer: Arc<dyn Reviewer>, deadline: Option<Duration>) -> Self {
        Self { reviewer, deadline }
    }

    pub async fn review(
        &self,
        step: &PlanStep,
        output: &str,
        scratchpad: &str,
        log: &mut RunLog,
    ) -> Result<ReviewResult> {
        let verdict = with_deadline(
            self.deadline,
            "review",
            self.reviewer.review_step(step, output, scratchpad),
        )
        .await?;

        let result = ReviewResult::from(verdict);
        log.info(
            AgentRole::Reviewer,
            format!("Decision: {}. Reasoning: {}", result.decision, result.reasoning),
        );
        Ok(result)
    }
}

// ============================================================================
// LLM Reviewer
// ============================================================================

/// Reviewer backed by a language model
pub struct LlmReviewer {
    llm: Arc<dyn Llm>,
}

impl LlmReviewer {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    fn prompt(step: &PlanStep, output: &str, scratchpad: &str) -> Result<String> {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(ReviewVerdict))
            .context("serialize review schema")?;
        let ordinal = step.ordinal.to_string();
        let role = step.role.to_string();

        Ok(prompts::render(
            prompts::REVIEWER_PROMPT,
            &[
                ("ordinal", ordinal.as_str()),
                ("task", step.task.as_str()),
                ("role", role.as_str()),
                ("output", output),
                ("scratchpad", scratchpad),
                ("schema", schema.as_str()),
            ],
        ))
    }
}

#[async_trait]
impl Reviewer for LlmReviewer {
    async fn review_step(
        &self,
        step: &PlanStep,
        output: &str,
        scratchpad: &str,
    ) -> Result<ReviewVerdict> {
        let prompt = Self::prompt(step, output, scratchpad)?;
        let reply = self.llm.chat(&prompt).await?;
        // An unparseable verdict is an execution error, not a silent approval
        parse_json(&reply).context("reviewer reply was not a valid verdict")
    }
}
