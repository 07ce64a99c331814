//! Plan approval checkpoint
//!
//! When approval is required the runner pauses after planning and asks a
//! [`PlanApprovalHandler`] whether to commit to execution.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};

use crate::plan::Plan;

/// Result of a plan approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanApproval {
    Approved,
    /// Stop the run; carries the reason shown in the log
    Rejected(String),
}

/// Strategy for approving plans
#[async_trait]
pub trait PlanApprovalHandler: Send + Sync {
    async fn review_plan(&self, plan: &Plan) -> PlanApproval;
}

/// Asks on stdin (default for the CLI)
pub struct InteractiveApprovalHandler;

impl InteractiveApprovalHandler {
    fn prompt(summary: &str) -> io::Result<PlanApproval> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        println!("\n{}", "═".repeat(60));
        println!("  PLAN APPROVAL");
        println!("{}\n", "═".repeat(60));
        println!("{}", summary);
        println!("{}", "─".repeat(60));
        println!("  [y/yes] - Execute this plan");
        println!("  [n/no]  - Reject and stop");
        println!();

        print!("Your choice: ");
        stdout.flush()?;

        let mut input = String::new();
        stdin.lock().read_line(&mut input)?;

        Ok(match input.trim().to_lowercase().as_str() {
            "y" | "yes" | "" => PlanApproval::Approved,
            "n" | "no" => PlanApproval::Rejected("Plan rejected by user".to_string()),
            other => PlanApproval::Rejected(format!("Unrecognized answer '{}'", other)),
        })
    }
}

#[async_trait]
impl PlanApprovalHandler for InteractiveApprovalHandler {
    async fn review_plan(&self, plan: &Plan) -> PlanApproval {
        let summary = plan.summary();
        let answer = tokio::task::spawn_blocking(move || Self::prompt(&summary)).await;
        match answer {
            Ok(Ok(approval)) => approval,
            Ok(Err(e)) => PlanApproval::Rejected(format!("Could not read approval: {}", e)),
            Err(e) => PlanApproval::Rejected(format!("Approval prompt failed: {}", e)),
        }
    }
}

/// Approves every plan (`--yes`, tests, self-test)
pub struct AutoApproveHandler;

#[async_trait]
impl PlanApprovalHandler for AutoApproveHandler {
    async fn review_plan(&self, plan: &Plan) -> PlanApproval {
        tracing::debug!(steps = plan.len(), "Plan auto-approved");
        PlanApproval::Approved
    }
}

/// Rejects every plan (for testing)
pub struct RejectHandler;

#[async_trait]
impl PlanApprovalHandler for RejectHandler {
    async fn review_plan(&self, _plan: &Plan) -> PlanApproval {
        PlanApproval::Rejected("Plan auto-rejected".to_string())
    }
}
