//! Agent execution strategies
//!
//! Contains the two ways roles are run:
//! - Parallel: primary and auditor receive the same prompt concurrently
//! - Sequential: the auditor reviews the primary's output, and is skipped
//!   when the primary did not succeed

use crate::config::ExecutionMode;
use crate::report::{AgentRole, RoleReport};
use futures::future::join_all;
use tracing::{info, warn};
use vbg_tools::{AgentResult, AgentSpec};

use super::core::Orchestrator;
use super::prompts::build_review_prompt;

/// Prompt actually sent to each invoked role
#[derive(Debug, Clone)]
pub(crate) struct SentPrompt {
    pub agent_id: String,
    pub prompt: String,
}

impl Orchestrator {
    /// Run the configured roles. The result holds one entry per configured
    /// role, primary first.
    pub(crate) async fn execute_roles(
        &self,
        primary: &AgentSpec,
        auditor: Option<&AgentSpec>,
        prompt: &str,
    ) -> (Vec<RoleReport>, Vec<SentPrompt>) {
        match (self.config.execution.mode, auditor) {
            (ExecutionMode::Parallel, _) | (ExecutionMode::Sequential, None) => {
                self.execute_parallel(primary, auditor, prompt).await
            }
            (ExecutionMode::Sequential, Some(auditor)) => {
                self.execute_sequential(primary, auditor, prompt).await
            }
        }
    }

    async fn execute_parallel(
        &self,
        primary: &AgentSpec,
        auditor: Option<&AgentSpec>,
        prompt: &str,
    ) -> (Vec<RoleReport>, Vec<SentPrompt>) {
        let roles: Vec<(AgentRole, &AgentSpec)> = std::iter::once((AgentRole::Primary, primary))
            .chain(auditor.map(|a| (AgentRole::Auditor, a)))
            .collect();

        info!(
            agents = ?roles.iter().map(|(_, a)| a.id.as_str()).collect::<Vec<_>>(),
            "Starting parallel execution"
        );

        // join_all keeps input order, so primary stays first whatever finishes first
        let results = join_all(roles.iter().map(|(_, agent)| self.invoke(agent, prompt))).await;

        let sent = roles
            .iter()
            .map(|(_, agent)| SentPrompt {
                agent_id: agent.id.clone(),
                prompt: prompt.to_string(),
            })
            .collect();
        let reports = roles
            .iter()
            .zip(results)
            .map(|((role, _), result)| RoleReport::completed(*role, result))
            .collect();
        (reports, sent)
    }

    async fn execute_sequential(
        &self,
        primary: &AgentSpec,
        auditor: &AgentSpec,
        prompt: &str,
    ) -> (Vec<RoleReport>, Vec<SentPrompt>) {
        info!(primary = %primary.id, auditor = %auditor.id, "Starting sequential cross-check");

        let primary_result = self.invoke(primary, prompt).await;
        let mut sent = vec![SentPrompt {
            agent_id: primary.id.clone(),
            prompt: prompt.to_string(),
        }];

        let auditor_report = if primary_result.is_success() {
            let review = build_review_prompt(prompt, &primary.id, &primary_result.output);
            let result = self.invoke(auditor, &review).await;
            sent.push(SentPrompt {
                agent_id: auditor.id.clone(),
                prompt: review,
            });
            RoleReport::completed(AgentRole::Auditor, result)
        } else {
            warn!(
                primary = %primary.id,
                kind = %primary_result.kind,
                "Primary did not succeed, skipping cross-check"
            );
            RoleReport::skipped(
                AgentRole::Auditor,
                auditor.id.clone(),
                format!(
                    "primary agent '{}' did not succeed ({})",
                    primary.id, primary_result.kind
                ),
            )
        };

        (
            vec![
                RoleReport::completed(AgentRole::Primary, primary_result),
                auditor_report,
            ],
            sent,
        )
    }

    async fn invoke(&self, agent: &AgentSpec, prompt: &str) -> AgentResult {
        let timeout = self.config.agent_timeout(&agent.id);
        let cancel = self.cancel.child_token();
        let result = self.runner.invoke(agent, prompt, timeout, &cancel).await;

        if result.is_success() {
            info!(
                agent = %agent.id,
                elapsed_ms = result.usage.elapsed_ms,
                output_bytes = result.output.len(),
                "Agent succeeded"
            );
        } else {
            warn!(
                agent = %agent.id,
                kind = %result.kind,
                reason = result.reason.as_deref().unwrap_or(""),
                "Agent did not succeed"
            );
        }
        result
    }
}
