//! Cross-check report
//!
//! A report holds one entry per configured role, primary first, each either
//! the agent's result or an explicit skip marker. Rendering produces the
//! Markdown document written by [`ReportStore`] and printed by the CLI.

use crate::config::ExecutionMode;
use crate::error::Result;
use crate::orchestrator::{TaskMode, TaskState};
use crate::project::ProjectType;
use crate::utils::write_atomic;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;
use vbg_tools::{AgentResult, BuildMeasurement};

/// Role an agent plays in a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Produces the main answer
    Primary,
    /// Cross-checks the primary
    Auditor,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("Primary"),
            Self::Auditor => f.write_str("Auditor"),
        }
    }
}

/// What happened to a role
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleOutcome {
    /// The agent was invoked
    Completed(AgentResult),
    /// The agent was deliberately not invoked
    Skipped {
        /// Why the step was skipped
        reason: String,
    },
}

/// One role's entry in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleReport {
    /// Role
    pub role: AgentRole,
    /// Agent filling the role
    pub agent_id: String,
    /// Result or skip marker
    pub outcome: RoleOutcome,
}

impl RoleReport {
    /// Role whose agent ran
    #[must_use]
    pub fn completed(role: AgentRole, result: AgentResult) -> Self {
        Self {
            role,
            agent_id: result.agent_id.clone(),
            outcome: RoleOutcome::Completed(result),
        }
    }

    /// Role that was not run
    #[must_use]
    pub fn skipped(role: AgentRole, agent_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            role,
            agent_id: agent_id.into(),
            outcome: RoleOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    /// The agent result, if the agent ran
    #[must_use]
    pub fn result(&self) -> Option<&AgentResult> {
        match &self.outcome {
            RoleOutcome::Completed(result) => Some(result),
            RoleOutcome::Skipped { .. } => None,
        }
    }

    /// Whether the role produced a usable output
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.result().is_some_and(AgentResult::is_success)
    }

    /// Outcome label: the completion kind, or `Skipped`
    #[must_use]
    pub fn label(&self) -> &'static str {
        match &self.outcome {
            RoleOutcome::Completed(result) => result.kind.label(),
            RoleOutcome::Skipped { .. } => "Skipped",
        }
    }
}

/// Merged outcome of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Task id
    pub task_id: Uuid,
    /// Session the task ran in
    pub session_id: Uuid,
    /// Mode
    pub mode: TaskMode,
    /// Parallel or sequential
    pub execution_mode: ExecutionMode,
    /// Detected project type
    pub project_type: ProjectType,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Task text as given
    pub task: String,
    /// Files listed in the prompt
    pub selected_files: Vec<PathBuf>,
    /// One entry per role, primary first
    pub roles: Vec<RoleReport>,
    /// Fewer usable results than configured roles
    pub degraded: bool,
    /// Build baseline (refactor mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BuildMeasurement>,
    /// Why the baseline could not be measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_error: Option<String>,
    /// State transitions of the task
    pub transitions: Vec<TaskState>,
}

impl Report {
    /// Final state of the task
    #[must_use]
    pub fn final_state(&self) -> TaskState {
        self.transitions.last().copied().unwrap_or(TaskState::Idle)
    }

    /// Role entries whose agent succeeded
    pub fn usable(&self) -> impl Iterator<Item = &RoleReport> {
        self.roles.iter().filter(|r| r.is_usable())
    }

    /// Role entries whose agent ran and did not succeed
    pub fn failures(&self) -> impl Iterator<Item = &RoleReport> {
        self.roles
            .iter()
            .filter(|r| r.result().is_some_and(|res| !res.is_success()))
    }

    /// Role entry for `role`
    #[must_use]
    pub fn role(&self, role: AgentRole) -> Option<&RoleReport> {
        self.roles.iter().find(|r| r.role == role)
    }

    /// File name `<timestamp>-<mode>-<id8>.md`
    #[must_use]
    pub fn file_name(&self) -> String {
        let id = self.task_id.simple().to_string();
        format!(
            "{}-{}-{}.md",
            self.created_at.format("%Y%m%d-%H%M%S"),
            self.mode.command(),
            &id[..8]
        )
    }

    /// Render as Markdown
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let usable = self.usable().count();

        let _ = writeln!(out, "# VBG {} Report\n", self.mode.title());
        let _ = writeln!(out, "| Field | Value |");
        let _ = writeln!(out, "|---|---|");
        let _ = writeln!(out, "| Task | `{}` |", self.task_id);
        let _ = writeln!(out, "| Session | `{}` |", self.session_id);
        let _ = writeln!(out, "| Project type | {} |", self.project_type);
        let _ = writeln!(out, "| Execution | {} |", self.execution_mode);
        let _ = writeln!(out, "| State | {} |", self.final_state());
        let _ = writeln!(out, "| Created | {} |", self.created_at.to_rfc3339());
        out.push('\n');

        if self.degraded {
            let detail = match usable {
                0 => "no agent produced a usable result".to_string(),
                1 => "single-source result, not cross-checked".to_string(),
                n => format!("{} of {} roles usable", n, self.roles.len()),
            };
            let _ = writeln!(out, "> **Degraded**: {}.", detail);
            for failure in self.failures() {
                let _ = writeln!(
                    out,
                    "> - {} `{}`: {}",
                    failure.role,
                    failure.agent_id,
                    failure.label()
                );
            }
            out.push('\n');
        }

        if !self.task.trim().is_empty() {
            let _ = writeln!(out, "## Task\n\n{}\n", self.task.trim());
        }

        for role in &self.roles {
            let _ = writeln!(
                out,
                "## {}: {} ({})\n",
                role.role,
                role.agent_id,
                role.label()
            );
            match &role.outcome {
                RoleOutcome::Completed(result) if result.is_success() => {
                    let _ = writeln!(out, "{}\n", result.output.trim_end());
                }
                RoleOutcome::Completed(result) => {
                    let reason = result.reason.as_deref().unwrap_or("no reason recorded");
                    let _ = writeln!(out, "> {}\n", reason);
                }
                RoleOutcome::Skipped { reason } => {
                    let _ = writeln!(out, "> Skipped: {}\n", reason);
                }
            }
        }

        let _ = writeln!(out, "## Benchmarks\n");
        let _ = writeln!(
            out,
            "| Role | Agent | Outcome | Duration (ms) | Peak memory (MiB) |"
        );
        let _ = writeln!(out, "|---|---|---|---|---|");
        for role in &self.roles {
            let (elapsed, memory) = match role.result() {
                Some(result) => (
                    result.usage.elapsed_ms.to_string(),
                    result
                        .usage
                        .peak_memory_mib()
                        .map_or_else(|| "unknown".to_string(), |m| format!("{:.1}", m)),
                ),
                None => ("-".to_string(), "-".to_string()),
            };
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                role.role,
                role.agent_id,
                role.label(),
                elapsed,
                memory
            );
        }
        out.push('\n');

        if let Some(baseline) = &self.baseline {
            let _ = writeln!(out, "## Build Baseline\n");
            let _ = writeln!(out, "- Command: `{}`", baseline.command);
            let _ = writeln!(out, "- Runs: {}", baseline.runs);
            let _ = writeln!(
                out,
                "- Mean / min / max: {:.0} / {} / {} ms",
                baseline.mean_ms, baseline.min_ms, baseline.max_ms
            );
            if let Some(peak) = baseline.peak_memory_bytes {
                let _ = writeln!(
                    out,
                    "- Peak memory: {:.1} MiB",
                    peak as f64 / (1024.0 * 1024.0)
                );
            }
            out.push('\n');
        } else if let Some(error) = &self.baseline_error {
            let _ = writeln!(out, "## Build Baseline\n\n> Not measured: {}\n", error);
        }

        if !self.selected_files.is_empty() {
            let _ = writeln!(out, "## Files Considered\n");
            for path in &self.selected_files {
                let _ = writeln!(out, "- `{}`", path.display());
            }
            out.push('\n');
        }

        out
    }
}

/// Writes one Markdown file per report
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Store writing into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Report directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `report`, returning its path
    pub fn write(&self, report: &Report) -> Result<PathBuf> {
        let path = self.dir.join(report.file_name());
        write_atomic(&path, &report.render())?;
        info!(path = %path.display(), task_id = %report.task_id, "Report saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbg_tools::{CompletionKind, ResourceUsage};

    fn usage(ms: u64, peak: Option<u64>) -> ResourceUsage {
        ResourceUsage {
            elapsed_ms: ms,
            peak_memory_bytes: peak,
            samples: 1,
        }
    }

    fn report(roles: Vec<RoleReport>, degraded: bool) -> Report {
        Report {
            task_id: Uuid::parse_str("0123abcd-0000-4000-8000-000000000000").unwrap(),
            session_id: Uuid::nil(),
            mode: TaskMode::Refactor,
            execution_mode: ExecutionMode::Parallel,
            project_type: ProjectType::Rust,
            created_at: DateTime::parse_from_rfc3339("2026-03-01T09:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            task: "tidy the parser".to_string(),
            selected_files: vec![PathBuf::from("src/parser.rs")],
            roles,
            degraded,
            baseline: None,
            baseline_error: None,
            transitions: vec![TaskState::Idle, TaskState::Done],
        }
    }

    #[test]
    fn test_file_name() {
        let r = report(Vec::new(), false);
        assert_eq!(r.file_name(), "20260301-093000-refactor-0123abcd.md");
    }

    #[test]
    fn test_render_both_roles() {
        let r = report(
            vec![
                RoleReport::completed(
                    AgentRole::Primary,
                    AgentResult::success("claude", "OK-A".to_string(), usage(1200, Some(64 * 1024 * 1024))),
                ),
                RoleReport::completed(
                    AgentRole::Auditor,
                    AgentResult::success("gemini", "OK-B".to_string(), usage(900, None)),
                ),
            ],
            false,
        );
        let text = r.render();

        let a = text.find("OK-A").unwrap();
        let b = text.find("OK-B").unwrap();
        assert!(a < b);
        assert!(text.contains("## Primary: claude (Success)"));
        assert!(text.contains("| Primary | claude | Success | 1200 | 64.0 |"));
        assert!(text.contains("| Auditor | gemini | Success | 900 | unknown |"));
        assert!(!text.contains("Degraded"));
        assert!(text.contains("`src/parser.rs`"));
    }

    #[test]
    fn test_render_degraded_names_failure() {
        let r = report(
            vec![
                RoleReport::completed(
                    AgentRole::Primary,
                    AgentResult::success("claude", "OK-A".to_string(), usage(10, None)),
                ),
                RoleReport::completed(
                    AgentRole::Auditor,
                    AgentResult::failure(
                        "gemini",
                        CompletionKind::NotFound,
                        "binary 'gemini' not found",
                        None,
                        usage(1, None),
                    ),
                ),
            ],
            true,
        );
        let text = r.render();

        assert!(text.contains("**Degraded**: single-source result"));
        assert!(text.contains("Auditor `gemini`: AgentNotFound"));
        assert!(text.contains("> binary 'gemini' not found"));
        assert_eq!(r.usable().count(), 1);
        assert_eq!(r.failures().count(), 1);
    }

    #[test]
    fn test_render_skipped_and_baseline_error() {
        let mut r = report(
            vec![
                RoleReport::completed(
                    AgentRole::Primary,
                    AgentResult::failure(
                        "claude",
                        CompletionKind::TimedOut,
                        "timed out after 1s",
                        None,
                        usage(1000, None),
                    ),
                ),
                RoleReport::skipped(AgentRole::Auditor, "gemini", "primary did not succeed"),
            ],
            true,
        );
        r.baseline_error = Some("'cargo' not found".to_string());
        let text = r.render();

        assert!(text.contains("no agent produced a usable result"));
        assert!(text.contains("## Auditor: gemini (Skipped)"));
        assert!(text.contains("| Auditor | gemini | Skipped | - | - |"));
        assert!(text.contains("Not measured: 'cargo' not found"));
    }

    #[test]
    fn test_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("reports"));
        let r = report(Vec::new(), false);

        let path = store.write(&r).unwrap();
        assert_eq!(path.file_name().unwrap(), "20260301-093000-refactor-0123abcd.md");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("# VBG Refactoring Report"));
    }
}
