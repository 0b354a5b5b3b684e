//! Main task flow
//!
//! `Idle → SessionResolved → FilesSelected → Invoking → [Degraded] →
//! Merging → Persisted → Done`. Input validation happens before the first
//! transition, so a rejected task leaves nothing behind.

use crate::config::VbgConfig;
use crate::error::{Error, Result};
use crate::project::UI_EXTENSIONS;
use crate::report::{AgentRole, Report, RoleReport};
use crate::selector::{scan, FileCandidate, FileSelector};
use crate::session::{ContextEntry, Session, SessionRef};
use crate::token::TokenCounter;
use crate::utils::{clip_chars, write_atomic};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use vbg_tools::BuildMeasurement;

use super::core::Orchestrator;
use super::prompts::{build_task_prompt, PromptInput};
use super::types::{SessionChoice, TaskMode, TaskOutcome, TaskProgress, TaskRequest, TaskState};

impl Orchestrator {
    /// Run one task to completion.
    ///
    /// Agent failures never make this fail: they are recorded in the
    /// report, which is then flagged degraded. Errors are reserved for
    /// invalid input, unknown sessions and I/O failures.
    #[instrument(skip(self, request), fields(mode = %request.mode))]
    pub async fn run(&self, request: TaskRequest) -> Result<TaskOutcome> {
        self.validate_request(&request)?;

        let task_id = Uuid::new_v4();
        let mut progress = TaskProgress::new(task_id);
        let mode = request.mode;
        info!(task_id = %task_id, project_type = %self.project_type, "Task started");

        // Session
        let mut session = self.resolve_session(request.session)?;
        progress.advance(TaskState::SessionResolved);

        // Files
        let files = self.select_files(mode).await;
        progress.advance(TaskState::FilesSelected);

        let (baseline, baseline_error) = self.measure_baseline(mode).await;

        // Prompt
        let history = session.recent(self.config.session.history_in_prompt);
        let prompt = build_task_prompt(&PromptInput {
            mode,
            text: &request.text,
            project_name: request.project_name.as_deref(),
            project_type: self.project_type,
            files: &files,
            history,
        });

        // Agents
        let primary_spec = self.config.primary_agent()?.to_spec(&self.config.roles.primary);
        let auditor_spec = self.config.auditor_spec();
        progress.advance(TaskState::Invoking);
        let (roles, sent) = self
            .execute_roles(&primary_spec, auditor_spec.as_ref(), &prompt)
            .await;

        let usable = roles.iter().filter(|r| r.is_usable()).count();
        let degraded = usable < roles.len();
        if degraded {
            progress.advance(TaskState::Degraded);
        }

        // Merge
        progress.advance(TaskState::Merging);
        let counter = TokenCounter::new();
        for sent_prompt in &sent {
            session
                .stats_mut()
                .record_invocation(&sent_prompt.agent_id, counter.count_tokens(&sent_prompt.prompt));
        }
        self.append_context(&mut session, &request, &roles);

        // Persist
        if let Some(store) = &self.sessions {
            store.save(&mut session)?;
        }
        progress.advance(TaskState::Persisted);

        let plan_path = match mode {
            TaskMode::Plan => self.write_plan(&roles)?,
            _ => None,
        };

        progress.advance(TaskState::Done);
        let report = Report {
            task_id,
            session_id: session.id(),
            mode,
            execution_mode: self.config.execution.mode,
            project_type: self.project_type,
            created_at: Utc::now(),
            task: request.text.clone(),
            selected_files: files.into_iter().map(|f| f.path).collect(),
            roles,
            degraded,
            baseline,
            baseline_error,
            transitions: progress.states().to_vec(),
        };

        let report_path = match &self.reports {
            Some(store) => Some(store.write(&report)?),
            None => None,
        };

        info!(
            task_id = %task_id,
            session_id = %report.session_id,
            usable,
            degraded,
            "Task completed"
        );

        Ok(TaskOutcome {
            report,
            report_path,
            plan_path,
        })
    }

    fn validate_request(&self, request: &TaskRequest) -> Result<()> {
        validate_request(&self.config, request)?;
        if request.mode == TaskMode::UiReview && !self.project_type.is_ui() {
            return Err(Error::UnsupportedMode {
                mode: request.mode.command().to_string(),
                project_type: self.project_type.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_session(&self, choice: SessionChoice) -> Result<Session> {
        let expiry = self.config.session.expiry();
        let mut session = match &self.sessions {
            Some(store) => match choice {
                SessionChoice::Current => store.load(SessionRef::Current)?,
                SessionChoice::Id(id) => store.load(SessionRef::Id(id))?,
                SessionChoice::New => store.create()?,
            },
            None => match choice {
                SessionChoice::Id(id) => return Err(Error::SessionNotFound(id)),
                _ => Session::new(self.root.clone(), expiry),
            },
        };
        session.touch(expiry);
        info!(
            session_id = %session.id(),
            entries = session.entries().len(),
            persisted = self.sessions.is_some(),
            "Session resolved"
        );
        Ok(session)
    }

    async fn select_files(&self, mode: TaskMode) -> Vec<FileCandidate> {
        let cap = mode.file_cap(&self.config.selection.caps);
        if cap == 0 {
            return Vec::new();
        }

        let root = self.root.clone();
        let rules = self.ignore_rules();
        let scan_rules = rules.clone();
        let candidates = match tokio::task::spawn_blocking(move || scan(&root, &scan_rules)).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!(error = %e, "Project scan failed, continuing without files");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Project scan task failed, continuing without files");
                Vec::new()
            }
        };

        let mut selector = FileSelector::new(
            self.config.selection.weights,
            rules,
            self.project_type.source_extensions().iter().copied(),
        );
        if mode == TaskMode::UiReview {
            selector = selector.with_only_extensions(UI_EXTENSIONS.iter().copied());
        }
        selector.select(&candidates, cap, Utc::now())
    }

    async fn measure_baseline(&self, mode: TaskMode) -> (Option<BuildMeasurement>, Option<String>) {
        let Some(benchmark) = self.benchmark.as_ref().filter(|_| mode == TaskMode::Refactor) else {
            return (None, None);
        };
        let Some((program, args)) = self.project_type.build_command() else {
            return (
                None,
                Some(format!("no build command for {} projects", self.project_type)),
            );
        };

        match benchmark.run(program, &args, &self.root).await {
            Ok(measurement) => (Some(measurement), None),
            Err(e) => {
                warn!(error = %e, "Build baseline failed");
                (None, Some(e.to_string()))
            }
        }
    }

    fn append_context(&self, session: &mut Session, request: &TaskRequest, roles: &[RoleReport]) {
        let command = request.mode.command();
        let max_chars = self.config.session.max_entry_chars;

        let task_text = match request.project_name.as_deref() {
            Some(name) if !name.trim().is_empty() => {
                format!("[{}] {}", name.trim(), request.text.trim())
            }
            _ => request.text.trim().to_string(),
        };
        session.push(ContextEntry::task(clip_chars(&task_text, max_chars), command));

        for role in roles {
            let Some(result) = role.result() else {
                continue;
            };
            let content = if result.is_success() {
                clip_chars(result.output.trim(), max_chars)
            } else {
                format!(
                    "[{}] {}",
                    result.kind,
                    result.reason.as_deref().unwrap_or("no output")
                )
            };
            session.push(ContextEntry::agent(role.agent_id.clone(), content, command));
        }
        session.stats_mut().tasks += 1;
    }

    fn write_plan(&self, roles: &[RoleReport]) -> Result<Option<PathBuf>> {
        let primary = roles
            .iter()
            .find(|r| r.role == AgentRole::Primary)
            .and_then(|r| r.result())
            .filter(|r| r.is_success());
        let Some(result) = primary else {
            warn!("Primary produced no plan, plan file not written");
            return Ok(None);
        };

        let path = self.root.join(&self.config.output.plan_file);
        write_atomic(&path, &result.output)?;
        info!(path = %path.display(), "Plan written");
        Ok(Some(path))
    }
}

/// Input checks that need only the configuration
pub fn validate_request(config: &VbgConfig, request: &TaskRequest) -> Result<()> {
    let len = request.text.chars().count();
    if len > config.limits.max_input_chars {
        return Err(Error::InputTooLong {
            len,
            max: config.limits.max_input_chars,
        });
    }
    if let Some(name) = &request.project_name {
        let len = name.chars().count();
        if len > config.limits.max_project_name_chars {
            return Err(Error::ProjectNameTooLong {
                len,
                max: config.limits.max_project_name_chars,
            });
        }
    }
    if request.mode.requires_text() && request.text.trim().is_empty() {
        return Err(Error::InvalidInput(format!(
            "the {} mode needs a description",
            request.mode.command()
        )));
    }
    Ok(())
}
