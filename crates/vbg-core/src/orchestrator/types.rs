//! Orchestrator types
//!
//! Contains the task-level type definitions:
//! - `TaskMode` and `TaskRequest` for input
//! - `TaskState` and `TaskProgress` for the per-task state machine
//! - `TaskOutcome` for the result handed back to the caller

use crate::config::SelectionCaps;
use crate::report::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Kind of work requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// Answer a question about the project
    Analyze,
    /// Suggest refactorings
    Refactor,
    /// Recommend improvements
    Recommend,
    /// Review UI/UX of a React or Next.js project
    UiReview,
    /// Write an implementation plan
    Plan,
    /// Design a new project from an idea
    NewProject,
}

impl TaskMode {
    /// Command name stored with context entries and used in report names
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Refactor => "refactor",
            Self::Recommend => "recommend",
            Self::UiReview => "ui-ux",
            Self::Plan => "plan",
            Self::NewProject => "new",
        }
    }

    /// Human readable title
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Analyze => "Analysis",
            Self::Refactor => "Refactoring",
            Self::Recommend => "Recommendations",
            Self::UiReview => "UI/UX Review",
            Self::Plan => "Implementation Plan",
            Self::NewProject => "New Project",
        }
    }

    /// Whether the task text must be non-empty
    #[must_use]
    pub fn requires_text(&self) -> bool {
        matches!(self, Self::Analyze | Self::Plan | Self::NewProject)
    }

    /// Selection cap for this mode
    #[must_use]
    pub fn file_cap(&self, caps: &SelectionCaps) -> usize {
        match self {
            Self::Analyze => caps.analysis,
            Self::Refactor => caps.refactor,
            Self::Recommend => caps.recommend,
            Self::UiReview => caps.ui,
            Self::Plan => caps.plan,
            Self::NewProject => caps.new_project,
        }
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Session to run the task in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionChoice {
    /// Resume the current session, creating one if needed
    #[default]
    Current,
    /// Start a new session
    New,
    /// Resume a specific session
    Id(Uuid),
}

/// One task submitted to the orchestrator
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Kind of work
    pub mode: TaskMode,
    /// Question, task or idea; may be empty for refactor, recommend and UI review
    pub text: String,
    /// Project name for new-project mode
    pub project_name: Option<String>,
    /// Session selection
    pub session: SessionChoice,
}

impl TaskRequest {
    /// Create a request in the current session
    #[must_use]
    pub fn new(mode: TaskMode, text: impl Into<String>) -> Self {
        Self {
            mode,
            text: text.into(),
            project_name: None,
            session: SessionChoice::Current,
        }
    }

    /// Set the project name
    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Set the session selection
    #[must_use]
    pub fn with_session(mut self, session: SessionChoice) -> Self {
        self.session = session;
        self
    }
}

/// Per-task state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Nothing done yet
    Idle,
    /// Session loaded or created
    SessionResolved,
    /// Prompt file set chosen
    FilesSelected,
    /// Agents running
    Invoking,
    /// At least one agent did not succeed
    Degraded,
    /// Building the report
    Merging,
    /// Session written
    Persisted,
    /// Finished
    Done,
}

impl TaskState {
    /// Whether `next` may follow `self`
    #[must_use]
    pub fn can_advance_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Idle, SessionResolved)
                | (SessionResolved, FilesSelected)
                | (FilesSelected, Invoking)
                | (Invoking, Degraded)
                | (Invoking, Merging)
                | (Degraded, Merging)
                | (Merging, Persisted)
                | (Persisted, Done)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::SessionResolved => "SessionResolved",
            Self::FilesSelected => "FilesSelected",
            Self::Invoking => "Invoking",
            Self::Degraded => "Degraded",
            Self::Merging => "Merging",
            Self::Persisted => "Persisted",
            Self::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Recorded transitions of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress {
    task_id: Uuid,
    states: Vec<TaskState>,
}

impl TaskProgress {
    /// Start in `Idle`
    #[must_use]
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            states: vec![TaskState::Idle],
        }
    }

    /// Current state
    #[must_use]
    pub fn current(&self) -> TaskState {
        self.states.last().copied().unwrap_or(TaskState::Idle)
    }

    /// Move to `next`
    pub fn advance(&mut self, next: TaskState) {
        debug_assert!(
            self.current().can_advance_to(next),
            "illegal transition {} -> {}",
            self.current(),
            next
        );
        debug!(task_id = %self.task_id, from = %self.current(), to = %next, "Task state");
        self.states.push(next);
    }

    /// Transitions so far
    #[must_use]
    pub fn states(&self) -> &[TaskState] {
        &self.states
    }
}

/// Result of a completed task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Merged report
    pub report: Report,
    /// Where the report was written, if saving is enabled
    pub report_path: Option<PathBuf>,
    /// Where the plan was written (plan mode)
    pub plan_path: Option<PathBuf>,
}
