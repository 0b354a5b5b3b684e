//! CLI module for VBG
//!
//! Provides the command surface:
//! - task modes: question analysis, `--refactor`, `--recommend`, `--ui-ux`,
//!   `--plan`, `--new`
//! - session control: `--continue`, `--session`, `--new-session`, `--sessions`
//! - `--usage`: agent availability and session statistics
//! - `--init`: write a starter `vbg.toml`

use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use uuid::Uuid;
use vbg_core::{SessionChoice, TaskMode};

pub mod init;
pub mod sessions;
pub mod task;
pub mod usage;

/// VBG: run AI coding agents side by side and cross-check their answers
#[derive(Parser, Debug)]
#[command(name = "vbg")]
#[command(about = "Runs AI coding agents side by side and cross-checks their answers")]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .args(["refactor", "recommend", "ui_ux", "plan", "new_project"])
        .multiple(false)
))]
#[command(group(
    ArgGroup::new("session_choice")
        .args(["continue_session", "session", "new_session"])
        .multiple(false)
))]
pub struct Cli {
    /// Question to analyze, or focus notes for the selected mode
    #[arg(value_name = "QUESTION")]
    pub question: Vec<String>,

    /// Suggest performance refactorings
    #[arg(short = 'r', long)]
    pub refactor: bool,

    /// Recommend architecture, feature and tooling improvements
    #[arg(long)]
    pub recommend: bool,

    /// Review UI/UX (React and Next.js projects)
    #[arg(short = 'u', long = "ui-ux")]
    pub ui_ux: bool,

    /// Write an implementation plan for TASK
    #[arg(short = 'p', long, value_name = "TASK")]
    pub plan: Option<Option<String>>,

    /// Design a new project from IDEA
    #[arg(short = 'n', long = "new", value_name = "IDEA")]
    pub new_project: Option<Option<String>>,

    /// Project name for --new
    #[arg(long, requires = "new_project")]
    pub name: Option<String>,

    /// Continue the current session (default)
    #[arg(short = 'c', long = "continue")]
    pub continue_session: bool,

    /// Continue a specific session
    #[arg(long, value_name = "ID")]
    pub session: Option<Uuid>,

    /// Start a new session
    #[arg(long)]
    pub new_session: bool,

    /// List active sessions
    #[arg(long)]
    pub sessions: bool,

    /// Run the auditor after the primary, reviewing its output
    #[arg(long)]
    pub sequential: bool,

    /// Show agent availability and session statistics
    #[arg(long)]
    pub usage: bool,

    /// Write a starter vbg.toml in the project directory
    #[arg(long)]
    pub init: bool,

    /// Only print the report
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// Task selected by the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSelection {
    /// Mode
    pub mode: TaskMode,
    /// Task text; `None` when it still has to be asked for
    pub text: Option<String>,
}

impl Cli {
    /// Project root
    pub fn root(&self) -> anyhow::Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Positional words joined into one string
    fn question_text(&self) -> Option<String> {
        let text = self.question.join(" ");
        (!text.trim().is_empty()).then_some(text)
    }

    /// Mode and text requested, `None` when no task was given
    pub fn task(&self) -> Option<TaskSelection> {
        let question = self.question_text();
        let with_text = |mode: TaskMode, explicit: &Option<String>| TaskSelection {
            mode,
            text: explicit
                .clone()
                .filter(|t| !t.trim().is_empty())
                .or_else(|| question.clone()),
        };

        if self.refactor {
            Some(with_text(TaskMode::Refactor, &None))
        } else if self.recommend {
            Some(with_text(TaskMode::Recommend, &None))
        } else if self.ui_ux {
            Some(with_text(TaskMode::UiReview, &None))
        } else if let Some(plan) = &self.plan {
            Some(with_text(TaskMode::Plan, plan))
        } else if let Some(idea) = &self.new_project {
            Some(with_text(TaskMode::NewProject, idea))
        } else {
            question.clone().map(|q| TaskSelection {
                mode: TaskMode::Analyze,
                text: Some(q),
            })
        }
    }

    /// Session selection from the flags
    pub fn session_choice(&self) -> SessionChoice {
        match (self.session, self.new_session) {
            (Some(id), _) => SessionChoice::Id(id),
            (None, true) => SessionChoice::New,
            (None, false) => SessionChoice::Current,
        }
    }
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let root = cli.root()?;

    if cli.init {
        return init::run(&root);
    }
    if cli.usage {
        return usage::run(&root).await;
    }
    if cli.sessions {
        return sessions::run(&root);
    }

    match cli.task() {
        Some(selection) => task::run(&cli, &root, selection).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
