//! Task command: run one cross-checked task and print the report

use super::{Cli, TaskSelection};
use crate::config::load_config;
use inquire::Text;
use std::path::Path;
use tracing::{info, warn};
use vbg_core::{ExecutionMode, Orchestrator, TaskMode, TaskRequest};

pub async fn run(cli: &Cli, root: &Path, selection: TaskSelection) -> anyhow::Result<()> {
    let mut config = load_config(root)?;
    if cli.sequential {
        config.execution.mode = ExecutionMode::Sequential;
    }

    let text = match selection.text {
        Some(text) => text,
        None if selection.mode.requires_text() => ask_for_text(selection.mode)?,
        None => String::new(),
    };

    let mut request = TaskRequest::new(selection.mode, text).with_session(cli.session_choice());
    if let Some(name) = &cli.name {
        request = request.with_project_name(name.clone());
    }

    let orchestrator = Orchestrator::new(config, root)?;
    info!(
        mode = selection.mode.command(),
        project_type = orchestrator.project_type().as_str(),
        "Starting task"
    );

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping agents");
            cancel.cancel();
        }
    });

    let outcome = orchestrator.run(request).await?;

    println!("{}", outcome.report.render());
    if !cli.quiet {
        if let Some(path) = &outcome.report_path {
            eprintln!("Report saved to {}", path.display());
        }
        if let Some(path) = &outcome.plan_path {
            eprintln!("Plan written to {}", path.display());
        }
        if outcome.report.degraded {
            eprintln!("Warning: not every agent produced a usable answer");
        }
    }
    Ok(())
}

fn ask_for_text(mode: TaskMode) -> anyhow::Result<String> {
    let prompt = match mode {
        TaskMode::Plan => "What should be planned?",
        TaskMode::NewProject => "Describe the project idea:",
        _ => "What is your question?",
    };
    let text = Text::new(prompt).prompt()?;
    Ok(text)
}
