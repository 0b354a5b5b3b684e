//! Usage command: agent availability and session statistics

use crate::config::load_config;
use std::path::Path;
use vbg_core::{ProjectType, SessionRef, SessionStore};

pub async fn run(root: &Path) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let project_type = ProjectType::detect(root);

    println!("VBG usage\n");
    println!("Project:   {} ({})", root.display(), project_type.as_str());
    println!("Primary:   {}", config.roles.primary);
    println!("Auditor:   {}", config.auditor_id().unwrap_or("(disabled)"));
    println!("Execution: {}", config.execution.mode);
    println!();

    println!("Agents:");
    for (id, agent) in &config.agents {
        let status = if !agent.enabled {
            "disabled"
        } else if vbg_tools::is_available(&agent.command).await {
            "available"
        } else {
            "not found"
        };
        let model = agent.model.as_deref().unwrap_or("default model");
        println!("  {:<10} {:<12} {} ({})", id, status, agent.command, model);
    }
    println!();

    if !config.session.enabled {
        println!("Sessions:  disabled");
        return Ok(());
    }

    let store = SessionStore::from_config(&config.session, root);
    println!("Sessions:  {}", store.dir().display());
    match store.current_id()? {
        Some(_) => {
            let session = store.load(SessionRef::Current)?;
            let stats = session.stats();
            println!("Current:   {}", session.id());
            println!(
                "  entries {} / {} tokens (limit {} entries, {} tokens)",
                session.entries().len(),
                session.token_count(),
                store.limits().max_entries,
                store.limits().max_context_tokens
            );
            println!("  tasks {}", stats.tasks);
            for (agent, calls) in &stats.agent_calls {
                println!("  {agent}: {calls} calls");
            }
            println!("  ~{} prompt tokens sent", stats.estimated_tokens_sent);
            println!("  expires {}", session.expires_at().format("%Y-%m-%d %H:%M UTC"));
        }
        None => println!("Current:   none"),
    }
    Ok(())
}
