//! Sessions command: list active sessions for the project

use crate::config::load_config;
use std::path::Path;
use vbg_core::SessionStore;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let config = load_config(root)?;
    if !config.session.enabled {
        println!("Sessions are disabled (session.enabled = false)");
        return Ok(());
    }

    let store = SessionStore::from_config(&config.session, root);
    let sessions = store.list()?;
    if sessions.is_empty() {
        println!("No active sessions in {}", store.dir().display());
        return Ok(());
    }

    let current = store.current_id()?;
    println!("{:<2} {:<36}  {:<16}  {:<16}  ENTRIES", "", "ID", "CREATED", "LAST USED");
    for summary in sessions {
        let marker = if Some(summary.id) == current { "*" } else { "" };
        println!(
            "{:<2} {:<36}  {:<16}  {:<16}  {}",
            marker,
            summary.id,
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.last_used_at.format("%Y-%m-%d %H:%M"),
            summary.entry_count
        );
    }
    Ok(())
}
