//! Init command: write a starter vbg.toml

use crate::config::save_config;
use inquire::Confirm;
use std::path::Path;
use vbg_core::VbgConfig;

/// File written by `vbg --init`
pub const CONFIG_FILE: &str = "vbg.toml";

pub fn run(root: &Path) -> anyhow::Result<()> {
    let path = root.join(CONFIG_FILE);

    if path.exists() {
        let overwrite = Confirm::new(&format!("{} already exists. Overwrite?", path.display()))
            .with_default(false)
            .prompt()?;
        if !overwrite {
            println!("Init cancelled.");
            return Ok(());
        }
    }

    save_config(&VbgConfig::default(), &path)?;
    println!("Wrote {}", path.display());
    println!("Edit [agents] and [roles] to choose which CLIs cross-check each other.");
    Ok(())
}
