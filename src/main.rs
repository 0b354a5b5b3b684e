//! VBG - AI cross-check automation
//!
//! CLI entry point: runs external coding agents on the current project and
//! cross-checks their answers.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    let default_filter = if cli.quiet {
        "vbg=warn,vbg_core=warn,vbg_tools=warn"
    } else {
        "vbg=info,vbg_core=info,vbg_tools=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli::run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<vbg_core::Error>() {
            Some(core) => {
                eprintln!("{}", vbg_core::format_error_for_cli(core));
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}
