//! activeset: keeps a group of currently active entities up to date.
//!
//! Each configured job periodically (and on restart or on demand) scans the
//! full state snapshot and republishes the active entity ids into its group.

use clap::Parser;

mod cli;
mod cmd_once;
mod host;
mod job;
mod publisher;
mod settings;
mod sources;
mod trigger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr; stdout carries command output.
    let filter = std::env::var("ACTIVESET_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        cli::Command::Run(opts) => {
            tracing::info!(config = %args.config.display(), "activeset starting");
            let settings = settings::load_settings(&args.config)?;
            host::run_host(opts, &settings).await?;
        }
        cli::Command::Once(opts) => {
            let settings = settings::load_settings(&args.config)?;
            cmd_once::cmd_once(opts, &settings).await?;
        }
        cli::Command::Check => settings::cmd_check(&args.config)?,
    }

    Ok(())
}
