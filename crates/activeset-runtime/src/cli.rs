//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "activeset",
    about = "Publish every currently active entity into a group"
)]
pub struct Cli {
    /// Settings file (TOML, one [jobs.<name>] table per job)
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "ACTIVESET_CONFIG",
        default_value = "activeset.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every configured job until interrupted
    Run(RunOpts),
    /// Run one aggregation pass per job and print the memberships (JSON)
    Once(OnceOpts),
    /// Validate the settings file and print each job's effective config
    Check,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// States file: JSON array of {"entity_id", "state", "attributes"} objects
    #[arg(long)]
    pub states: PathBuf,

    /// Output file receiving group memberships (JSON object keyed by group)
    #[arg(long)]
    pub output: PathBuf,

    /// Only run the named job
    #[arg(long)]
    pub job: Option<String>,
}

#[derive(clap::Args)]
pub struct OnceOpts {
    /// States file: JSON array of {"entity_id", "state", "attributes"} objects
    #[arg(long)]
    pub states: PathBuf,

    /// Only run the named job
    #[arg(long)]
    pub job: Option<String>,
}
