//! Clap derive structures for the `docsync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// docsync -- client-side mirror of a hierarchical document store
#[derive(Debug, Parser)]
#[command(
    name = "docsync",
    version,
    about = "Mirror and edit a hierarchical document store from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "DOCSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Identity profile to use
    #[arg(long, short = 'p', env = "DOCSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit compact JSON instead of pretty JSON
    #[arg(long, global = true)]
    pub compact: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect and edit configuration
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Sign in against the profile's identity endpoint
    Login,

    /// Sign out and tear the local mirror down
    Logout,

    /// Build a small document graph in memory and show what the engine did
    Demo(DemoArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with secrets masked
    Show,

    /// Print the config file location
    Path,

    /// List profile names
    Profiles,

    /// Store a profile password in the system keyring (read from stdin)
    SetPassword,
}

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Children to create under the parent
    #[arg(long, default_value_t = 2)]
    pub children: usize,

    /// Leave the graph in place instead of cascade-deleting it
    #[arg(long)]
    pub keep: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
