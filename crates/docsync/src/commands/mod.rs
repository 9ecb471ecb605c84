//! Command handlers, one module per top-level subcommand.

pub mod auth;
pub mod config_cmd;
pub mod demo;

use std::path::PathBuf;

use docsync_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// The config file in effect: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(docsync_config::config_path)
}

pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(docsync_config::load_config_from(&config_file(global))?)
}

pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Config(args) => config_cmd::handle(&args, config, global),
        Command::Login => auth::login(config, global).await,
        Command::Logout => auth::logout(config, global).await,
        Command::Demo(args) => demo::handle(&args, config, global).await,
        Command::Completions(_) => Ok(()),
    }
}
