mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docsync_config::{Config, LogSettings};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging settings come from the config file, so load it first. A
    // broken file still gets reported, just with default logging.
    let config = commands::load_config(&cli.global);
    let log = config
        .as_ref()
        .map(|c| c.log.clone())
        .unwrap_or_default();
    init_tracing(cli.global.verbose, &log);

    if let Err(err) = run(cli, config).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Filter directive for a `-v` count, with `baseline` used when none is given.
fn filter_directive(verbosity: u8, baseline: &str) -> &str {
    match verbosity {
        0 => baseline,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_tracing(verbosity: u8, log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity, &log.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, config: Result<Config, CliError>) -> Result<(), CliError> {
    match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "docsync", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let config = config?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &config, &cli.global).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::filter_directive;

    #[test]
    fn verbosity_overrides_configured_level() {
        assert_eq!(filter_directive(0, "warn"), "warn");
        assert_eq!(filter_directive(0, "docsync_core=debug"), "docsync_core=debug");
        assert_eq!(filter_directive(1, "warn"), "info");
        assert_eq!(filter_directive(2, "warn"), "debug");
        assert_eq!(filter_directive(7, "warn"), "trace");
    }
}
