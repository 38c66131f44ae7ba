//! Fitment CLI: the `fitment` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);
    let config = support::load_config_or_exit(&cli.config);

    match cli.command {
        Commands::Validate {
            catalog,
            selections,
            input,
            save,
            skip_providers,
            json,
        } => commands::validate::run(
            config,
            commands::validate::Args {
                catalog,
                selections,
                input,
                save,
                skip_providers,
                json,
            },
        ),

        Commands::Inspect { catalog, json } => commands::inspect::run(config, catalog, json),
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("fitment_catalog=debug,fitment_engine=debug,warn")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
