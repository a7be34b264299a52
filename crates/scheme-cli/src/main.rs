//! Scheme CLI - Command-line interface for scheme extraction.

use clap::Parser;
use scheme_cli::commands;
use scheme_cli::{Cli, Command, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> scheme_cli::Result<()> {
    let formatter = Formatter::new(cli.format.into(), !cli.no_color);

    match cli.command {
        Command::Extract(args) => commands::execute_extract(args, &formatter).await,
        Command::Rules(args) => commands::execute_rules(args, &formatter).await,
        Command::ShowConfig(args) => commands::execute_show_config(args).await,
    }
}
