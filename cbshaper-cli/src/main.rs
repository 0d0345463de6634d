//! Cbshaper CLI - Command-line interface
//!
//! Thin wrapper over cbshaper-core and cbshaper-sim: derivation,
//! optimization, simulation and validation of CBS configurations.
//! Exit codes: 0 success, 1 validation or infeasibility error,
//! 2 malformed input.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "cbshaper")]
#[command(about = "Credit-Based Shaper parameter derivation and simulation")]
struct Cli {
    #[command(flatten)]
    link: commands::LinkArgs,

    #[command(subcommand)]
    command: commands::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    std::process::exit(commands::handle_command(&cli.link, cli.command));
}
