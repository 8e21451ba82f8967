//! DOSA CLI - security bot and network tools for DOSA devices.
//!
//! `dosa secbot` runs the long-lived security bot; the remaining subcommands
//! are one-shot tools for poking at the network.

mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;

use cli::{Cli, Commands};
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let name = cli.name.as_deref();

    match cli.command {
        Commands::Secbot(args) => {
            commands::run_secbot(args, name, cli.config.as_deref()).await
        }
        Commands::Monitor(args) => {
            commands::run_monitor(args, name, cli.json).await
        }
        Commands::Ping(args) => {
            commands::run_ping(args, name, cli.json).await
        }
        Commands::Play(args) => {
            commands::run_play(args, name, cli.json).await
        }
        Commands::Trigger(args) => {
            commands::run_trigger(args, name, cli.json).await
        }
        Commands::Ota(args) => {
            commands::run_ota(args, name, cli.json).await
        }
        Commands::Flush(args) => {
            commands::run_flush(args, name, cli.json).await
        }
    }
}
