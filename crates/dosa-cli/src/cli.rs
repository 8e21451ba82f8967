//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// DOSA - security bot and network tools for DOSA devices
#[derive(Parser, Debug)]
#[command(name = "dosa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format (NDJSON for streaming commands)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: ~/.dosa/config, then /etc/dosa/config)
    #[arg(long, global = true, env = "DOSA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device name stamped on outgoing packets (max 20 bytes)
    #[arg(long, global = true)]
    pub name: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the security bot
    Secbot(SecbotArgs),

    /// Print every packet seen on the network
    Monitor(MonitorArgs),

    /// Ping a single device
    Ping(PingArgs),

    /// Ask the security bot to run a play
    Play(PlayArgs),

    /// Fire a trigger signal
    Trigger(TargetArgs),

    /// Request an OTA update
    Ota(TargetArgs),

    /// Send a network flush
    Flush(TargetArgs),
}

#[derive(Args, Debug)]
pub struct SecbotArgs {
    /// Skip the spoken startup announcement
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MonitorArgs {
    /// Hide retransmitted messages
    #[arg(short, long)]
    pub ignore_retries: bool,

    /// Acknowledge trigger messages
    #[arg(short, long)]
    pub ack: bool,

    /// Render trigger detail (ranging distances, IR grid maps)
    #[arg(short, long)]
    pub map: bool,

    /// Hide ping messages
    #[arg(short = 'p', long)]
    pub ignore_pings: bool,

    /// Only show packets whose origin name matches (supports * and ? wildcards)
    #[arg(long)]
    pub origin: Option<String>,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Device IP address
    pub ip: String,

    /// How long to wait for a pong, in milliseconds
    #[arg(long, default_value = "1500")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Play name as configured on the security bot
    #[arg(value_name = "NAME")]
    pub play: String,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Device IP address; the whole network when omitted
    pub ip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_monitor_flags() {
        let cli = Cli::parse_from(["dosa", "monitor", "-i", "-a", "-m", "-p", "--origin", "Door*"]);
        match cli.command {
            Commands::Monitor(args) => {
                assert!(args.ignore_retries && args.ack && args.map && args.ignore_pings);
                assert_eq!(args.origin.as_deref(), Some("Door*"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_globals_after_subcommand() {
        let cli = Cli::parse_from(["dosa", "play", "lockdown", "--name", "Panel", "--json"]);
        assert!(cli.json);
        assert_eq!(cli.name.as_deref(), Some("Panel"));
        assert!(matches!(cli.command, Commands::Play(ref a) if a.play == "lockdown"));
    }
}
