//! Security bot command.

use std::path::Path;
use std::time::Duration;

use dosa_core::alert::{AlertDispatcher, AlertRoutes, LogAlertSink};
use dosa_core::config::{BotConfig, ConfigStore, Settings};
use dosa_core::monitor::MonitorLoop;
use dosa_core::playbook::{PlaybookEngine, PlaybookLibrary};
use dosa_core::voice::LogVoice;
use tracing::{error, info};

use super::{open_transport, SECBOT_NAME};
use crate::cli::SecbotArgs;
use crate::error::CliError;

/// Pause before restarting after a fault.
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Run the security bot until interrupted, restarting it on any fault.
pub async fn run_secbot(
    args: SecbotArgs,
    name: Option<&str>,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    let store = match config_path {
        Some(path) => ConfigStore::at(path),
        None => ConfigStore::standard(),
    };

    let mut announce = !args.quiet;

    loop {
        tokio::select! {
            result = run_once(&store, name, announce) => {
                if let Err(e) = result {
                    eprintln!("Fault: {}", e);
                    error!(error = %e, "Security bot fault, restarting");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
        }

        announce = false;
        tokio::time::sleep(RESTART_DELAY).await;
    }
}

/// Build a fresh bot from the current configuration and run it.
async fn run_once(store: &ConfigStore, name: Option<&str>, announce: bool) -> Result<(), CliError> {
    let settings = store.load_or_default().await;
    let (config, alerts, playbooks) = assemble(&settings);

    let transport = open_transport(name, SECBOT_NAME).await?;
    let mut bot = MonitorLoop::new(transport, config, alerts, playbooks, Box::new(LogVoice));

    bot.run(announce).await?;
    Ok(())
}

fn assemble(settings: &Settings) -> (BotConfig, AlertDispatcher, PlaybookEngine) {
    let config = BotConfig::from_settings(settings);

    let routes = AlertRoutes::from_settings(settings);
    if !routes.is_enabled() {
        info!("No alerts section configured, alerting disabled");
    }
    let alerts = AlertDispatcher::new(routes, Box::new(LogAlertSink));

    let library = PlaybookLibrary::from_settings(settings);
    info!(plays = ?library.names(), "Playbooks loaded");

    (config, alerts, PlaybookEngine::new(library))
}
