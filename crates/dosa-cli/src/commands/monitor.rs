//! Passive network monitor.

use std::io::{self, Write};

use chrono::Local;
use colored::*;
use dosa_core::dedup::{DeduplicationLog, Delivery};
use dosa_core::protocol::{MessageCode, Packet, TriggerDetail};
use dosa_core::transport::PacketTransport;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use super::{open_transport, TOOLS_NAME};
use crate::cli::MonitorArgs;
use crate::error::CliError;

/// Side length of the IR sensor grid.
const GRID_SIZE: usize = 8;

/// One printed packet.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonitorEntry {
    pub time: String,
    pub id: u16,
    pub origin: String,
    pub name: String,
    pub code: String,
    pub retry: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<Vec<String>>,
}

/// Run the monitor command
pub async fn run_monitor(args: MonitorArgs, name: Option<&str>, json: bool) -> Result<(), CliError> {
    let origin_pattern = match args.origin.as_deref() {
        Some(glob) => Some(glob_to_regex(glob)?),
        None => None,
    };

    let transport = open_transport(name, TOOLS_NAME).await?;
    let mut history = DeduplicationLog::new();

    if !json {
        println!("Monitoring DOSA network traffic");
        println!("Press Ctrl+C to stop.\n");
    }

    loop {
        let packet = tokio::select! {
            received = transport.receive(None) => received?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        let Some(packet) = packet else {
            continue;
        };

        let retry = history.classify(packet.origin(), packet.message_id()) == Delivery::Retry;

        if let Some(ref pattern) = origin_pattern {
            if !pattern.is_match(packet.origin_name()) {
                continue;
            }
        }

        let Some(mut entry) = describe(&packet, retry, &args) else {
            continue;
        };

        if args.ack && packet.code() == MessageCode::Trigger && !retry {
            match transport.send_ack(packet.message_id(), packet.origin()).await {
                Ok(()) => entry.detail.push_str(" (replied)"),
                Err(e) => warn!(error = %e, "Failed to ack trigger"),
            }
        }

        if json {
            println!("{}", serde_json::to_string(&entry).unwrap_or_default());
        } else {
            print_colored_entry(&entry);
        }

        io::stdout().flush().ok();
    }
}

/// Turn an origin name glob (`*`, `?`) into an anchored regex.
pub fn glob_to_regex(glob: &str) -> Result<Regex, CliError> {
    let pattern = regex::escape(glob).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{}$", pattern))
        .map_err(|e| CliError::InvalidArgument(format!("Invalid origin filter '{}': {}", glob, e)))
}

/// Build the printable entry for a packet, or `None` if it is filtered out.
pub fn describe(packet: &Packet, retry: bool, args: &MonitorArgs) -> Option<MonitorEntry> {
    let code = packet.code();

    if args.ignore_retries && retry {
        return None;
    }
    if args.ignore_pings && code == MessageCode::Ping {
        return None;
    }
    if code == MessageCode::Ack {
        return None;
    }

    let mut map = None;
    let detail = match code {
        MessageCode::Trigger if args.map && !retry => match packet.trigger() {
            Ok(TriggerDetail::Ranging { previous, current }) => {
                format!(" // distance: {} -> {}", previous, current)
            }
            Ok(TriggerDetail::IrGrid(cells)) => {
                map = Some(render_ir_grid(&cells));
                String::new()
            }
            _ => String::new(),
        },
        MessageCode::Log => match packet.log_entry() {
            Ok(entry) => format!(" // [{}] {}", entry.level.as_str(), entry.message),
            Err(_) => String::new(),
        },
        MessageCode::Security => match packet.security_level() {
            Ok(level) => format!(" // SECURITY ALERT: {}", level.as_str()),
            Err(_) => String::new(),
        },
        MessageCode::Play => format!(" // RUN PLAY: {}", packet.play_name()),
        MessageCode::Online => " // ONLINE".to_string(),
        MessageCode::Begin => " // BEGIN SEQUENCE".to_string(),
        MessageCode::End => " // COMPLETE".to_string(),
        MessageCode::Ping => " // PING".to_string(),
        MessageCode::Pong => " // PONG".to_string(),
        MessageCode::Flush => " // FLUSH".to_string(),
        _ => String::new(),
    };

    let origin = packet.origin();
    Some(MonitorEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        id: packet.message_id(),
        origin: format!("{}:{}", origin.ip(), origin.port()),
        name: packet.origin_name().to_string(),
        code: code.to_string(),
        retry,
        detail,
        map,
    })
}

/// Character for one IR cell reading.
pub fn pixel(value: u8) -> char {
    if value == 0 {
        return ' ';
    }

    let scaled = f32::from(value) / 10.0;
    if scaled > 3.0 {
        '#'
    } else if scaled > 1.5 {
        '+'
    } else {
        '.'
    }
}

/// Framed 8x8 rendering of an IR grid, one string per line.
pub fn render_ir_grid(cells: &[u8]) -> Vec<String> {
    let border = format!("+{}+", "-".repeat(GRID_SIZE));

    let mut lines = vec![border.clone()];
    for row in cells.chunks(GRID_SIZE).take(GRID_SIZE) {
        let mut line: String = row.iter().map(|&v| pixel(v)).collect();
        while line.chars().count() < GRID_SIZE {
            line.push(' ');
        }
        lines.push(format!("|{}|", line));
    }
    lines.push(border);
    lines
}

fn print_colored_entry(entry: &MonitorEntry) {
    let code = match entry.code.as_str() {
        "sec" => entry.code.red().bold(),
        "log" => entry.code.yellow(),
        "trg" | "pla" => entry.code.magenta(),
        "pin" | "pon" => entry.code.dimmed(),
        _ => entry.code.normal(),
    };

    let id = format!("[{:>5}]", entry.id);
    let id = if entry.retry { id.dimmed() } else { id.normal() };

    println!(
        "{} {} {} ({}): {}{}",
        entry.time,
        id,
        entry.origin.dimmed(),
        entry.name.cyan(),
        code,
        entry.detail
    );

    if let Some(ref map) = entry.map {
        for line in map {
            println!("{}", line);
        }
    }
}
