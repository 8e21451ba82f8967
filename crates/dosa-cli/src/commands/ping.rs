//! Single-device ping.

use std::time::Duration;

use colored::*;
use dosa_core::protocol::{MessageCode, Packet};
use dosa_core::transport::PacketTransport;
use tokio::time::Instant;

use super::{open_transport, parse_target, TOOLS_NAME};
use crate::cli::PingArgs;
use crate::error::CliError;

/// Run the ping command
pub async fn run_ping(args: PingArgs, name: Option<&str>, json: bool) -> Result<(), CliError> {
    let target = parse_target(&args.ip)?;
    let transport = open_transport(name, TOOLS_NAME).await?;

    if !json {
        println!("PING > {}", target);
    }
    let ping = transport.build(MessageCode::Ping, &[])?;
    transport.send(&ping, target).await?;

    let deadline = Instant::now() + Duration::from_millis(args.timeout);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let Some(packet) = transport.receive(Some(remaining)).await? else {
            break;
        };
        if packet.code() != MessageCode::Pong {
            continue;
        }

        if json {
            println!("{}", pong_json(&packet));
        } else {
            println!("{}", format_pong(&packet));
        }
        return Ok(());
    }

    Err(CliError::NoReply(target.to_string()))
}

fn pong_detail(packet: &Packet) -> (String, String) {
    match packet.pong() {
        Ok(pong) => (pong.device_type.display_name(), pong.state.to_string()),
        Err(_) => ("Unknown".to_string(), "UNKNOWN".to_string()),
    }
}

/// `PONG < ip:port (name) // Type::State`
pub fn format_pong(packet: &Packet) -> String {
    let (device_type, state) = pong_detail(packet);
    format!(
        "PONG < {} ({}) // {}::{}",
        packet.origin(),
        packet.origin_name().cyan(),
        device_type,
        state
    )
}

fn pong_json(packet: &Packet) -> serde_json::Value {
    let (device_type, state) = pong_detail(packet);
    serde_json::json!({
        "origin": packet.origin().to_string(),
        "name": packet.origin_name(),
        "device_type": device_type,
        "state": state,
    })
}
