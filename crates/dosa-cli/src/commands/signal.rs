//! Fire-and-forget signals: trigger, OTA request and network flush.

use dosa_core::protocol::body::IR_GRID_CELLS;
use dosa_core::protocol::{MessageCode, TriggerDetail};
use dosa_core::transport::PacketTransport;

use super::{open_transport, parse_target, TOOLS_NAME};
use crate::cli::TargetArgs;
use crate::error::CliError;

/// Trigger body: sensor subtype followed by an empty IR grid.
pub fn trigger_body() -> Vec<u8> {
    let mut body = TriggerDetail::Sensor.to_body();
    body.resize(1 + IR_GRID_CELLS, 0);
    body
}

pub async fn run_trigger(args: TargetArgs, name: Option<&str>, json: bool) -> Result<(), CliError> {
    dispatch(MessageCode::Trigger, &trigger_body(), args, name, json, "Trigger dispatched").await
}

pub async fn run_ota(args: TargetArgs, name: Option<&str>, json: bool) -> Result<(), CliError> {
    dispatch(MessageCode::Ota, &[], args, name, json, "OTA update requested").await
}

pub async fn run_flush(args: TargetArgs, name: Option<&str>, json: bool) -> Result<(), CliError> {
    dispatch(MessageCode::Flush, &[], args, name, json, "Flush request dispatched").await
}

async fn dispatch(
    code: MessageCode,
    aux: &[u8],
    args: TargetArgs,
    name: Option<&str>,
    json: bool,
    done: &str,
) -> Result<(), CliError> {
    let target = args.ip.as_deref().map(parse_target).transpose()?;

    let transport = open_transport(name, TOOLS_NAME).await?;
    let payload = transport.build(code, aux)?;

    match target {
        Some(addr) => transport.send(&payload, addr).await?,
        None => transport.broadcast(&payload).await?,
    }

    if json {
        let target = target.map(|a| a.to_string());
        println!(
            "{}",
            serde_json::json!({ "code": code.to_string(), "target": target, "sent": true })
        );
    } else {
        println!("{}", done);
    }
    Ok(())
}
