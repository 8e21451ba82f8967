//! Play request.

use dosa_core::protocol::MessageCode;
use dosa_core::transport::{PacketTransport, DEFAULT_ACK_TIMEOUT};

use super::{open_transport, TOOLS_NAME};
use crate::cli::PlayArgs;
use crate::error::CliError;

/// Broadcast a play request and wait for the security bot to acknowledge it.
pub async fn run_play(args: PlayArgs, name: Option<&str>, json: bool) -> Result<(), CliError> {
    if args.play.is_empty() {
        return Err(CliError::InvalidArgument("Play name cannot be empty".to_string()));
    }

    let transport = open_transport(name, TOOLS_NAME).await?;
    let payload = transport.build(MessageCode::Play, args.play.as_bytes())?;
    let group = transport.config().broadcast_addr;

    if !json {
        println!("RUN PLAY > {}", args.play);
    }

    let acked = transport
        .send_and_await_ack(&payload, group, DEFAULT_ACK_TIMEOUT)
        .await?;

    if !acked {
        return Err(CliError::NotAcknowledged(format!("Play '{}'", args.play)));
    }

    if json {
        println!("{}", serde_json::json!({ "play": args.play, "acknowledged": true }));
    } else {
        println!("Play request acknowledged.");
    }
    Ok(())
}
