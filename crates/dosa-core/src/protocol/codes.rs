//! Three-byte message codes carried at offset 2 of every packet.

use std::fmt;

/// Message code tag.
///
/// The set is closed; anything else that arrives on the wire is kept as
/// `Unrecognized` so it can still be logged and acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCode {
    Ack,
    Log,
    Security,
    Online,
    Trigger,
    Ota,
    Debug,
    Flush,
    Begin,
    End,
    BluetoothConfig,
    Ping,
    Pong,
    ConfigSetting,
    Play,
    Unrecognized([u8; 3]),
}

impl MessageCode {
    /// Every known code, in wire-table order.
    pub const KNOWN: [MessageCode; 15] = [
        MessageCode::Ack,
        MessageCode::Log,
        MessageCode::Security,
        MessageCode::Online,
        MessageCode::Trigger,
        MessageCode::Ota,
        MessageCode::Debug,
        MessageCode::Flush,
        MessageCode::Begin,
        MessageCode::End,
        MessageCode::BluetoothConfig,
        MessageCode::Ping,
        MessageCode::Pong,
        MessageCode::ConfigSetting,
        MessageCode::Play,
    ];

    pub fn from_bytes(tag: [u8; 3]) -> Self {
        match &tag {
            b"ack" => MessageCode::Ack,
            b"log" => MessageCode::Log,
            b"sec" => MessageCode::Security,
            b"onl" => MessageCode::Online,
            b"trg" => MessageCode::Trigger,
            b"ota" => MessageCode::Ota,
            b"dbg" => MessageCode::Debug,
            b"fls" => MessageCode::Flush,
            b"bgn" => MessageCode::Begin,
            b"end" => MessageCode::End,
            b"btc" => MessageCode::BluetoothConfig,
            b"pin" => MessageCode::Ping,
            b"pon" => MessageCode::Pong,
            b"cfg" => MessageCode::ConfigSetting,
            b"pla" => MessageCode::Play,
            _ => MessageCode::Unrecognized(tag),
        }
    }

    pub fn as_bytes(&self) -> [u8; 3] {
        match self {
            MessageCode::Ack => *b"ack",
            MessageCode::Log => *b"log",
            MessageCode::Security => *b"sec",
            MessageCode::Online => *b"onl",
            MessageCode::Trigger => *b"trg",
            MessageCode::Ota => *b"ota",
            MessageCode::Debug => *b"dbg",
            MessageCode::Flush => *b"fls",
            MessageCode::Begin => *b"bgn",
            MessageCode::End => *b"end",
            MessageCode::BluetoothConfig => *b"btc",
            MessageCode::Ping => *b"pin",
            MessageCode::Pong => *b"pon",
            MessageCode::ConfigSetting => *b"cfg",
            MessageCode::Play => *b"pla",
            MessageCode::Unrecognized(tag) => *tag,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, MessageCode::Unrecognized(_))
    }

    /// Codes the bot acknowledges. Retries of these must be re-acked, since
    /// the sender is still waiting.
    pub fn expects_ack(&self) -> bool {
        matches!(
            self,
            MessageCode::Begin
                | MessageCode::End
                | MessageCode::Log
                | MessageCode::Security
                | MessageCode::Play
                | MessageCode::Unrecognized(_)
        )
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.as_bytes()))
    }
}
