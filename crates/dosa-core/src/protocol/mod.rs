//! DOSA wire protocol.
//!
//! Packets are a fixed 27-byte header followed by a code-specific body.

pub mod body;
pub mod codes;
pub mod packet;

pub use body::{
    ack_body, lock_state_body, log_body, pong_body, LockState, LogEntry, LogLevel, PongBody,
    SecurityLevel, TriggerDetail,
};
pub use codes::MessageCode;
pub use packet::{
    decode, encode, encode_with_id, message_id_of, validate_device_name, Packet, HEADER_SIZE,
    MAX_NAME_LEN,
};
