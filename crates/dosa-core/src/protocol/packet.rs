//! Fixed-header packet encoding and decoding.
//!
//! Layout (little-endian):
//!
//! | offset | size | field              |
//! |--------|------|--------------------|
//! | 0      | 2    | message id         |
//! | 2      | 3    | message code       |
//! | 5      | 2    | total payload size |
//! | 7      | 20   | origin device name |
//! | 27     | var  | body               |

use std::net::SocketAddr;

use crate::error::{ConfigError, MalformedPacket};

use super::codes::MessageCode;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 27;

/// Maximum length of an origin device name in bytes.
pub const MAX_NAME_LEN: usize = 20;

const CODE_OFFSET: usize = 2;
const SIZE_OFFSET: usize = 5;
const NAME_OFFSET: usize = 7;

/// Decoded view of a received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    message_id: u16,
    code: MessageCode,
    declared_size: u16,
    origin_name: String,
    origin: SocketAddr,
    body: Vec<u8>,
}

impl Packet {
    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    pub fn code(&self) -> MessageCode {
        self.code
    }

    /// Total size as declared by the sender (header included).
    pub fn declared_size(&self) -> u16 {
        self.declared_size
    }

    pub fn origin_name(&self) -> &str {
        &self.origin_name
    }

    pub fn origin(&self) -> SocketAddr {
        self.origin
    }

    /// Every byte after the header, as received.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body bytes bounded by the declared payload size.
    ///
    /// Variable-length text bodies (log messages, play names) end where the
    /// sender says the payload ends, even if the datagram carries padding.
    pub fn declared_body(&self) -> &[u8] {
        let declared = (self.declared_size as usize).saturating_sub(HEADER_SIZE);
        &self.body[..declared.min(self.body.len())]
    }

    /// Ensure the body holds at least `needed` bytes.
    pub(crate) fn require_body(&self, needed: usize) -> Result<(), MalformedPacket> {
        if self.body.len() < needed {
            return Err(MalformedPacket::BodyTooShort {
                code: self.code.to_string(),
                addr: self.origin,
                needed,
                len: self.body.len(),
            });
        }
        Ok(())
    }
}

/// Build a packet with a fresh random message id.
///
/// Ids are only meaningful per sender, so an occasional collision is
/// tolerated rather than tracked.
pub fn encode(code: MessageCode, origin_name: &str, aux: &[u8]) -> Result<Vec<u8>, ConfigError> {
    encode_with_id(rand::random(), code, origin_name, aux)
}

/// Build a packet with a caller-chosen message id.
pub fn encode_with_id(
    message_id: u16,
    code: MessageCode,
    origin_name: &str,
    aux: &[u8],
) -> Result<Vec<u8>, ConfigError> {
    validate_device_name(origin_name)?;

    let total = HEADER_SIZE + aux.len();
    let size = u16::try_from(total).map_err(|_| ConfigError::PayloadTooLarge { len: total })?;

    let mut payload = Vec::with_capacity(total);
    payload.extend_from_slice(&message_id.to_le_bytes());
    payload.extend_from_slice(&code.as_bytes());
    payload.extend_from_slice(&size.to_le_bytes());
    payload.extend_from_slice(origin_name.as_bytes());
    payload.resize(HEADER_SIZE, 0);
    payload.extend_from_slice(aux);

    Ok(payload)
}

/// Decode a datagram received from `origin`.
///
/// Only the length is validated; unknown codes are surfaced as
/// [`MessageCode::Unrecognized`].
pub fn decode(data: &[u8], origin: SocketAddr) -> Result<Packet, MalformedPacket> {
    if data.len() < HEADER_SIZE {
        return Err(MalformedPacket::TooShort {
            addr: origin,
            len: data.len(),
            min: HEADER_SIZE,
        });
    }

    let message_id = u16::from_le_bytes([data[0], data[1]]);
    let code = MessageCode::from_bytes([
        data[CODE_OFFSET],
        data[CODE_OFFSET + 1],
        data[CODE_OFFSET + 2],
    ]);
    let declared_size = u16::from_le_bytes([data[SIZE_OFFSET], data[SIZE_OFFSET + 1]]);
    let origin_name = String::from_utf8_lossy(&data[NAME_OFFSET..HEADER_SIZE])
        .trim_end_matches('\0')
        .to_string();

    Ok(Packet {
        message_id,
        code,
        declared_size,
        origin_name,
        origin,
        body: data[HEADER_SIZE..].to_vec(),
    })
}

/// Read the message id of an already-encoded payload.
pub fn message_id_of(payload: &[u8]) -> Option<u16> {
    match payload {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

/// Check that a device name fits the header.
pub fn validate_device_name(name: &str) -> Result<(), ConfigError> {
    if name.len() > MAX_NAME_LEN {
        return Err(ConfigError::NameTooLong {
            name: name.to_string(),
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}
