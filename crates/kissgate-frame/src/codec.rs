use bytes::{BufMut, Bytes, BytesMut};

use crate::port::split_port_command;

/// Frame delimiter.
pub const FEND: u8 = 0xC0;
/// Escape byte.
pub const FESC: u8 = 0xDB;
/// Transposed FEND, sent as `FESC TFEND`.
pub const TFEND: u8 = 0xDC;
/// Transposed FESC, sent as `FESC TFESC`.
pub const TFESC: u8 = 0xDD;

/// Legacy minimum payload size; shorter payloads are zero-padded.
pub const MIN_PAYLOAD: usize = 14;

/// A decoded frame tagged with the port and command it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Port nibble (0-7 on a well-behaved link).
    pub port: u8,
    /// Command nibble. 0 is data.
    pub command: u8,
    /// The unescaped payload, padding included.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(port: u8, command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            port,
            command,
            payload: payload.into(),
        }
    }

    /// Build a frame from an unescaped tokenizer token.
    ///
    /// Returns `None` for an empty token (back-to-back delimiters).
    pub fn from_token(mut token: Bytes) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        let (port, command) = split_port_command(token[0]);
        let payload = token.split_off(1);
        Some(Self {
            port,
            command,
            payload,
        })
    }

    /// The payload with trailing zero padding removed.
    ///
    /// Padding is indistinguishable from data on the wire, so this is only
    /// meaningful for payloads that never end in a zero byte (text lines).
    pub fn unpadded(&self) -> &[u8] {
        let end = self
            .payload
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        &self.payload[..end]
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────┬───────────────────────┬─────────────┬──────┐
/// │ FEND │ port/cmd │ stuffed payload       │ zero pad    │ FEND │
/// │ 0xC0 │ (1B)     │ C0→DB DC, DB→DB DD    │ to 14 bytes │ 0xC0 │
/// └──────┴──────────┴───────────────────────┴─────────────┴──────┘
/// ```
///
/// Padding is computed from the unescaped length and appended raw; zero is
/// not a special byte.
pub fn encode_frame(port_command: u8, payload: &[u8], dst: &mut BytesMut) {
    let padding = MIN_PAYLOAD.saturating_sub(payload.len());
    // Exact when nothing needs escaping.
    dst.reserve(payload.len() + padding + 3);
    dst.put_u8(FEND);
    dst.put_u8(port_command);
    for &byte in payload {
        match byte {
            FEND => dst.put_slice(&[FESC, TFEND]),
            FESC => dst.put_slice(&[FESC, TFESC]),
            other => dst.put_u8(other),
        }
    }
    dst.put_bytes(0, padding);
    dst.put_u8(FEND);
}

/// Encode a frame into a fresh buffer.
pub fn encode(port_command: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    encode_frame(port_command, payload, &mut buf);
    buf.freeze()
}
