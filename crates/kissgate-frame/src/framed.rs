//! `tokio_util::codec` adapter for async KISS links.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::codec::{encode_frame, Frame};
use crate::decoder::{next_token, DEFAULT_MAX_BUFFER};
use crate::error::FrameError;
use crate::port::{is_valid_port, port_command};

/// KISS codec for `FramedRead`/`FramedWrite`.
///
/// Framing errors are logged and skipped so a single corrupt frame does not
/// end the stream. Only I/O errors surface through `Self::Error`.
#[derive(Debug, Clone)]
pub struct KissCodec {
    max_buffer: usize,
}

impl KissCodec {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self { max_buffer }
    }

    fn next_frame(&self, src: &mut BytesMut, at_eof: bool) -> Option<Frame> {
        while let Some(result) = next_token(src, at_eof, self.max_buffer) {
            let token = match result {
                Ok(token) => token,
                Err(err) => {
                    warn!(error = %err, "discarding malformed KISS frame");
                    continue;
                }
            };
            match Frame::from_token(token) {
                Some(frame) if is_valid_port(frame.port) => return Some(frame),
                Some(frame) => debug!(port = frame.port, "dropping frame for unknown port"),
                None => {}
            }
        }
        None
    }
}

impl Default for KissCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for KissCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        Ok(self.next_frame(src, false))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        let frame = self.next_frame(src, true);
        if frame.is_none() {
            src.clear();
        }
        Ok(frame)
    }
}

impl Encoder<Frame> for KissCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let byte = port_command(item.port, item.command)?;
        encode_frame(byte, item.payload.as_ref(), dst);
        Ok(())
    }
}
