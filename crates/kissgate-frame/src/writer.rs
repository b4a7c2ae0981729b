use std::io::{self, ErrorKind, Write};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame};
use crate::error::{FrameError, Result};
use crate::port::port_command;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Pause between retries when the stream reports `WouldBlock`.
const STALL_PAUSE: Duration = Duration::from_millis(2);

/// Consecutive `WouldBlock` results tolerated before a write gives up.
pub const DEFAULT_MAX_STALLS: u32 = 2_500;

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out with one encode into a reused buffer, then a write
/// loop that resumes short writes. A stream that keeps reporting
/// `WouldBlock` (a non-blocking socket, or one with a write timeout) is
/// retried with a short pause until the stall budget runs out.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    max_stalls: u32,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_stalls: DEFAULT_MAX_STALLS,
        }
    }

    /// Give up after `max_stalls` consecutive `WouldBlock` results.
    pub fn with_max_stalls(mut self, max_stalls: u32) -> Self {
        self.max_stalls = max_stalls;
        self
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let byte = port_command(frame.port, frame.command)?;
        self.send(byte, frame.payload.as_ref())
    }

    /// Encode and send a payload behind a raw port/command byte.
    pub fn send(&mut self, port_command: u8, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(port_command, payload, &mut self.buf);

        let mut stalls = 0;
        let mut offset = 0;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    offset += n;
                    stalls = 0;
                }
                Err(err) => self.absorb(err, &mut stalls)?,
            }
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        let mut stalls = 0;
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) => self.absorb(err, &mut stalls)?,
            }
        }
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Swallow errors worth retrying; anything else ends the write.
    fn absorb(&self, err: io::Error, stalls: &mut u32) -> Result<()> {
        match err.kind() {
            ErrorKind::Interrupted => Ok(()),
            ErrorKind::WouldBlock if *stalls < self.max_stalls => {
                *stalls += 1;
                thread::sleep(STALL_PAUSE);
                Ok(())
            }
            _ => Err(FrameError::Io(err)),
        }
    }
}
