use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::codec::Frame;
use crate::decoder::{KissDecoder, DEFAULT_MAX_BUFFER};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// A framing error is returned once and the reader stays usable: the bad
/// bytes are already discarded and the next call resynchronizes.
pub struct FrameReader<T> {
    inner: T,
    decoder: KissDecoder,
    eof: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with the default buffer bound.
    pub fn new(inner: T) -> Self {
        Self::with_max_buffer(inner, DEFAULT_MAX_BUFFER)
    }

    /// Create a new frame reader with an explicit buffer bound.
    pub fn with_max_buffer(inner: T, max_buffer: usize) -> Self {
        Self {
            inner,
            decoder: KissDecoder::with_max_buffer(max_buffer),
            eof: false,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` once EOF is reached and
    /// the buffer is drained.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(result) = self.decoder.next_token(self.eof) {
                match Frame::from_token(result?) {
                    Some(frame) => return Ok(frame),
                    None => {
                        trace!("skipping empty frame");
                        continue;
                    }
                }
            }

            if self.eof {
                return Err(FrameError::ConnectionClosed);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.eof = true;
                continue;
            }

            self.decoder.push(&chunk[..read]);
        }
    }

}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    /// Lazy frame sequence; ends at EOF or on the first terminal I/O error.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Err(FrameError::ConnectionClosed) => None,
            Err(err) if !err.is_recoverable() => {
                self.eof = true;
                Some(Err(err))
            }
            other => Some(other),
        }
    }
}
