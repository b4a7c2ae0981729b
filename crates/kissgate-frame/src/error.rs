/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended after a start delimiter but before the closing one.
    #[error("incomplete KISS frame")]
    IncompleteFrame,

    /// An escape byte was the last byte before the closing delimiter.
    #[error("incomplete escape sequence")]
    IncompleteEscape,

    /// An escape byte was followed by something other than TFEND/TFESC.
    #[error("invalid escape sequence (FESC followed by 0x{byte:02X})")]
    InvalidEscape { byte: u8 },

    /// A frame grew past the decoder's buffer bound without terminating.
    #[error("frame too long ({len} bytes buffered, max {max})")]
    FrameTooLong { len: usize, max: usize },

    /// A port number outside 0-7 was requested.
    #[error("invalid port {0}: must be 0-7")]
    InvalidPort(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached end-of-file.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Framing errors only discard the offending bytes; the stream stays usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::IncompleteFrame
                | FrameError::IncompleteEscape
                | FrameError::InvalidEscape { .. }
                | FrameError::FrameTooLong { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
