/// Errors that can occur while driving a TNC link.
#[derive(Debug, thiserror::Error)]
pub enum TncError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] kissgate_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] kissgate_frame::FrameError),

    /// A port number outside 0-7 was requested.
    #[error("invalid port {0}: must be 0-7")]
    InvalidPort(u8),

    /// The router thread could not be started.
    #[error("failed to start TNC router: {0}")]
    Spawn(#[source] std::io::Error),

    /// The link is down; every port queue has been closed.
    #[error("TNC link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TncError>;

/// A failed port write.
///
/// Writes are fire-and-forget: `written` always reports the full requested
/// length even though the frame may never have reached the link.
#[derive(Debug, thiserror::Error)]
#[error("write of {written} bytes on port failed: {source}")]
pub struct PortWriteError {
    pub written: usize,
    #[source]
    pub source: TncError,
}
