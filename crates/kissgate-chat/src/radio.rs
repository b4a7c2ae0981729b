use kissgate_frame::Frame;
use kissgate_tnc::Port;
use tracing::warn;

/// Outbound side of the radio link.
///
/// Transmission is best-effort: implementations log failures and move on.
pub trait RadioLink: Send + Sync {
    fn transmit_line(&self, line: &str);
}

impl RadioLink for Port {
    fn transmit_line(&self, line: &str) {
        if let Err(err) = self.transmit(line.as_bytes()) {
            warn!(port = self.id(), written = err.written, error = %err.source, "radio transmit failed");
        }
    }
}

/// Inbound side of the radio link.
pub trait FrameSource {
    /// Block for the next frame; `None` once the link is gone.
    fn next_frame(&self) -> Option<Frame>;
}

impl FrameSource for Port {
    fn next_frame(&self) -> Option<Frame> {
        self.read()
    }
}
