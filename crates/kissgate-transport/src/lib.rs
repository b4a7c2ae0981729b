//! Byte-stream transports for the gateway.
//!
//! Two sides are covered:
//! - the radio side, a bidirectional stream to a KISS TNC: a TCP socket to a
//!   software modem, a Unix socket, or a serial device / pseudo-terminal
//! - the chat side, a TCP listener handing out one stream per client
//!
//! This is the lowest layer of kissgate. Framing and multiplexing build on
//! top of the [`RadioStream`] type provided here.

pub mod addr;
pub mod error;
pub mod listener;
pub mod stream;

pub use addr::RadioAddr;
pub use error::{Result, TransportError};
pub use listener::ChatListener;
pub use stream::RadioStream;
