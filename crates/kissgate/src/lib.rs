//! Gateway between a KISS TNC radio link and IRC-style chat clients.
//!
//! Radio traffic arrives as KISS frames, is demultiplexed by port and fed
//! into a chat directory that local clients connect to. Lines sent by local
//! clients go back out over the radio.
//!
//! # Crate Structure
//!
//! - [`transport`]: radio-side streams and the chat listener
//! - [`frame`]: KISS frame encoding and the incremental tokenizer
//! - [`tnc`]: port multiplexer with drop-oldest queues
//! - [`chat`]: directory, router, radio bridge and client sessions

/// Re-export transport types.
pub mod transport {
    pub use kissgate_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use kissgate_frame::*;
}

/// Re-export port multiplexer types.
pub mod tnc {
    pub use kissgate_tnc::*;
}

/// Re-export chat types.
pub mod chat {
    pub use kissgate_chat::*;
}
