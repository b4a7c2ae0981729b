//! KISS framing for TNC links.
//!
//! Every frame on the wire is:
//! - a leading `FEND` (0xC0) delimiter
//! - one port/command byte (high nibble port 0-7, low nibble command)
//! - the payload, byte-stuffed so `FEND`/`FESC` never appear raw
//! - zero padding up to a 14-byte legacy minimum
//! - a trailing `FEND`
//!
//! Decoding is incremental: [`split`] is a pure, restartable step over a
//! buffer, [`KissDecoder`] owns its buffer, and [`FrameReader`] drives either
//! over any `Read` stream.

pub mod codec;
pub mod decoder;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;
pub mod port;
pub mod reader;
pub mod writer;

pub use codec::{encode, encode_frame, Frame, FEND, FESC, MIN_PAYLOAD, TFEND, TFESC};
pub use decoder::{split, KissDecoder, Split, DEFAULT_MAX_BUFFER};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use framed::KissCodec;
pub use port::{port_command, split_port_command, DATA, PORT_COUNT};
pub use reader::FrameReader;
pub use writer::FrameWriter;
