//! Port multiplexer for a KISS TNC link.
//!
//! One router thread drains the shared transport and sorts frames by port
//! into 8 bounded queues. Each [`Port`] reads from its own queue and writes
//! through the shared link.

pub mod error;
pub mod queue;
pub mod tnc;

pub use error::{PortWriteError, Result, TncError};
pub use queue::{PortQueue, QUEUE_CAPACITY};
pub use tnc::{Port, Tnc};
