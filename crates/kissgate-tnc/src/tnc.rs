use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::thread::{self, JoinHandle};

use kissgate_frame::{port_command, Frame, FrameError, FrameReader, FrameWriter, DATA, PORT_COUNT};
use kissgate_transport::{RadioAddr, RadioStream};
use tracing::{debug, info, trace, warn};

use crate::error::{PortWriteError, Result, TncError};
use crate::queue::PortQueue;

type SharedWriter = FrameWriter<Box<dyn Write + Send>>;

/// A KISS TNC link demultiplexed into 8 ports.
///
/// The router thread owns the read half. Writes from any port are serialized
/// through one writer lock.
pub struct Tnc {
    queues: Vec<PortQueue>,
    writer: Mutex<SharedWriter>,
    closed: Once,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl Tnc {
    /// Connect to a TNC and start routing its frames.
    pub fn connect(addr: &RadioAddr) -> Result<Arc<Self>> {
        let stream = RadioStream::connect(addr)?;
        let reader = stream.try_clone()?;
        info!(addr = %addr, transport = stream.transport_name(), "connected to TNC");
        Self::start(reader, stream)
    }

    /// Start routing frames read from `reader`; ports write to `writer`.
    ///
    /// Both halves are expected to be the same link.
    pub fn start<R, W>(reader: R, writer: W) -> Result<Arc<Self>>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let tnc = Arc::new(Self {
            queues: (0..PORT_COUNT).map(|_| PortQueue::new()).collect(),
            writer: Mutex::new(FrameWriter::new(Box::new(writer))),
            closed: Once::new(),
            router: Mutex::new(None),
        });

        let router = Arc::clone(&tnc);
        let handle = thread::Builder::new()
            .name("kiss-router".to_string())
            .spawn(move || router.route(FrameReader::new(reader)))
            .map_err(TncError::Spawn)?;
        *lock(&tnc.router) = Some(handle);

        Ok(tnc)
    }

    fn route<R: Read>(&self, mut reader: FrameReader<R>) {
        loop {
            match reader.read_frame() {
                Ok(frame) => self.dispatch(frame),
                Err(err) if err.is_recoverable() => {
                    debug!(error = %err, "discarding malformed frame");
                }
                Err(FrameError::ConnectionClosed) => {
                    info!("TNC link reached end of stream");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "TNC read failed");
                    break;
                }
            }
        }
        self.close();
    }

    fn dispatch(&self, frame: Frame) {
        let port = frame.port;
        let Some(queue) = self.queues.get(usize::from(port)) else {
            debug!(port, "dropping frame for unknown port");
            return;
        };
        trace!(port, command = frame.command, len = frame.payload.len(), "frame received");
        if let Some(evicted) = queue.push(frame) {
            debug!(port, dropped = evicted.payload.len(), "port queue full, dropped oldest frame");
        }
    }

    /// Close every port queue. Runs at most once; later calls are no-ops.
    ///
    /// Queued frames stay readable; once drained every read ends.
    pub fn close(&self) {
        self.closed.call_once(|| {
            for queue in &self.queues {
                queue.close();
            }
            debug!("all TNC ports closed");
        });
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_completed()
    }

    /// Handle for one port (0-7).
    pub fn port(self: &Arc<Self>, port: u8) -> Result<Port> {
        if self.queues.get(usize::from(port)).is_none() {
            return Err(TncError::InvalidPort(port));
        }
        Ok(Port {
            tnc: Arc::clone(self),
            port,
        })
    }

    /// Wait for the router thread to exit, which happens when the link ends.
    pub fn join(&self) {
        let handle = lock(&self.router).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("TNC router thread panicked");
                self.close();
            }
        }
    }

    fn transmit(&self, port: u8, payload: &[u8]) -> Result<()> {
        let byte = port_command(port, DATA)?;
        lock(&self.writer).send(byte, payload)?;
        trace!(port, len = payload.len(), "frame transmitted");
        Ok(())
    }
}

impl std::fmt::Debug for Tnc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tnc")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One of the 8 logical channels of a [`Tnc`].
#[derive(Debug, Clone)]
pub struct Port {
    tnc: Arc<Tnc>,
    port: u8,
}

impl Port {
    pub fn id(&self) -> u8 {
        self.port
    }

    fn queue(&self) -> &PortQueue {
        &self.tnc.queues[usize::from(self.port)]
    }

    /// Block until the next frame for this port, or `None` once the link is
    /// closed and the queue drained.
    pub fn read(&self) -> Option<Frame> {
        self.queue().pop()
    }

    /// Next queued frame, if any, without blocking.
    pub fn try_read(&self) -> Option<Frame> {
        self.queue().try_pop()
    }

    /// Encode `payload` as a data frame for this port and write it to the link.
    ///
    /// Returns the payload length. On failure the error still carries the
    /// full length as `written`.
    pub fn transmit(&self, payload: &[u8]) -> std::result::Result<usize, PortWriteError> {
        self.tnc
            .transmit(self.port, payload)
            .map(|()| payload.len())
            .map_err(|source| PortWriteError {
                written: payload.len(),
                source,
            })
    }

    pub fn tnc(&self) -> &Arc<Tnc> {
        &self.tnc
    }
}
