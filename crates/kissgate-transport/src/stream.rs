use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;

use crate::addr::RadioAddr;
use crate::error::{Result, TransportError};

/// A connected radio-side stream. Implements `Read` and `Write`.
///
/// One TNC link is shared by a single continuous reader and any number of
/// writers; [`RadioStream::try_clone`] hands out the extra handles.
pub struct RadioStream {
    inner: RadioStreamInner,
}

enum RadioStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Device(File),
}

impl Read for RadioStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RadioStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            RadioStreamInner::Unix(stream) => stream.read(buf),
            RadioStreamInner::Device(file) => file.read(buf),
        }
    }
}

impl Write for RadioStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RadioStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            RadioStreamInner::Unix(stream) => stream.write(buf),
            RadioStreamInner::Device(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            RadioStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            RadioStreamInner::Unix(stream) => stream.flush(),
            RadioStreamInner::Device(file) => file.flush(),
        }
    }
}

impl RadioStream {
    /// Open the TNC at `addr` (blocking).
    pub fn connect(addr: &RadioAddr) -> Result<Self> {
        match addr {
            RadioAddr::Tcp(host_port) => {
                let stream =
                    TcpStream::connect(host_port).map_err(|e| TransportError::Connect {
                        addr: host_port.clone(),
                        source: e,
                    })?;
                // KISS frames are small; don't let Nagle sit on them.
                stream.set_nodelay(true)?;
                debug!(addr = %host_port, "connected to kiss tnc over tcp");
                Ok(Self::from_tcp(stream))
            }
            #[cfg(unix)]
            RadioAddr::Unix(path) => {
                let stream = std::os::unix::net::UnixStream::connect(path).map_err(|e| {
                    TransportError::Connect {
                        addr: path.display().to_string(),
                        source: e,
                    }
                })?;
                debug!(?path, "connected to kiss tnc over unix socket");
                Ok(Self::from_unix(stream))
            }
            #[cfg(not(unix))]
            RadioAddr::Unix(path) => Err(TransportError::Connect {
                addr: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix sockets are not available on this platform",
                ),
            }),
            RadioAddr::Device(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(|e| TransportError::Open {
                        path: path.clone(),
                        source: e,
                    })?;
                debug!(?path, "opened kiss tnc device");
                Ok(Self::from_device(file))
            }
        }
    }

    /// Wrap an already-connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: RadioStreamInner::Tcp(stream),
        }
    }

    /// Wrap an already-connected Unix stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: RadioStreamInner::Unix(stream),
        }
    }

    /// Wrap an open device file.
    pub fn from_device(file: File) -> Self {
        Self {
            inner: RadioStreamInner::Device(file),
        }
    }

    /// Set read timeout on the underlying stream.
    ///
    /// Device files have no timeout support; the call is accepted and ignored.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RadioStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            RadioStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            RadioStreamInner::Device(_) => Ok(()),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RadioStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            RadioStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            RadioStreamInner::Device(_) => Ok(()),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            RadioStreamInner::Tcp(stream) => RadioStreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            RadioStreamInner::Unix(stream) => RadioStreamInner::Unix(stream.try_clone()?),
            RadioStreamInner::Device(file) => RadioStreamInner::Device(file.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            RadioStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            RadioStreamInner::Unix(_) => "unix",
            RadioStreamInner::Device(_) => "device",
        }
    }
}

impl std::fmt::Debug for RadioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
