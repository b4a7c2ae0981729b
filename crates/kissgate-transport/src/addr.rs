use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

/// Where the KISS TNC lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioAddr {
    /// `host:port` of a software modem's KISS-over-TCP service.
    Tcp(String),
    /// A Unix domain socket path.
    Unix(PathBuf),
    /// A serial device or pseudo-terminal, opened read/write.
    Device(PathBuf),
}

impl FromStr for RadioAddr {
    type Err = TransportError;

    /// Accepts `tcp:host:port`, `unix:/path`, `file:/path`, a bare path
    /// starting with `/`, or a bare `host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }

        if let Some(rest) = s.strip_prefix("tcp:") {
            return parse_tcp(rest).ok_or_else(|| TransportError::InvalidAddress(s.to_string()));
        }
        if let Some(rest) = s.strip_prefix("unix:") {
            if rest.is_empty() {
                return Err(TransportError::InvalidAddress(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(rest)));
        }
        if let Some(rest) = s.strip_prefix("file:") {
            if rest.is_empty() {
                return Err(TransportError::InvalidAddress(s.to_string()));
            }
            return Ok(Self::Device(PathBuf::from(rest)));
        }
        if s.starts_with('/') {
            return Ok(Self::Device(PathBuf::from(s)));
        }

        parse_tcp(s).ok_or_else(|| TransportError::InvalidAddress(s.to_string()))
    }
}

fn parse_tcp(s: &str) -> Option<RadioAddr> {
    let (host, port) = s.rsplit_once(':')?;
    port.parse::<u16>().ok()?;
    // A bare ":8001" means localhost.
    let host = if host.is_empty() { "127.0.0.1" } else { host };
    Some(RadioAddr::Tcp(format!("{host}:{port}")))
}

impl fmt::Display for RadioAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioAddr::Tcp(addr) => write!(f, "tcp:{addr}"),
            RadioAddr::Unix(path) => write!(f, "unix:{}", path.display()),
            RadioAddr::Device(path) => write!(f, "file:{}", path.display()),
        }
    }
}
