use std::fmt;
use std::io;

use kissgate_chat::PersistError;
use kissgate_frame::FrameError;
use kissgate_tnc::TncError;
use kissgate_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Open { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidAddress(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        FrameError::InvalidPort(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn tnc_error(context: &str, err: TncError) -> CliError {
    match err {
        TncError::Transport(err) => transport_error(context, err),
        TncError::Frame(err) => frame_error(context, err),
        TncError::InvalidPort(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TncError::Closed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        TncError::Spawn(source) => CliError::new(INTERNAL, format!("{context}: {source}")),
    }
}

pub fn persist_error(context: &str, err: PersistError) -> CliError {
    match err {
        PersistError::Io { source, .. } => io_error(context, source),
        PersistError::Json { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PersistError::LiveUsers(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
