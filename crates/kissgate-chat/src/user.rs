use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::message::Identity;

/// How long after the last message a user still counts as here.
pub const PRESENCE_WINDOW: Duration = Duration::from_secs(60 * 60);

static NEXT_USER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique user handle; survives nick changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(u64);

impl UserId {
    pub fn next() -> Self {
        Self(NEXT_USER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

/// Where a user is connected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Interactive client on the chat listener.
    Local,
    /// Known only through radio traffic.
    Remote,
}

type Sink = Box<dyn Write + Send>;

/// Lines a queued outbox holds for a client that is not keeping up.
pub const OUTBOX_CAPACITY: usize = 256;

/// Serialized line output for one user.
///
/// Clones share the sink, so every writer to a given user goes through the
/// same lock or queue and lines never interleave.
#[derive(Clone, Default)]
pub struct Outbox {
    sink: Option<Target>,
}

#[derive(Clone)]
enum Target {
    Inline(Arc<Mutex<Sink>>),
    Queued(Queue),
}

#[derive(Clone)]
struct Queue {
    tx: SyncSender<String>,
    lagging: Arc<AtomicBool>,
}

impl Outbox {
    /// An outbox drained by its own `outbox` thread.
    ///
    /// `send_line` never waits on the sink. Once [`OUTBOX_CAPACITY`] lines are
    /// pending, further lines are dropped until the writer catches up. The
    /// thread exits when every clone is gone or the sink fails.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        let (tx, rx) = mpsc::sync_channel::<String>(OUTBOX_CAPACITY);
        let mut sink = sink;
        let spawned = thread::Builder::new()
            .name("outbox".into())
            .spawn(move || {
                for line in rx {
                    if let Err(err) = write_line(&mut sink, &line) {
                        debug!(error = %err, "client writer stopped");
                        return;
                    }
                }
            });
        match spawned {
            Ok(_) => Self {
                sink: Some(Target::Queued(Queue {
                    tx,
                    lagging: Arc::new(AtomicBool::new(false)),
                })),
            },
            Err(err) => {
                warn!(error = %err, "failed to start client writer, discarding output");
                Self::discard()
            }
        }
    }

    /// An outbox that writes on the caller's thread.
    pub fn inline(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Some(Target::Inline(Arc::new(Mutex::new(Box::new(sink))))),
        }
    }

    /// An outbox that drops everything; used for radio users.
    pub fn discard() -> Self {
        Self::default()
    }

    /// Write one line, CRLF-terminated. Failures are logged and dropped; a
    /// broken client is reclaimed when its read side fails.
    pub fn send_line(&self, line: &str) {
        match &self.sink {
            None => {}
            Some(Target::Inline(sink)) => {
                let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(err) = write_line(&mut *sink, line) {
                    debug!(error = %err, "dropping line for unreachable client");
                }
            }
            Some(Target::Queued(queue)) => match queue.tx.try_send(line.to_string()) {
                Ok(()) => queue.lagging.store(false, Ordering::Relaxed),
                Err(TrySendError::Full(_)) => {
                    if !queue.lagging.swap(true, Ordering::Relaxed) {
                        warn!("client is not reading, dropping lines");
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("dropping line for unreachable client");
                }
            },
        }
    }
}

fn write_line(sink: &mut dyn Write, line: &str) -> io::Result<()> {
    sink.write_all(line.as_bytes())?;
    sink.write_all(b"\r\n")?;
    sink.flush()
}

impl fmt::Debug for Outbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbox")
            .field("connected", &self.sink.is_some())
            .finish()
    }
}

/// A chat participant.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub nick: String,
    pub callsign: String,
    pub real_name: String,
    /// Last PRIVMSG/NOTICE sent by this user.
    pub last_seen: Option<SystemTime>,
    pub origin: Origin,
    pub outbox: Outbox,
}

impl User {
    pub fn local(nick: &str, callsign: &str, real_name: &str, outbox: Outbox) -> Self {
        Self {
            id: UserId::next(),
            nick: nick.to_string(),
            callsign: callsign.to_string(),
            real_name: real_name.to_string(),
            last_seen: None,
            origin: Origin::Local,
            outbox,
        }
    }

    pub fn remote(identity: Identity) -> Self {
        Self {
            id: UserId::next(),
            nick: identity.nick,
            callsign: identity.callsign,
            real_name: identity.real_name,
            last_seen: None,
            origin: Origin::Remote,
            outbox: Outbox::discard(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }

    pub fn identity(&self) -> Identity {
        Identity {
            nick: self.nick.clone(),
            callsign: self.callsign.clone(),
            real_name: self.real_name.clone(),
        }
    }

    /// `nick!callsign@Real_Name`, used as the message prefix.
    pub fn prefix(&self) -> String {
        self.identity().to_string()
    }

    /// `H` (here) if the user spoke within the presence window, `G` otherwise.
    pub fn status(&self) -> &'static str {
        self.status_at(SystemTime::now())
    }

    pub fn status_at(&self, now: SystemTime) -> &'static str {
        match self.last_seen.map(|seen| now.duration_since(seen)) {
            Some(Ok(elapsed)) if elapsed < PRESENCE_WINDOW => "H",
            Some(Err(_)) => "H",
            _ => "G",
        }
    }

    pub fn send_line(&self, line: &str) {
        self.outbox.send_line(line);
    }
}
