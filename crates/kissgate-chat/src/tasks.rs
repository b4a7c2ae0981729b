//! Periodic background work: keepalive pings and state snapshots.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::directory::Directory;

/// Default interval between keepalive pings.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Default interval between state snapshots.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(10);

/// One-shot stop signal shared by background threads.
#[derive(Debug, Default)]
pub struct Shutdown {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn trigger(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until triggered.
    pub fn wait(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            stopped = self.cond.wait(stopped).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sleep for `timeout` unless triggered first. Returns `true` once
    /// triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = self
                .cond
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *stopped
    }
}

fn lag_token() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    format!("LAG{secs}")
}

/// Ping every local user each `interval` until shutdown.
pub fn spawn_keepalive(
    directory: Arc<Directory>,
    interval: Duration,
    shutdown: Arc<Shutdown>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("keepalive".into())
        .spawn(move || {
            while !shutdown.wait_timeout(interval) {
                let token = lag_token();
                debug!(%token, users = directory.local_user_count(), "keepalive");
                directory.ping_local_users(&token);
            }
        })
}

/// Save the directory to `path` each `interval` until shutdown.
///
/// Failures are logged and retried on the next tick. No final save is made
/// here; the owner saves once more after stopping this thread.
pub fn spawn_snapshots(
    directory: Arc<Directory>,
    path: PathBuf,
    interval: Duration,
    shutdown: Arc<Shutdown>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("snapshots".into())
        .spawn(move || {
            while !shutdown.wait_timeout(interval) {
                if let Err(err) = directory.save(&path) {
                    warn!(error = %err, "periodic state save failed");
                }
            }
        })
}
