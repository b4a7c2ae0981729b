//! IRC-style chat server state for kissgate.
//!
//! A [`Directory`] holds every user and channel behind one lock. Local
//! clients drive it through a [`Session`] per connection; radio traffic is
//! fed in by the [`Bridge`]. Locally-originated PRIVMSG, NOTICE, PART and
//! TOPIC lines are also transmitted on the attached [`RadioLink`].
//!
//! ```
//! use std::sync::Arc;
//! use kissgate_chat::{Bridge, Directory};
//!
//! let directory = Arc::new(Directory::new("kissgate", true));
//! let bridge = Bridge::new(Arc::clone(&directory));
//! bridge.handle_line(":N0CALL!N0CALL@Jane PRIVMSG #net :check in");
//! assert_eq!(directory.members("#net"), vec!["N0CALL"]);
//! ```

pub mod bridge;
pub mod channel;
pub mod command;
pub mod directory;
pub mod error;
mod info;
pub mod message;
pub mod persist;
pub mod radio;
pub mod reply;
mod router;
pub mod session;
pub mod tasks;
pub mod user;

pub use bridge::{Bridge, Bridged};
pub use channel::Channel;
pub use command::Command;
pub use directory::Directory;
pub use error::{ChatError, PersistError, Result};
pub use message::{Identity, Message};
pub use persist::{ChannelRecord, Loaded, Snapshot, UserRecord};
pub use radio::{FrameSource, RadioLink};
pub use session::{Flow, Registration, Session, MAX_LINE_LEN};
pub use tasks::{spawn_keepalive, spawn_snapshots, Shutdown, KEEPALIVE_INTERVAL, SNAPSHOT_INTERVAL};
pub use user::{Origin, Outbox, User, UserId, OUTBOX_CAPACITY};
