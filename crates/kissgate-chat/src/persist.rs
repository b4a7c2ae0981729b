//! Directory snapshots on disk.
//!
//! Channels store member nicks only; full user records live once in the
//! user list. Loading repairs memberships that no longer resolve.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::channel::Channel;
use crate::directory::Directory;
use crate::error::PersistError;
use crate::message::{normalize, Identity};
use crate::user::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub auto_join: bool,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub nick: String,
    pub callsign: String,
    pub real_name: String,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub topic_who: String,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_time: Option<u64>,
    /// Member nicks.
    #[serde(default)]
    pub users: Vec<String>,
}

fn to_unix(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|elapsed| elapsed.as_secs())
}

fn from_unix(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Outcome of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded {
    /// No state file; the directory was left empty.
    Missing,
    Restored { users: usize, channels: usize },
}

impl Directory {
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        let mut users: Vec<UserRecord> = state
            .users
            .values()
            .map(|user| UserRecord {
                nick: user.nick.clone(),
                callsign: user.callsign.clone(),
                real_name: user.real_name.clone(),
                last_seen: user.last_seen.and_then(to_unix),
            })
            .collect();
        users.sort_by(|a, b| a.nick.cmp(&b.nick));

        let channels = state
            .channels
            .values()
            .map(|channel| ChannelRecord {
                name: channel.name.clone(),
                topic: channel.topic.clone(),
                topic_who: channel.topic_who.clone(),
                topic_time: channel.topic_time.and_then(to_unix),
                users: state.member_nicks(channel),
            })
            .collect();

        Snapshot {
            name: state.name.clone(),
            auto_join: state.auto_join,
            users,
            channels,
        }
    }

    /// Replace users and channels with a snapshot's.
    ///
    /// Refused while any local user is connected. Every restored user is a
    /// radio user. Member nicks that do not resolve to a restored user are
    /// dropped and the rest are re-keyed under the normalized nick. The
    /// running server name and auto-join setting are kept.
    pub fn restore(&self, snapshot: Snapshot) -> Result<(), PersistError> {
        let mut state = self.lock();
        let live = state.local_user_count();
        if live > 0 {
            return Err(PersistError::LiveUsers(live));
        }
        if snapshot.name != state.name || snapshot.auto_join != state.auto_join {
            debug!(
                saved_name = %snapshot.name,
                saved_auto_join = snapshot.auto_join,
                "keeping running configuration over saved settings"
            );
        }

        let mut users = HashMap::new();
        for record in snapshot.users {
            let mut user = User::remote(Identity {
                nick: record.nick,
                callsign: record.callsign,
                real_name: record.real_name,
            });
            user.last_seen = record.last_seen.map(from_unix);
            users.insert(normalize(&user.nick), user);
        }

        let mut channels = BTreeMap::new();
        let mut dropped = 0usize;
        for record in snapshot.channels {
            let mut channel = Channel::new(&record.name);
            channel.topic = record.topic;
            channel.topic_who = record.topic_who;
            channel.topic_time = record.topic_time.map(from_unix);
            for nick in record.users {
                let key = normalize(&nick);
                if users.contains_key(&key) {
                    channel.members.insert(key);
                } else {
                    dropped += 1;
                }
            }
            channels.insert(normalize(&record.name), channel);
        }
        if dropped > 0 {
            debug!(dropped, "dropped memberships for unknown nicks");
        }

        state.users = users;
        state.channels = channels;
        Ok(())
    }

    /// Write a snapshot to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let snapshot = self.snapshot();
        let io_err = |source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        };

        let tmp = path.with_extension("tmp");
        let file = fs::File::create(&tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &snapshot).map_err(|source| {
            PersistError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        drop(writer);
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), users = snapshot.users.len(), "state saved");
        Ok(())
    }

    /// Restore from `path`. A missing file leaves the directory untouched.
    pub fn load(&self, path: &Path) -> Result<Loaded, PersistError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no saved state, starting empty");
                return Ok(Loaded::Missing);
            }
            Err(source) => {
                return Err(PersistError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| PersistError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        self.restore(snapshot)?;
        let state = self.lock();
        let loaded = Loaded::Restored {
            users: state.users.len(),
            channels: state.channels.len(),
        };
        info!(path = %path.display(), ?loaded, "state loaded");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::bridge::Bridge;
    use crate::directory::testing::local;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "kissgate-{}-{}-{}",
            tag,
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn populated() -> std::sync::Arc<Directory> {
        let directory = std::sync::Arc::new(Directory::new("kissgate", false));
        let bridge = Bridge::new(std::sync::Arc::clone(&directory));
        bridge.handle_line(":N0CALL!N0CALL@Jane PRIVMSG #NET :one");
        bridge.handle_line(":K9RAD!K9RAD@Rad PRIVMSG #NET :two");
        bridge.handle_line(":K9RAD!K9RAD@Rad TOPIC #Contest :field day");
        directory
    }

    #[test]
    fn save_then_load_reproduces_channels() {
        let dir = unique_temp_dir("roundtrip");
        let path = dir.join("state.json");
        let original = populated();
        original.save(&path).unwrap();

        let restored = Directory::new("kissgate", false);
        let loaded = restored.load(&path).unwrap();

        assert_eq!(loaded, Loaded::Restored { users: 2, channels: 2 });
        assert_eq!(restored.snapshot(), original.snapshot());
        assert_eq!(restored.members("#net"), vec!["K9RAD", "N0CALL"]);
        assert_eq!(restored.channel("#contest").unwrap().topic, "field day");
        assert!(!restored.user("n0call").unwrap().is_local());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn repair_drops_unknown_members_and_rekeys() {
        let directory = Directory::new("kissgate", false);
        directory
            .restore(Snapshot {
                name: "old-name".into(),
                auto_join: true,
                users: vec![UserRecord {
                    nick: "N0CALL".into(),
                    callsign: "N0CALL".into(),
                    real_name: "Jane".into(),
                    last_seen: Some(1_700_000_000),
                }],
                channels: vec![ChannelRecord {
                    name: "#NET".into(),
                    topic: String::new(),
                    topic_who: String::new(),
                    topic_time: None,
                    users: vec!["n0call".into(), "ghost".into()],
                }],
            })
            .unwrap();

        let channel = directory.channel("#net").unwrap();
        assert_eq!(channel.members.iter().collect::<Vec<_>>(), vec!["n0call"]);
        assert_eq!(directory.members("#NET"), vec!["N0CALL"]);
        assert_eq!(directory.server_name(), "kissgate");
        assert!(!directory.auto_join());
        assert_eq!(
            directory.user("n0call").unwrap().last_seen,
            Some(from_unix(1_700_000_000))
        );
    }

    #[test]
    fn load_refuses_live_local_users() {
        let directory = Directory::new("kissgate", false);
        let (_bob, _) = local(&directory, "bob");

        let err = directory.restore(directory.snapshot()).unwrap_err();
        assert!(matches!(err, PersistError::LiveUsers(1)));
    }

    #[test]
    fn missing_file_means_empty_state() {
        let dir = unique_temp_dir("missing");
        let directory = Directory::new("kissgate", false);

        let loaded = directory.load(&dir.join("absent.json")).unwrap();

        assert_eq!(loaded, Loaded::Missing);
        assert_eq!(directory.user_count(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = unique_temp_dir("corrupt");
        let path = dir.join("state.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = Directory::new("kissgate", false).load(&path).unwrap_err();
        assert!(matches!(err, PersistError::Json { .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn snapshot_stores_member_nicks_only() {
        let json = serde_json::to_value(populated().snapshot()).unwrap();
        let net = &json["channels"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "#NET")
            .unwrap()["users"];
        assert_eq!(net, &serde_json::json!(["K9RAD", "N0CALL"]));
    }
}
