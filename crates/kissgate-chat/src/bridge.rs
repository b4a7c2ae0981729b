use std::sync::Arc;

use kissgate_frame::{Frame, DATA};
use tracing::{debug, info};

use crate::directory::Directory;
use crate::message::{is_channel, normalize, Identity, Message};
use crate::radio::FrameSource;
use crate::user::User;

/// What happened to one inbound radio line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bridged {
    Delivered,
    Dropped,
}

/// Feeds radio traffic into the directory.
pub struct Bridge {
    directory: Arc<Directory>,
}

impl Bridge {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }

    /// Bridge frames until the link closes. Returns the number delivered.
    ///
    /// Returning means the radio link is gone; the caller decides whether to
    /// reconnect or shut down.
    pub fn run<S: FrameSource + ?Sized>(&self, source: &S) -> u64 {
        let mut delivered = 0u64;
        while let Some(frame) = source.next_frame() {
            if self.handle_frame(&frame) == Bridged::Delivered {
                delivered += 1;
            }
        }
        info!(delivered, "radio link closed, bridge stopping");
        delivered
    }

    pub fn handle_frame(&self, frame: &Frame) -> Bridged {
        if frame.command != DATA {
            debug!(port = frame.port, command = frame.command, "ignoring non-data frame");
            return Bridged::Dropped;
        }
        let text = String::from_utf8_lossy(frame.unpadded()).replace(['\r', '\n'], " ");
        self.handle_line(text.trim())
    }

    /// Interpret one `:nick!callsign@Name COMMAND target :text` line.
    pub fn handle_line(&self, line: &str) -> Bridged {
        let Some(message) = Message::parse(line) else {
            return Bridged::Dropped;
        };
        if !matches!(message.command.as_str(), "PRIVMSG" | "NOTICE" | "TOPIC") {
            debug!(command = %message.command, "ignoring radio command");
            return Bridged::Dropped;
        }
        let Some(identity) = message.prefix.as_deref().and_then(Identity::parse) else {
            debug!(prefix = ?message.prefix, "dropping radio line with malformed identity");
            return Bridged::Dropped;
        };
        let (Some(target), Some(text)) = (message.param(0), message.param(1)) else {
            debug!(line, "dropping radio line without target and text");
            return Bridged::Dropped;
        };
        if message.command == "TOPIC" && !is_channel(target) {
            return Bridged::Dropped;
        }

        let mut state = self.directory.lock();
        let key = normalize(&identity.nick);
        match state.users.get(&key) {
            Some(user) if user.is_local() => {
                debug!(nick = %identity.nick, "radio nick is held by a local user, dropping");
                return Bridged::Dropped;
            }
            Some(_) => {}
            None => {
                info!(nick = %identity.nick, callsign = %identity.callsign, "new radio station");
                state.users.insert(key.clone(), User::remote(identity));
            }
        }

        if is_channel(target) {
            state.join_key(&key, target);
            if state.auto_join {
                let locals: Vec<String> = state
                    .users
                    .iter()
                    .filter(|(_, user)| user.is_local())
                    .map(|(local, _)| local.clone())
                    .collect();
                for local in locals {
                    state.join_key(&local, target);
                }
            }
        }

        if message.command == "TOPIC" {
            // The channel was just created above, so this cannot miss.
            let _ = state.set_topic_key(&key, target, text);
        } else {
            state.route(&key, &message.command, target, text);
        }
        Bridged::Delivered
    }
}

#[cfg(test)]
mod tests {
    use kissgate_frame::{Frame, DATA};

    use super::*;
    use crate::directory::testing::{directory, local};
    use crate::radio::testing::ScriptedSource;

    fn bridge(directory: Directory) -> (Arc<Directory>, Bridge) {
        let directory = Arc::new(directory);
        (Arc::clone(&directory), Bridge::new(directory))
    }

    #[test]
    fn auto_join_pulls_local_users_into_radio_channel() {
        let (directory, radio) = directory(true);
        let (_alice, alice_out) = local(&directory, "alice");
        let (_bob, bob_out) = local(&directory, "bob");
        let (directory, bridge) = bridge(directory);

        let outcome = bridge.handle_line(":N0CALL!N0CALL@Jane_Doe PRIVMSG #NET :check in");

        assert_eq!(outcome, Bridged::Delivered);
        for out in [&alice_out, &bob_out] {
            let lines = out.lines();
            assert!(lines.iter().any(|l| l.ends_with("JOIN :#NET") && l.contains("Test_Operator")));
            assert_eq!(
                lines.last().unwrap(),
                ":N0CALL!N0CALL@Jane_Doe PRIVMSG #NET :check in"
            );
        }
        assert_eq!(directory.members("#net"), vec!["alice", "bob", "N0CALL"]);
        assert!(!directory.user("n0call").unwrap().is_local());
        assert!(radio.lines().is_empty());
    }

    #[test]
    fn without_auto_join_only_the_station_joins() {
        let (directory, _radio) = directory(false);
        let (_alice, alice_out) = local(&directory, "alice");
        let (directory, bridge) = bridge(directory);

        bridge.handle_line(":N0CALL!N0CALL@Jane NOTICE #NET :qrv");

        assert!(alice_out.lines().is_empty());
        assert_eq!(directory.members("#NET"), vec!["N0CALL"]);
    }

    #[test]
    fn direct_messages_reach_local_nick() {
        let (directory, _radio) = directory(true);
        let (_alice, alice_out) = local(&directory, "alice");
        let (directory, bridge) = bridge(directory);

        bridge.handle_line(":N0CALL!N0CALL@Jane PRIVMSG alice :you there?");

        assert_eq!(alice_out.lines(), vec![":N0CALL!N0CALL@Jane PRIVMSG alice :you there?"]);
        assert!(directory.channel_names().is_empty());
    }

    #[test]
    fn rejects_unsupported_commands_and_bad_identities() {
        let (directory, _radio) = directory(true);
        let (directory, bridge) = bridge(directory);

        assert_eq!(bridge.handle_line(":a!b@c JOIN #NET"), Bridged::Dropped);
        assert_eq!(bridge.handle_line(":a!b@c QUIT :bye"), Bridged::Dropped);
        assert_eq!(bridge.handle_line(":junk PRIVMSG #NET :hi"), Bridged::Dropped);
        assert_eq!(bridge.handle_line("PRIVMSG #NET :no prefix"), Bridged::Dropped);
        assert_eq!(bridge.handle_line(":a!b@c PRIVMSG #NET"), Bridged::Dropped);
        assert_eq!(bridge.handle_line(""), Bridged::Dropped);
        assert_eq!(directory.user_count(), 0);
    }

    #[test]
    fn radio_topic_updates_channel_without_echo() {
        let (directory, radio) = directory(true);
        let (_alice, alice_out) = local(&directory, "alice");
        let (directory, bridge) = bridge(directory);

        bridge.handle_line(":N0CALL!N0CALL@Jane TOPIC #NET :Sunday net");

        assert_eq!(directory.channel("#net").unwrap().topic, "Sunday net");
        assert_eq!(directory.channel("#net").unwrap().topic_who, "N0CALL");
        assert_eq!(
            alice_out.lines().last().unwrap(),
            ":N0CALL!N0CALL@Jane TOPIC #NET :Sunday net"
        );
        assert!(radio.lines().is_empty());
    }

    #[test]
    fn known_station_is_reused() {
        let (directory, _radio) = directory(false);
        let (directory, bridge) = bridge(directory);

        bridge.handle_line(":N0CALL!N0CALL@Jane PRIVMSG #A :one");
        let first = directory.user("n0call").unwrap().id;
        bridge.handle_line(":n0call!N0CALL@Jane PRIVMSG #B :two");

        assert_eq!(directory.user_count(), 1);
        assert_eq!(directory.user("N0CALL").unwrap().id, first);
        assert_eq!(directory.members("#B"), vec!["N0CALL"]);
    }

    #[test]
    fn station_cannot_impersonate_local_user() {
        let (directory, radio) = directory(false);
        let (alice, _) = local(&directory, "alice");
        let (directory, bridge) = bridge(directory);

        assert_eq!(
            bridge.handle_line(":alice!FAKE@Spoof PRIVMSG #net :hi"),
            Bridged::Dropped
        );
        assert_eq!(directory.user("alice").unwrap().id, alice);
        assert!(radio.lines().is_empty());
    }

    #[test]
    fn run_drains_frames_until_link_closes() {
        let (directory, _radio) = directory(false);
        let (directory, bridge) = bridge(directory);
        let source = ScriptedSource::new(vec![
            Frame::new(0, DATA, ":N0CALL!N0CALL@Jane PRIVMSG #NET :one\n"),
            Frame::new(0, 1, ":N0CALL!N0CALL@Jane PRIVMSG #NET :txdelay"),
            Frame::new(0, DATA, ":K9RAD!K9RAD@Rad NOTICE #NET :two\0\0\0\0"),
            Frame::new(0, DATA, "garbage"),
        ]);

        assert_eq!(bridge.run(&source), 2);
        assert_eq!(directory.members("#net"), vec!["K9RAD", "N0CALL"]);
    }
}
