use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::channel::Channel;
use crate::error::{ChatError, Result};
use crate::message::{is_channel, is_valid_nick, normalize};
use crate::radio::RadioLink;
use crate::reply;
use crate::user::{User, UserId};

/// Registry of every user and channel.
///
/// All state sits behind one lock. Every mutation (and every fan-out of the
/// lines it produces) happens while holding it, so observers never see a
/// half-applied join, part, rename or removal. Lock order is directory first,
/// then a user's outbox or the radio writer; neither of those ever calls back
/// into the directory. Client outboxes from [`Outbox::new`] only enqueue, so a
/// client that stops reading never holds the lock.
///
/// [`Outbox::new`]: crate::user::Outbox::new
pub struct Directory {
    state: Mutex<DirectoryState>,
}

pub(crate) struct DirectoryState {
    pub(crate) name: String,
    pub(crate) auto_join: bool,
    pub(crate) motd: Option<String>,
    /// Normalized nick -> user.
    pub(crate) users: HashMap<String, User>,
    /// Normalized channel name -> channel.
    pub(crate) channels: BTreeMap<String, Channel>,
    pub(crate) radio: Option<Arc<dyn RadioLink>>,
}

impl Directory {
    pub fn new(name: impl Into<String>, auto_join: bool) -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                name: name.into(),
                auto_join,
                motd: None,
                users: HashMap::new(),
                channels: BTreeMap::new(),
                radio: None,
            }),
        }
    }

    /// Set the message of the day sent after registration and on MOTD.
    pub fn with_motd(self, motd: impl Into<String>) -> Self {
        self.lock().motd = Some(motd.into());
        self
    }

    /// Route locally-originated traffic onto `radio`.
    pub fn attach_radio(&self, radio: Arc<dyn RadioLink>) {
        self.lock().radio = Some(radio);
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn server_name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn auto_join(&self) -> bool {
        self.lock().auto_join
    }

    /// Whether `nick` could be claimed by a local user right now.
    ///
    /// Only another local user blocks a nick; a radio user holding it is
    /// shadowed when the claim completes.
    pub fn nick_available(&self, nick: &str) -> bool {
        !self
            .lock()
            .users
            .get(&normalize(nick))
            .is_some_and(User::is_local)
    }

    /// Insert a fully-registered local user and send the welcome sequence.
    pub fn register(&self, user: User) -> Result<()> {
        let mut state = self.lock();
        let key = normalize(&user.nick);
        state.claim(&key, &user.nick)?;

        info!(nick = %user.nick, callsign = %user.callsign, id = %user.id, "user registered");
        let prefix = user.prefix();
        let nick = user.nick.clone();
        state.users.insert(key.clone(), user);

        let name = state.name.clone();
        let welcome = format!("Welcome to the {name} radio gateway, {prefix}");
        let host = format!("Your host is {name}, running kissgate {}", env!("CARGO_PKG_VERSION"));
        state.reply(&key, &[reply::RPL_WELCOME, &nick, &welcome]);
        state.reply(&key, &[reply::RPL_YOURHOST, &nick, &host]);
        state.reply(&key, &[reply::RPL_CREATED, &nick, "This server bridges a KISS TNC"]);
        state.send_motd(&key);
        Ok(())
    }

    /// Rename a registered user, moving every membership to the new key.
    pub fn change_nick(&self, id: UserId, new_nick: &str) -> Result<()> {
        if new_nick.is_empty() {
            return Err(ChatError::NoNicknameGiven);
        }
        if !is_valid_nick(new_nick) {
            return Err(ChatError::ErroneousNickname(new_nick.to_string()));
        }
        let mut state = self.lock();
        let Some(old_key) = state.key_of(id) else {
            return Ok(());
        };
        let new_key = normalize(new_nick);
        if new_key != old_key {
            state.claim(&new_key, new_nick)?;
        }
        let Some(mut user) = state.users.remove(&old_key) else {
            return Ok(());
        };

        let line = format!(":{} NICK :{new_nick}", user.prefix());
        debug!(old = %user.nick, new = %new_nick, "nick changed");
        user.nick = new_nick.to_string();
        state.users.insert(new_key.clone(), user);
        for channel in state.channels.values_mut() {
            channel.rekey(&old_key, &new_key);
        }

        let mut recipients = state.neighbours(&new_key);
        recipients.insert(new_key);
        state.send_to(&recipients, &line);
        Ok(())
    }

    /// Join one channel, creating it if needed.
    pub fn join(&self, id: UserId, channel: &str) -> Result<()> {
        if !is_channel(channel) {
            return Err(ChatError::NoSuchChannel(channel.to_string()));
        }
        let mut state = self.lock();
        if let Some(key) = state.key_of(id) {
            state.join_key(&key, channel);
        }
        Ok(())
    }

    /// Leave a channel. The PART is routed like a message, including to the
    /// sender and over the radio, before the membership is removed.
    pub fn part(&self, id: UserId, channel: &str, reason: &str) -> Result<()> {
        let mut state = self.lock();
        let Some(key) = state.key_of(id) else {
            return Ok(());
        };
        let channel_key = normalize(channel);
        let Some(found) = state.channels.get(&channel_key) else {
            return Err(ChatError::NoSuchChannel(channel.to_string()));
        };
        if !found.has_member(&key) {
            return Err(ChatError::NotOnChannel(channel.to_string()));
        }

        state.route(&key, "PART", channel, reason);
        if let Some(found) = state.channels.get_mut(&channel_key) {
            found.members.remove(&key);
        }
        info!(nick = %key, channel, "user left channel");
        Ok(())
    }

    /// Reply with a channel's topic.
    pub fn topic(&self, id: UserId, channel: &str) -> Result<()> {
        let state = self.lock();
        let Some(key) = state.key_of(id) else {
            return Ok(());
        };
        state.send_topic(&key, channel)
    }

    /// Set a channel's topic and tell every member.
    pub fn set_topic(&self, id: UserId, channel: &str, text: &str) -> Result<()> {
        let mut state = self.lock();
        let Some(key) = state.key_of(id) else {
            return Ok(());
        };
        state.set_topic_key(&key, channel, text)
    }

    /// Deliver a PRIVMSG or NOTICE from a local user.
    pub fn route(&self, id: UserId, command: &str, target: &str, text: &str) {
        let mut state = self.lock();
        if let Some(key) = state.key_of(id) {
            state.route(&key, command, target, text);
        }
    }

    /// Remove a user after telling everyone who shares a channel with them.
    pub fn quit(&self, id: UserId, reason: &str) {
        let mut state = self.lock();
        let Some(key) = state.key_of(id) else {
            return;
        };
        if let Some(user) = state.users.get(&key) {
            let line = format!(":{} QUIT :{reason}", user.prefix());
            // Not transmitted; radio peers learn of departures by silence.
            let recipients = state.neighbours(&key);
            state.send_to(&recipients, &line);
        }
        if let Some(user) = state.remove_key(&key) {
            info!(nick = %user.nick, reason, "user quit");
        }
    }

    /// Remove a user without telling anyone.
    pub fn disconnect(&self, id: UserId) {
        let mut state = self.lock();
        if let Some(key) = state.key_of(id) {
            if let Some(user) = state.remove_key(&key) {
                info!(nick = %user.nick, "user disconnected");
            }
        }
    }

    /// Send a keepalive PING to every local user.
    pub fn ping_local_users(&self, token: &str) {
        let state = self.lock();
        let line = format!("PING :{token}");
        for user in state.users.values().filter(|user| user.is_local()) {
            user.send_line(&line);
        }
    }

    /// A copy of the user currently holding `nick`.
    pub fn user(&self, nick: &str) -> Option<User> {
        self.lock().users.get(&normalize(nick)).cloned()
    }

    /// A copy of a channel.
    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.lock().channels.get(&normalize(name)).cloned()
    }

    /// Display nicks of a channel's members.
    pub fn members(&self, channel: &str) -> Vec<String> {
        let state = self.lock();
        state
            .channels
            .get(&normalize(channel))
            .map(|found| state.member_nicks(found))
            .unwrap_or_default()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.lock()
            .channels
            .values()
            .map(|channel| channel.name.clone())
            .collect()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn local_user_count(&self) -> usize {
        self.lock().local_user_count()
    }
}

impl DirectoryState {
    pub(crate) fn key_of(&self, id: UserId) -> Option<String> {
        self.users
            .iter()
            .find(|(_, user)| user.id == id)
            .map(|(key, _)| key.clone())
    }

    pub(crate) fn local_user_count(&self) -> usize {
        self.users.values().filter(|user| user.is_local()).count()
    }

    /// Make `key` free for a local user: fails if another local user holds
    /// it, evicts a radio user otherwise.
    fn claim(&mut self, key: &str, nick: &str) -> Result<()> {
        match self.users.get(key) {
            Some(holder) if holder.is_local() => Err(ChatError::NickInUse(nick.to_string())),
            Some(_) => {
                self.remove_key(key);
                info!(nick, "local user shadows radio user");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Remove a user and every membership it holds.
    pub(crate) fn remove_key(&mut self, key: &str) -> Option<User> {
        let user = self.users.remove(key)?;
        for channel in self.channels.values_mut() {
            channel.members.remove(key);
        }
        Some(user)
    }

    /// Keys of everyone sharing at least one channel with `key`, excluding it.
    pub(crate) fn neighbours(&self, key: &str) -> BTreeSet<String> {
        self.channels
            .values()
            .filter(|channel| channel.has_member(key))
            .flat_map(|channel| channel.members.iter())
            .filter(|member| member.as_str() != key)
            .cloned()
            .collect()
    }

    pub(crate) fn send_to(&self, keys: &BTreeSet<String>, line: &str) {
        for key in keys {
            if let Some(user) = self.users.get(key) {
                user.send_line(line);
            }
        }
    }

    /// Send a `:server ...` reply to one user.
    pub(crate) fn reply(&self, key: &str, args: &[&str]) {
        if let Some(user) = self.users.get(key) {
            user.send_line(&reply::format(&self.name, args));
        }
    }

    pub(crate) fn nick_of(&self, key: &str) -> String {
        self.users
            .get(key)
            .map_or_else(|| "*".to_string(), |user| user.nick.clone())
    }

    pub(crate) fn member_nicks(&self, channel: &Channel) -> Vec<String> {
        channel
            .members
            .iter()
            .filter_map(|member| self.users.get(member))
            .map(|user| user.nick.clone())
            .collect()
    }

    /// Add `key` to a channel, creating it if needed. Joining a channel the
    /// user is already in changes nothing.
    pub(crate) fn join_key(&mut self, key: &str, name: &str) {
        let Some(user) = self.users.get(key) else {
            return;
        };
        let line = format!(":{} JOIN :{name}", user.prefix());
        let channel = self
            .channels
            .entry(normalize(name))
            .or_insert_with(|| Channel::new(name));
        if !channel.members.insert(key.to_string()) {
            return;
        }
        let channel = channel.clone();
        info!(nick = %key, channel = %channel.name, "user joined channel");

        self.send_to(&channel.members, &line);

        let nick = self.nick_of(key);
        if channel.topic.is_empty() {
            self.reply(key, &[reply::RPL_NOTOPIC, &nick, &channel.name, "No topic is set"]);
        } else {
            self.reply(key, &[reply::RPL_TOPIC, &nick, &channel.name, &channel.topic]);
        }
        let names = self.member_nicks(&channel).join(" ");
        self.reply(key, &[reply::RPL_NAMREPLY, &nick, "=", &channel.name, &names]);
        self.reply(key, &[reply::RPL_ENDOFNAMES, &nick, &channel.name, "End of /NAMES list"]);
    }

    pub(crate) fn send_topic(&self, key: &str, name: &str) -> Result<()> {
        let Some(channel) = self.channels.get(&normalize(name)) else {
            return Err(ChatError::NoSuchChannel(name.to_string()));
        };
        let nick = self.nick_of(key);
        if channel.topic.is_empty() {
            self.reply(key, &[reply::RPL_NOTOPIC, &nick, &channel.name, "No topic is set"]);
            return Ok(());
        }
        let when = channel
            .topic_time
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |elapsed| elapsed.as_secs())
            .to_string();
        self.reply(key, &[reply::RPL_TOPIC, &nick, &channel.name, &channel.topic]);
        self.reply(
            key,
            &[reply::RPL_TOPICWHOTIME, &nick, &channel.name, &channel.topic_who, &when],
        );
        Ok(())
    }

    /// Update a topic, broadcast it to the members, and echo it over the
    /// radio when the setter is local.
    pub(crate) fn set_topic_key(&mut self, key: &str, name: &str, text: &str) -> Result<()> {
        let Some(user) = self.users.get(key) else {
            return Ok(());
        };
        let setter = user.nick.clone();
        let prefix = user.prefix();
        let local = user.is_local();

        let Some(channel) = self.channels.get_mut(&normalize(name)) else {
            return Err(ChatError::NoSuchChannel(name.to_string()));
        };
        channel.set_topic(text, &setter, SystemTime::now());
        let line = format!(":{prefix} TOPIC {} :{text}", channel.name);
        let members = channel.members.clone();
        info!(channel = %channel.name, nick = %setter, "topic changed");

        self.send_to(&members, &line);
        if local {
            if let Some(radio) = &self.radio {
                radio.transmit_line(&line);
            }
        }
        Ok(())
    }

    pub(crate) fn send_motd(&self, key: &str) {
        let Some(motd) = &self.motd else {
            return;
        };
        let nick = self.nick_of(key);
        let start = format!("- {} Message of the Day -", self.name);
        self.reply(key, &[reply::RPL_MOTDSTART, &nick, &start]);
        for line in motd.lines() {
            self.reply(key, &[reply::RPL_MOTD, &nick, &format!("- {line}")]);
        }
        self.reply(key, &[reply::RPL_ENDOFMOTD, &nick, "End of /MOTD command."]);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::Directory;
    use crate::radio::testing::RecordingRadio;
    use crate::user::testing::SharedBuffer;
    use crate::user::{Outbox, User, UserId};

    pub fn directory(auto_join: bool) -> (Directory, Arc<RecordingRadio>) {
        let directory = Directory::new("kissgate", auto_join);
        let radio = Arc::new(RecordingRadio::default());
        directory.attach_radio(radio.clone());
        (directory, radio)
    }

    /// Register a local user and discard its welcome output.
    pub fn local(directory: &Directory, nick: &str) -> (UserId, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let user = User::local(nick, "N0CALL", "Test Operator", Outbox::inline(buffer.clone()));
        let id = user.id;
        directory.register(user).expect("nick should be free");
        buffer.take_lines();
        (id, buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{directory, local};
    use super::*;
    use crate::message::Identity;
    use crate::user::testing::{SharedBuffer, StalledSink};
    use crate::user::{Outbox, OUTBOX_CAPACITY};
    use std::sync::mpsc;
    use std::time::Duration;

    fn remote(directory: &Directory, nick: &str) {
        let user = User::remote(Identity {
            nick: nick.into(),
            callsign: "K9RAD".into(),
            real_name: "Radio_Op".into(),
        });
        let mut state = directory.lock();
        state.users.insert(normalize(nick), user);
    }

    #[test]
    fn register_sends_welcome_and_motd() {
        let directory = Directory::new("kissgate", true).with_motd("line one\nline two");
        let buffer = SharedBuffer::default();
        let user = User::local("Bob", "KD0XYZ", "Bob Smith", Outbox::inline(buffer.clone()));
        directory.register(user).unwrap();

        let lines = buffer.lines();
        assert!(lines[0].starts_with(":kissgate 001 Bob :Welcome"));
        assert!(lines[1].starts_with(":kissgate 002 Bob "));
        assert!(lines[2].starts_with(":kissgate 003 Bob "));
        assert_eq!(lines[3], ":kissgate 375 Bob :- kissgate Message of the Day -");
        assert_eq!(lines[4], ":kissgate 372 Bob :- line one");
        assert_eq!(lines[5], ":kissgate 372 Bob :- line two");
        assert_eq!(lines[6], ":kissgate 376 Bob :End of /MOTD command.");
        assert!(directory.user("bob").is_some());
    }

    #[test]
    fn second_local_claim_is_rejected() {
        let (directory, _radio) = directory(false);
        let (_bob, _) = local(&directory, "BOB");

        assert!(!directory.nick_available("bob"));
        let err = directory
            .register(User::local("bob", "N1", "Other", Outbox::discard()))
            .unwrap_err();
        assert_eq!(err, ChatError::NickInUse("bob".into()));

        let (alice, _) = local(&directory, "alice");
        let err = directory.change_nick(alice, "Bob").unwrap_err();
        assert_eq!(err, ChatError::NickInUse("Bob".into()));
    }

    #[test]
    fn radio_user_does_not_block_local_claim() {
        let (directory, _radio) = directory(false);
        remote(&directory, "BOB");
        {
            let mut state = directory.lock();
            let mut channel = Channel::new("#net");
            channel.members.insert("bob".into());
            state.channels.insert("#net".into(), channel);
        }

        assert!(directory.nick_available("bob"));
        let (id, _) = local(&directory, "BOB");

        let holder = directory.user("bob").unwrap();
        assert_eq!(holder.id, id);
        assert!(holder.is_local());
        assert!(directory.members("#net").is_empty());
    }

    #[test]
    fn change_nick_rekeys_memberships() {
        let (directory, _radio) = directory(false);
        let (bob, bob_out) = local(&directory, "bob");
        let (_alice, alice_out) = local(&directory, "alice");
        directory.join(bob, "#net").unwrap();
        directory.join(_alice, "#net").unwrap();
        bob_out.take_lines();
        alice_out.take_lines();

        directory.change_nick(bob, "Robert").unwrap();

        assert!(directory.user("bob").is_none());
        assert_eq!(directory.user("robert").unwrap().nick, "Robert");
        let channel = directory.channel("#net").unwrap();
        assert!(channel.has_member("robert"));
        assert!(!channel.has_member("bob"));
        assert_eq!(bob_out.lines(), vec![":bob!N0CALL@Test_Operator NICK :Robert"]);
        assert_eq!(alice_out.lines(), vec![":bob!N0CALL@Test_Operator NICK :Robert"]);
    }

    #[test]
    fn change_nick_case_only() {
        let (directory, _radio) = directory(false);
        let (bob, _) = local(&directory, "bob");
        directory.change_nick(bob, "BOB").unwrap();
        assert_eq!(directory.user("bob").unwrap().nick, "BOB");
    }

    #[test]
    fn change_nick_requires_a_nick() {
        let (directory, _radio) = directory(false);
        let (bob, _) = local(&directory, "bob");
        assert_eq!(directory.change_nick(bob, ""), Err(ChatError::NoNicknameGiven));
        assert_eq!(
            directory.change_nick(bob, "#bob"),
            Err(ChatError::ErroneousNickname("#bob".into()))
        );
        assert_eq!(directory.user("bob").unwrap().nick, "bob");
    }

    #[test]
    fn join_broadcasts_and_replies_to_joiner() {
        let (directory, _radio) = directory(false);
        let (alice, alice_out) = local(&directory, "alice");
        let (bob, bob_out) = local(&directory, "bob");
        directory.join(alice, "#net").unwrap();
        alice_out.take_lines();

        directory.join(bob, "#NET").unwrap();

        let join = ":bob!N0CALL@Test_Operator JOIN :#NET";
        assert_eq!(alice_out.lines(), vec![join]);
        assert_eq!(
            bob_out.lines(),
            vec![
                join.to_string(),
                ":kissgate 331 bob #net :No topic is set".to_string(),
                ":kissgate 353 bob = #net :alice bob".to_string(),
                ":kissgate 366 bob #net :End of /NAMES list".to_string(),
            ]
        );
    }

    #[test]
    fn join_is_idempotent() {
        let (directory, _radio) = directory(false);
        let (bob, bob_out) = local(&directory, "bob");
        directory.join(bob, "#net").unwrap();
        bob_out.take_lines();

        directory.join(bob, "#net").unwrap();
        assert!(bob_out.lines().is_empty());
        assert_eq!(directory.members("#net"), vec!["bob"]);
    }

    #[test]
    fn join_requires_channel_name() {
        let (directory, _radio) = directory(false);
        let (bob, _) = local(&directory, "bob");
        assert_eq!(
            directory.join(bob, "net"),
            Err(ChatError::NoSuchChannel("net".into()))
        );
    }

    #[test]
    fn part_reaches_sender_and_radio() {
        let (directory, radio) = directory(false);
        let (alice, alice_out) = local(&directory, "alice");
        let (bob, bob_out) = local(&directory, "bob");
        directory.join(alice, "#net").unwrap();
        directory.join(bob, "#net").unwrap();
        alice_out.take_lines();
        bob_out.take_lines();

        directory.part(bob, "#net", "73").unwrap();

        let part = ":bob!N0CALL@Test_Operator PART #net :73";
        assert_eq!(bob_out.lines(), vec![part]);
        assert_eq!(alice_out.lines(), vec![part]);
        assert_eq!(radio.lines(), vec![part]);
        assert_eq!(directory.members("#net"), vec!["alice"]);
    }

    #[test]
    fn part_errors() {
        let (directory, _radio) = directory(false);
        let (alice, _) = local(&directory, "alice");
        let (bob, _) = local(&directory, "bob");
        directory.join(alice, "#net").unwrap();

        assert_eq!(
            directory.part(bob, "#nowhere", "bye"),
            Err(ChatError::NoSuchChannel("#nowhere".into()))
        );
        assert_eq!(
            directory.part(bob, "#net", "bye"),
            Err(ChatError::NotOnChannel("#net".into()))
        );
    }

    #[test]
    fn set_topic_broadcasts_and_transmits() {
        let (directory, radio) = directory(false);
        let (alice, alice_out) = local(&directory, "alice");
        let (bob, bob_out) = local(&directory, "bob");
        directory.join(alice, "#net").unwrap();
        directory.join(bob, "#net").unwrap();
        alice_out.take_lines();
        bob_out.take_lines();

        directory.set_topic(bob, "#net", "Net control tonight").unwrap();

        let topic = ":bob!N0CALL@Test_Operator TOPIC #net :Net control tonight";
        assert_eq!(alice_out.lines(), vec![topic]);
        assert_eq!(bob_out.take_lines(), vec![topic]);
        assert_eq!(radio.lines(), vec![topic]);

        directory.topic(bob, "#net").unwrap();
        let lines = bob_out.lines();
        assert_eq!(lines[0], ":kissgate 332 bob #net :Net control tonight");
        assert!(lines[1].starts_with(":kissgate 333 bob #net bob :"));

        assert_eq!(
            directory.set_topic(bob, "#missing", "x"),
            Err(ChatError::NoSuchChannel("#missing".into()))
        );
    }

    #[test]
    fn topic_query_without_topic() {
        let (directory, _radio) = directory(false);
        let (bob, bob_out) = local(&directory, "bob");
        directory.join(bob, "#net").unwrap();
        bob_out.take_lines();

        directory.topic(bob, "#net").unwrap();
        assert_eq!(bob_out.lines(), vec![":kissgate 331 bob #net :No topic is set"]);
    }

    #[test]
    fn quit_notifies_channel_peers_once() {
        let (directory, _radio) = directory(false);
        let (alice, alice_out) = local(&directory, "alice");
        let (bob, bob_out) = local(&directory, "bob");
        for channel in ["#one", "#two"] {
            directory.join(alice, channel).unwrap();
            directory.join(bob, channel).unwrap();
        }
        alice_out.take_lines();
        bob_out.take_lines();

        directory.quit(bob, "gone fishing");

        assert_eq!(alice_out.lines(), vec![":bob!N0CALL@Test_Operator QUIT :gone fishing"]);
        assert!(bob_out.lines().is_empty());
        assert!(directory.user("bob").is_none());
        assert_eq!(directory.members("#one"), vec!["alice"]);
        assert_eq!(directory.members("#two"), vec!["alice"]);
    }

    #[test]
    fn disconnect_is_silent() {
        let (directory, _radio) = directory(false);
        let (alice, alice_out) = local(&directory, "alice");
        let (bob, _) = local(&directory, "bob");
        directory.join(alice, "#net").unwrap();
        directory.join(bob, "#net").unwrap();
        alice_out.take_lines();

        directory.disconnect(bob);

        assert!(alice_out.lines().is_empty());
        assert!(directory.user("bob").is_none());
        assert_eq!(directory.members("#net"), vec!["alice"]);
        assert_eq!(directory.channel_names(), vec!["#net"]);
    }

    #[test]
    fn empty_channels_are_retained() {
        let (directory, _radio) = directory(false);
        let (bob, _) = local(&directory, "bob");
        directory.join(bob, "#net").unwrap();
        directory.set_topic(bob, "#net", "history").unwrap();
        directory.part(bob, "#net", "bye").unwrap();

        let channel = directory.channel("#net").unwrap();
        assert!(channel.members.is_empty());
        assert_eq!(channel.topic, "history");
    }

    #[test]
    fn keepalive_pings_only_local_users() {
        let (directory, _radio) = directory(false);
        let (_bob, bob_out) = local(&directory, "bob");
        remote(&directory, "K9RAD");

        directory.ping_local_users("LAG1700000000");

        assert_eq!(bob_out.lines(), vec!["PING :LAG1700000000"]);
    }

    #[test]
    fn concurrent_joins_keep_membership_consistent() {
        let (directory, _radio) = directory(false);
        let directory = Arc::new(directory);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let directory = Arc::clone(&directory);
                std::thread::spawn(move || {
                    let (id, _) = local(&directory, &format!("op{i}"));
                    directory.join(id, "#net").unwrap();
                    if i % 2 == 0 {
                        directory.quit(id, "done");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(directory.members("#net"), vec!["op1", "op3", "op5", "op7"]);
        assert_eq!(directory.user_count(), 4);
    }

    #[test]
    fn stalled_client_does_not_hold_the_directory() {
        let directory = Arc::new(Directory::new("kissgate", true).with_motd("hello"));
        let (sink, release) = StalledSink::new();
        let stalled = User::local("slow", "N0SLW", "Slow Reader", Outbox::new(sink));
        let stalled_id = stalled.id;
        directory.register(stalled).unwrap();
        directory.join(stalled_id, "#net").unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let worker = Arc::clone(&directory);
        std::thread::spawn(move || {
            let (bob, _) = local(&worker, "bob");
            for _ in 0..OUTBOX_CAPACITY * 2 {
                worker.route(bob, "PRIVMSG", "slow", "are you there");
            }
            worker.join(bob, "#net").unwrap();
            let _ = done_tx.send(worker.user_count());
        });

        let count = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("directory should stay responsive");
        assert_eq!(count, 2);
        assert_eq!(directory.members("#net"), vec!["bob", "slow"]);
        drop(release);
    }
}
