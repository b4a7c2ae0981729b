//! Informational replies: WHO, WHOIS, USERHOST, LIST, MOTD.

use crate::directory::{Directory, DirectoryState};
use crate::error::{ChatError, Result};
use crate::message::{is_channel, normalize};
use crate::reply;
use crate::user::{User, UserId};

impl Directory {
    /// WHO with a `*`, channel or nick mask.
    pub fn who(&self, id: UserId, mask: &str) {
        let state = self.lock();
        let Some(key) = state.key_of(id) else {
            return;
        };
        let me = state.nick_of(&key);

        if is_channel(mask) {
            if let Some(channel) = state.channels.get(&normalize(mask)) {
                for user in channel.members.iter().filter_map(|m| state.users.get(m)) {
                    state.who_reply(&key, &me, &channel.name, user);
                }
            }
        } else {
            let mut users: Vec<&User> = state
                .users
                .values()
                .filter(|user| {
                    mask == "*" || user.nick.eq_ignore_ascii_case(mask) || user.prefix() == mask
                })
                .collect();
            users.sort_by(|a, b| a.nick.cmp(&b.nick));
            for user in users {
                state.who_reply(&key, &me, "*", user);
            }
        }
        state.reply(&key, &[reply::RPL_ENDOFWHO, &me, mask, "End of /WHO list"]);
    }

    pub fn whois(&self, id: UserId, nick: &str) -> Result<()> {
        let state = self.lock();
        let Some(key) = state.key_of(id) else {
            return Ok(());
        };
        let target_key = normalize(nick);
        let Some(target) = state.users.get(&target_key) else {
            return Err(ChatError::NoSuchNick(nick.to_string()));
        };
        let me = state.nick_of(&key);

        state.reply(
            &key,
            &[reply::RPL_WHOISUSER, &me, &target.nick, &target.callsign, "*", "*", &target.real_name],
        );
        let channels: Vec<&str> = state
            .channels
            .values()
            .filter(|channel| channel.has_member(&target_key))
            .map(|channel| channel.name.as_str())
            .collect();
        if !channels.is_empty() {
            state.reply(&key, &[reply::RPL_WHOISCHANNELS, &me, &target.nick, &channels.join(" ")]);
        }
        state.reply(&key, &[reply::RPL_ENDOFWHOIS, &me, &target.nick, "End of /WHOIS list"]);
        Ok(())
    }

    /// USERHOST; unknown nicks are left out of the reply.
    pub fn userhost(&self, id: UserId, nicks: &[String]) {
        let state = self.lock();
        let Some(key) = state.key_of(id) else {
            return;
        };
        let me = state.nick_of(&key);
        let entries: Vec<String> = nicks
            .iter()
            .filter_map(|nick| state.users.get(&normalize(nick)))
            .map(|user| {
                let identity = user.identity().to_string();
                let host = identity.split_once('@').map_or("", |(_, host)| host);
                format!("{}=-{}@{host}", user.nick, user.callsign)
            })
            .collect();
        state.reply(&key, &[reply::RPL_USERHOST, &me, &entries.join(" ")]);
    }

    pub fn list(&self, id: UserId) {
        let state = self.lock();
        let Some(key) = state.key_of(id) else {
            return;
        };
        let me = state.nick_of(&key);
        state.reply(&key, &[reply::RPL_LISTSTART, &me, "Channel", "Users Name"]);
        for channel in state.channels.values() {
            let count = channel.members.len().to_string();
            state.reply(&key, &[reply::RPL_LIST, &me, &channel.name, &count, &channel.topic]);
        }
        state.reply(&key, &[reply::RPL_LISTEND, &me, "End of /LIST"]);
    }

    pub fn motd(&self, id: UserId) {
        let state = self.lock();
        if let Some(key) = state.key_of(id) {
            state.send_motd(&key);
        }
    }
}

impl DirectoryState {
    fn who_reply(&self, key: &str, me: &str, channel: &str, user: &User) {
        let trailing = format!("1 {}", user.real_name);
        self.reply(
            key,
            &[
                reply::RPL_WHOREPLY,
                me,
                channel,
                &user.callsign,
                "*",
                &self.name,
                &user.nick,
                user.status(),
                &trailing,
            ],
        );
    }
}
