use std::time::SystemTime;

use tracing::{debug, trace};

use crate::directory::DirectoryState;
use crate::message::{is_channel, normalize};

impl DirectoryState {
    /// Fan a message out from `sender_key` to its target.
    ///
    /// Local senders are echoed to the radio first. A channel target reaches
    /// every member except the sender (a PART reaches the sender too); a nick
    /// target reaches that user only if known.
    pub(crate) fn route(&mut self, sender_key: &str, command: &str, target: &str, text: &str) {
        let Some(sender) = self.users.get_mut(sender_key) else {
            return;
        };
        sender.last_seen = Some(SystemTime::now());
        let line = format!(":{} {command} {target} :{text}", sender.prefix());

        if sender.is_local() {
            if let Some(radio) = &self.radio {
                radio.transmit_line(&line);
            }
        }

        if is_channel(target) {
            let Some(channel) = self.channels.get(&normalize(target)) else {
                debug!(channel = target, "dropping message for unknown channel");
                return;
            };
            let echo = command == "PART";
            for member in &channel.members {
                if member == sender_key && !echo {
                    continue;
                }
                if let Some(user) = self.users.get(member) {
                    user.send_line(&line);
                }
            }
            trace!(channel = target, command, "routed to channel");
            return;
        }

        match self.users.get(&normalize(target)) {
            Some(user) => user.send_line(&line),
            None => debug!(nick = target, "dropping message for unknown nick"),
        }
    }
}
