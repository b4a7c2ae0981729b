use std::collections::BTreeSet;
use std::time::SystemTime;

/// A chat channel. Members are normalized nicks that resolve through the
/// directory's user map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub topic: String,
    pub topic_who: String,
    pub topic_time: Option<SystemTime>,
    pub members: BTreeSet<String>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            topic: String::new(),
            topic_who: String::new(),
            topic_time: None,
            members: BTreeSet::new(),
        }
    }

    pub fn has_member(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    pub fn set_topic(&mut self, text: &str, who: &str, when: SystemTime) {
        self.topic = text.to_string();
        self.topic_who = who.to_string();
        self.topic_time = Some(when);
    }

    /// Move a membership from one key to another. Returns whether the old
    /// key was a member.
    pub fn rekey(&mut self, old: &str, new: &str) -> bool {
        if self.members.remove(old) {
            self.members.insert(new.to_string());
            true
        } else {
            false
        }
    }
}
