use crate::error::{ChatError, Result};
use crate::message::{is_valid_nick, Message};

/// Default PART reason.
pub const DEFAULT_PART_REASON: &str = "leaving channel";
/// Default QUIT reason.
pub const DEFAULT_QUIT_REASON: &str = "Client disconnected.";

/// A client command with its parameters checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Cap,
    Nick(String),
    User { callsign: String, real_name: String },
    Join(Vec<String>),
    Part { channels: Vec<String>, reason: String },
    Privmsg { target: String, text: String },
    Notice { target: String, text: String },
    Topic { channel: String, text: Option<String> },
    Who(String),
    Whois(String),
    Userhost(Vec<String>),
    List,
    Mode(String),
    Motd,
    Ping(Option<String>),
    Pong,
    Quit(String),
}

/// Verbs accepted before registration completes.
pub fn allowed_unregistered(verb: &str) -> bool {
    matches!(verb, "NICK" | "USER" | "CAP")
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Command {
    pub fn from_message(message: &Message) -> Result<Self> {
        let verb = message.command.as_str();
        let param = |index: usize| message.param(index).map(str::to_string);
        let required = |index: usize| param(index).ok_or_else(|| ChatError::need_params(verb));

        let command = match verb {
            "CAP" => Self::Cap,
            "NICK" => {
                let nick = param(0)
                    .filter(|nick| !nick.is_empty())
                    .ok_or(ChatError::NoNicknameGiven)?;
                if !is_valid_nick(&nick) {
                    return Err(ChatError::ErroneousNickname(nick));
                }
                Self::Nick(nick)
            }
            "USER" => {
                if message.params.len() < 4 {
                    return Err(ChatError::need_params(verb));
                }
                Self::User {
                    callsign: required(0)?,
                    real_name: required(3)?,
                }
            }
            "JOIN" => Self::Join(split_list(&required(0)?)),
            "PART" => Self::Part {
                channels: split_list(&required(0)?),
                reason: param(1).unwrap_or_else(|| DEFAULT_PART_REASON.to_string()),
            },
            "PRIVMSG" | "NOTICE" => {
                let target = required(0)?;
                let text = required(1)?;
                if verb == "PRIVMSG" {
                    Self::Privmsg { target, text }
                } else {
                    Self::Notice { target, text }
                }
            }
            "TOPIC" => Self::Topic {
                channel: required(0)?,
                text: (message.params.len() > 1).then(|| message.params[1..].join(" ")),
            },
            "WHO" => Self::Who(param(0).unwrap_or_else(|| "*".to_string())),
            "WHOIS" => Self::Whois(
                message
                    .params
                    .last()
                    .cloned()
                    .ok_or(ChatError::NoNicknameGiven)?,
            ),
            "USERHOST" => {
                if message.params.is_empty() {
                    return Err(ChatError::need_params(verb));
                }
                Self::Userhost(message.params.clone())
            }
            "LIST" => Self::List,
            "MODE" => Self::Mode(
                param(1)
                    .or_else(|| param(0))
                    .ok_or_else(|| ChatError::need_params(verb))?,
            ),
            "MOTD" => Self::Motd,
            "PING" => Self::Ping(param(0)),
            "PONG" => Self::Pong,
            "QUIT" => Self::Quit(param(0).unwrap_or_else(|| DEFAULT_QUIT_REASON.to_string())),
            other => return Err(ChatError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}
