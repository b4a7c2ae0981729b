use std::path::PathBuf;

use crate::reply;

/// Command-level errors. Each maps to a numeric reply and leaves the
/// connection open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("{command}: not registered")]
    NotRegistered { command: String },

    #[error("nickname {0} is already in use")]
    NickInUse(String),

    #[error("no nickname given")]
    NoNicknameGiven,

    #[error("erroneous nickname {0}")]
    ErroneousNickname(String),

    #[error("no such nick {0}")]
    NoSuchNick(String),

    #[error("no such channel {0}")]
    NoSuchChannel(String),

    #[error("not on channel {0}")]
    NotOnChannel(String),

    #[error("{command}: not enough parameters")]
    NeedMoreParams { command: String },

    #[error("already registered")]
    AlreadyRegistered,

    #[error("unsupported mode {0}")]
    UnknownMode(String),

    #[error("unknown command {0}")]
    UnknownCommand(String),
}

impl ChatError {
    pub fn need_params(command: &str) -> Self {
        Self::NeedMoreParams {
            command: command.to_string(),
        }
    }

    /// The numeric reply code for this error.
    pub fn numeric(&self) -> &'static str {
        match self {
            Self::NotRegistered { .. } => reply::ERR_NOTREGISTERED,
            Self::NickInUse(_) => reply::ERR_NICKNAMEINUSE,
            Self::NoNicknameGiven => reply::ERR_NONICKNAMEGIVEN,
            Self::ErroneousNickname(_) => reply::ERR_ERRONEUSNICKNAME,
            Self::NoSuchNick(_) => reply::ERR_NOSUCHNICK,
            Self::NoSuchChannel(_) => reply::ERR_NOSUCHCHANNEL,
            Self::NotOnChannel(_) => reply::ERR_NOTONCHANNEL,
            Self::NeedMoreParams { .. } => reply::ERR_NEEDMOREPARAMS,
            Self::AlreadyRegistered => reply::ERR_ALREADYREGISTERED,
            Self::UnknownMode(_) => reply::ERR_UNKNOWNMODE,
            Self::UnknownCommand(_) => reply::ERR_UNKNOWNCOMMAND,
        }
    }

    /// Render the numeric reply line sent back to `nick`.
    pub fn to_reply(&self, server: &str, nick: &str) -> String {
        let code = self.numeric();
        match self {
            Self::NotRegistered { command } => {
                reply::format(server, &[code, "*", command, "You have not registered"])
            }
            Self::NickInUse(wanted) => {
                reply::format(server, &[code, nick, wanted, "Nickname is already in use"])
            }
            Self::NoNicknameGiven => reply::format(server, &[code, nick, "No nickname given"]),
            Self::ErroneousNickname(wanted) => {
                reply::format(server, &[code, nick, wanted, "Erroneous nickname"])
            }
            Self::NoSuchNick(target) => {
                reply::format(server, &[code, nick, target, "No such nick/channel"])
            }
            Self::NoSuchChannel(channel) => {
                reply::format(server, &[code, nick, channel, "No such channel"])
            }
            Self::NotOnChannel(channel) => {
                reply::format(server, &[code, nick, channel, "You're not on that channel"])
            }
            Self::NeedMoreParams { command } => {
                reply::format(server, &[code, nick, command, "Not enough parameters"])
            }
            Self::AlreadyRegistered => reply::format(server, &[code, nick, "You may not reregister"]),
            Self::UnknownMode(mode) => {
                reply::format(server, &[code, nick, mode, "Server does not support modes"])
            }
            Self::UnknownCommand(command) => {
                reply::format(server, &[code, nick, command, "Unknown command"])
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors saving or restoring directory state.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// State can only be restored before any local user connects.
    #[error("cannot load state with {0} connected local user(s)")]
    LiveUsers(usize),

    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is not valid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
