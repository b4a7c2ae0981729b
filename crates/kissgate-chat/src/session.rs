use std::io::{BufRead, ErrorKind, Read};
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::command::{allowed_unregistered, Command};
use crate::directory::Directory;
use crate::error::{ChatError, Result};
use crate::message::Message;
use crate::reply;
use crate::user::{Outbox, User, UserId};

/// Longest line read from a client before it is cut.
pub const MAX_LINE_LEN: u64 = 8 * 1024;

/// Whether a connection keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Registration progress for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Unregistered,
    /// Exactly one of nick / identity is set.
    Partial,
    Registered(UserId),
}

/// One local client connection.
///
/// Collects NICK and USER in either order; once both are known the user is
/// inserted into the directory and every other command becomes available.
pub struct Session {
    directory: Arc<Directory>,
    outbox: Outbox,
    peer: String,
    nick: Option<String>,
    identity: Option<(String, String)>,
    user: Option<UserId>,
}

impl Session {
    pub fn new(directory: Arc<Directory>, outbox: Outbox, peer: impl Into<String>) -> Self {
        Self {
            directory,
            outbox,
            peer: peer.into(),
            nick: None,
            identity: None,
            user: None,
        }
    }

    pub fn registration(&self) -> Registration {
        match (self.user, &self.nick, &self.identity) {
            (Some(id), _, _) => Registration::Registered(id),
            (None, None, None) => Registration::Unregistered,
            _ => Registration::Partial,
        }
    }

    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    /// Serve lines until the client quits or its stream ends.
    ///
    /// A stream that ends without QUIT removes the user silently.
    pub fn run<R: BufRead>(mut self, mut reader: R) {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.by_ref().take(MAX_LINE_LEN).read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if self.handle_line(&line) == Flow::Quit {
                        debug!(peer = %self.peer, "client quit");
                        return;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(peer = %self.peer, error = %err, "client read failed");
                    break;
                }
            }
        }
        info!(peer = %self.peer, nick = ?self.nick, "client connection closed");
        if let Some(id) = self.user {
            self.directory.disconnect(id);
        }
    }

    /// Handle one raw line; errors are answered with their numeric reply.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        let Some(message) = Message::parse(line) else {
            return Flow::Continue;
        };
        trace!(peer = %self.peer, command = %message.command, "client command");

        match self.dispatch(&message) {
            Ok(flow) => flow,
            Err(err) => {
                self.send_error(&err);
                Flow::Continue
            }
        }
    }

    fn dispatch(&mut self, message: &Message) -> Result<Flow> {
        if self.user.is_none() && !allowed_unregistered(&message.command) {
            return Err(ChatError::NotRegistered {
                command: message.command.clone(),
            });
        }
        let command = Command::from_message(message)?;
        self.execute(command)
    }

    fn send_error(&self, err: &ChatError) {
        let server = self.directory.server_name();
        let nick = self.nick.as_deref().unwrap_or("*");
        self.outbox.send_line(&err.to_reply(&server, nick));
    }

    fn registered(&self) -> Result<UserId> {
        self.user.ok_or_else(|| ChatError::NotRegistered {
            command: String::new(),
        })
    }

    fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Cap => {
                let server = self.directory.server_name();
                self.outbox
                    .send_line(&reply::format(&server, &["CAP", "*", "LS", ""]));
            }
            Command::Nick(nick) => self.set_nick(nick)?,
            Command::User {
                callsign,
                real_name,
            } => {
                if self.identity.is_some() {
                    return Err(ChatError::AlreadyRegistered);
                }
                self.identity = Some((callsign, real_name));
                self.try_register()?;
            }
            Command::Join(channels) => {
                let id = self.registered()?;
                for channel in channels {
                    if let Err(err) = self.directory.join(id, &channel) {
                        self.send_error(&err);
                    }
                }
            }
            Command::Part { channels, reason } => {
                let id = self.registered()?;
                for channel in channels {
                    if let Err(err) = self.directory.part(id, &channel, &reason) {
                        self.send_error(&err);
                    }
                }
            }
            Command::Privmsg { target, text } => {
                self.directory
                    .route(self.registered()?, "PRIVMSG", &target, &text);
            }
            Command::Notice { target, text } => {
                self.directory
                    .route(self.registered()?, "NOTICE", &target, &text);
            }
            Command::Topic { channel, text } => {
                let id = self.registered()?;
                match text {
                    Some(text) => self.directory.set_topic(id, &channel, &text)?,
                    None => self.directory.topic(id, &channel)?,
                }
            }
            Command::Who(mask) => self.directory.who(self.registered()?, &mask),
            Command::Whois(nick) => self.directory.whois(self.registered()?, &nick)?,
            Command::Userhost(nicks) => self.directory.userhost(self.registered()?, &nicks),
            Command::List => self.directory.list(self.registered()?),
            Command::Mode(mode) => return Err(ChatError::UnknownMode(mode)),
            Command::Motd => self.directory.motd(self.registered()?),
            Command::Ping(token) => {
                let server = self.directory.server_name();
                let line = match token {
                    Some(token) => reply::format(&server, &["PONG", &server, &token]),
                    None => reply::format(&server, &["PONG", &server]),
                };
                self.outbox.send_line(&line);
            }
            Command::Pong => {}
            Command::Quit(reason) => {
                self.directory.quit(self.registered()?, &reason);
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    fn set_nick(&mut self, nick: String) -> Result<()> {
        if let Some(id) = self.user {
            self.directory.change_nick(id, &nick)?;
            self.nick = Some(nick);
            return Ok(());
        }

        if !self.directory.nick_available(&nick) {
            return Err(ChatError::NickInUse(nick));
        }
        let old = self.nick.replace(nick.clone()).unwrap_or_else(|| nick.clone());
        self.outbox.send_line(&format!(":{old} NICK :{nick}"));
        self.try_register()
    }

    fn try_register(&mut self) -> Result<()> {
        let (Some(nick), Some((callsign, real_name))) = (&self.nick, &self.identity) else {
            return Ok(());
        };
        let user = User::local(nick, callsign, real_name, self.outbox.clone());
        let id = user.id;
        match self.directory.register(user) {
            Ok(()) => {
                self.user = Some(id);
                Ok(())
            }
            Err(err) => {
                self.nick = None;
                Err(err)
            }
        }
    }
}
