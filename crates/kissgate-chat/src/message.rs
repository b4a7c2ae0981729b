use std::fmt;

/// One parsed protocol line: `[:prefix] COMMAND params... [:trailing]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    /// Uppercased verb.
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Parse a line. Returns `None` for blank lines or a bare prefix.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_matches(|c| c == '\r' || c == '\n').trim_start();

        let prefix = match rest.strip_prefix(':') {
            Some(tail) => {
                let (prefix, tail) = tail.split_once(' ').unwrap_or((tail, ""));
                rest = tail.trim_start();
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = tail;
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// A station identity, `nick!callsign@Real_Name`.
///
/// The host part carries the operator's display name since radio stations
/// have no meaningful host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub nick: String,
    pub callsign: String,
    pub real_name: String,
}

impl Identity {
    /// Parse `nick!callsign@Real_Name`. The delimiters must appear once
    /// each, in that order, around three non-empty fields.
    pub fn parse(id: &str) -> Option<Self> {
        let (nick, rest) = id.split_once('!')?;
        let (callsign, real_name) = rest.split_once('@')?;
        let fields = [nick, callsign, real_name];
        if fields
            .iter()
            .any(|field| field.is_empty() || field.contains(['!', '@']))
        {
            return None;
        }
        Some(Self {
            nick: nick.to_string(),
            callsign: callsign.to_string(),
            real_name: real_name.to_string(),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}@", self.nick, self.callsign)?;
        let mut words = self.real_name.split_whitespace();
        if let Some(first) = words.next() {
            f.write_str(first)?;
            for word in words {
                write!(f, "_{word}")?;
            }
        }
        Ok(())
    }
}

/// Channel names start with `#` or `&`.
pub fn is_channel(target: &str) -> bool {
    target.starts_with('#') || target.starts_with('&')
}

/// Whether `nick` can travel inside an identity and be told apart from a
/// channel name.
pub fn is_valid_nick(nick: &str) -> bool {
    !nick.is_empty()
        && !is_channel(nick)
        && !nick.starts_with(':')
        && !nick.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '!' | '@' | ',' | '*' | '?')
        })
}

/// The one normalization rule for directory keys.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}
