//! Numeric reply codes and line formatting.

pub const RPL_WELCOME: &str = "001";
pub const RPL_YOURHOST: &str = "002";
pub const RPL_CREATED: &str = "003";
pub const RPL_USERHOST: &str = "302";
pub const RPL_WHOISUSER: &str = "311";
pub const RPL_ENDOFWHO: &str = "315";
pub const RPL_ENDOFWHOIS: &str = "318";
pub const RPL_WHOISCHANNELS: &str = "319";
pub const RPL_LISTSTART: &str = "321";
pub const RPL_LIST: &str = "322";
pub const RPL_LISTEND: &str = "323";
pub const RPL_NOTOPIC: &str = "331";
pub const RPL_TOPIC: &str = "332";
pub const RPL_TOPICWHOTIME: &str = "333";
pub const RPL_WHOREPLY: &str = "352";
pub const RPL_NAMREPLY: &str = "353";
pub const RPL_ENDOFNAMES: &str = "366";
pub const RPL_MOTD: &str = "372";
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_ENDOFMOTD: &str = "376";

pub const ERR_NOSUCHNICK: &str = "401";
pub const ERR_NOSUCHCHANNEL: &str = "403";
pub const ERR_UNKNOWNCOMMAND: &str = "421";
pub const ERR_NONICKNAMEGIVEN: &str = "431";
pub const ERR_ERRONEUSNICKNAME: &str = "432";
pub const ERR_NICKNAMEINUSE: &str = "433";
pub const ERR_NOTONCHANNEL: &str = "442";
pub const ERR_NOTREGISTERED: &str = "451";
pub const ERR_NEEDMOREPARAMS: &str = "461";
pub const ERR_ALREADYREGISTERED: &str = "462";
pub const ERR_UNKNOWNMODE: &str = "472";

/// `:server arg arg :last`. A single argument is sent without the colon.
pub fn format(server: &str, args: &[&str]) -> String {
    let mut line = format!(":{server}");
    let last = args.len().saturating_sub(1);
    for (i, arg) in args.iter().enumerate() {
        line.push(' ');
        if i == last && i > 0 {
            line.push(':');
        }
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_argument_gets_colon() {
        assert_eq!(
            format("kissgate", &[RPL_WELCOME, "bob", "Welcome aboard"]),
            ":kissgate 001 bob :Welcome aboard"
        );
    }

    #[test]
    fn single_argument_is_bare() {
        assert_eq!(format("kissgate", &["PONG"]), ":kissgate PONG");
    }
}
