//! Wire codec for IRC lines.
//!
//! Parses raw server lines into [`ParsedMessage`] values and formats outgoing
//! commands into CR-LF terminated lines. Parsing never fails: a truncated or
//! malformed line simply yields a message with fewer fields populated, and
//! handlers fall back to [`ParsedMessage::last_param`].

use std::fmt;

/// Numeric replies the engine reacts to.
pub mod numeric {
    pub const RPL_MYINFO: &str = "004";
    pub const RPL_ISON: &str = "303";
    pub const RPL_LISTSTART: &str = "321";
    pub const RPL_LIST: &str = "322";
    pub const RPL_LISTEND: &str = "323";
    pub const RPL_NAMREPLY: &str = "353";
    pub const RPL_ENDOFNAMES: &str = "366";
    pub const ERR_NICKNAMEINUSE: &str = "433";
}

/// A single parsed protocol line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Origin of the message (`nick!user@host` or a server name), without
    /// the leading colon.
    pub prefix: Option<String>,
    /// Command word or three-digit numeric reply. Empty only for blank input.
    pub command: String,
    /// Middle parameters, in order.
    pub params: Vec<String>,
    /// Final parameter introduced by a colon; may contain spaces or be empty.
    pub trailing: Option<String>,
}

impl ParsedMessage {
    /// Middle parameter at `index`, if the line carried that many.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Nickname part of the prefix (text before `!`).
    pub fn origin_nick(&self) -> Option<&str> {
        self.prefix.as_deref().map(nick_from_prefix)
    }

    /// Best-effort text of the message: the trailing parameter, else the
    /// last middle parameter, else the command itself.
    pub fn last_param(&self) -> &str {
        self.trailing
            .as_deref()
            .or_else(|| self.params.last().map(String::as_str))
            .unwrap_or(&self.command)
    }

    /// Re-encode the message as a wire line.
    pub fn to_line(&self) -> String {
        let body = format(&self.command, &self.params, self.trailing.as_deref());
        match &self.prefix {
            Some(prefix) => format!(":{} {}", prefix, body),
            None => body,
        }
    }
}

impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_line().trim_end_matches(['\r', '\n']))
    }
}

/// Extract the nickname from a `nick!user@host` prefix.
pub fn nick_from_prefix(prefix: &str) -> &str {
    let prefix = prefix.strip_prefix(':').unwrap_or(prefix);
    match prefix.split_once('!') {
        Some((nick, _)) => nick,
        None => prefix,
    }
}

/// Parse a raw line received from the server.
///
/// The line is scanned once, counting spaces until the colon that opens the
/// trailing parameter. A colon only counts when it starts a token: the one
/// at index 0 opens the prefix, the next one opens the trailing parameter.
/// The line is then split on exactly that many spaces so the trailing
/// parameter keeps its embedded spaces.
pub fn parse(line: &str) -> ParsedMessage {
    let line = line.trim_end_matches(['\r', '\n']);
    let bytes = line.as_bytes();

    let mut spaces = 0;
    let mut has_trailing = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b' ' => spaces += 1,
            b':' if i > 0 && bytes[i - 1] == b' ' => {
                has_trailing = true;
                break;
            }
            _ => {}
        }
    }

    let mut tokens: Vec<&str> = line.splitn(spaces + 1, ' ').collect();
    let trailing = if has_trailing {
        tokens
            .pop()
            .map(|last| last.strip_prefix(':').unwrap_or(last).to_string())
    } else {
        None
    };

    let mut tokens = tokens.into_iter().filter(|t| !t.is_empty());
    let mut message = ParsedMessage {
        trailing,
        ..ParsedMessage::default()
    };

    if line.starts_with(':') {
        message.prefix = tokens.next().map(|p| p[1..].to_string());
    }
    message.command = tokens.next().unwrap_or_default().to_string();
    message.params = tokens.map(str::to_string).collect();
    message
}

/// Build an outgoing line: `COMMAND p1 p2 :trailing\r\n`.
///
/// CR and LF inside any field are replaced with spaces so a field can never
/// terminate the line early.
pub fn format<S: AsRef<str>>(command: &str, params: &[S], trailing: Option<&str>) -> String {
    let mut line = sanitize(command);
    for param in params {
        line.push(' ');
        line.push_str(&sanitize(param.as_ref()));
    }
    if let Some(trailing) = trailing {
        line.push_str(" :");
        line.push_str(&sanitize(trailing));
    }
    line.push_str("\r\n");
    line
}

fn sanitize(field: &str) -> String {
    field.replace(['\r', '\n'], " ")
}

/// Outgoing commands the client is able to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick(String),
    User { username: String, realname: String },
    Join(String),
    Part(String),
    Privmsg { target: String, text: String },
    List,
    Names(Option<String>),
    Users,
    Help,
    Motd,
    Ison(Vec<String>),
    Pong(String),
    Quit(Option<String>),
}

impl Command {
    /// Encode as a CR-LF terminated wire line.
    pub fn to_line(&self) -> String {
        const NONE: &[&str] = &[];
        match self {
            Command::Nick(nick) => format("NICK", &[nick], None),
            Command::User { username, realname } => {
                format("USER", &[username.as_str(), "0", "unused"], Some(realname.as_str()))
            }
            Command::Join(channel) => format("JOIN", &[channel], None),
            Command::Part(channel) => format("PART", &[channel], None),
            Command::Privmsg { target, text } => format("PRIVMSG", &[target], Some(text.as_str())),
            Command::List => format("LIST", NONE, None),
            Command::Names(Some(channel)) => format("NAMES", &[channel], None),
            Command::Names(None) => format("NAMES", NONE, None),
            Command::Users => format("USERS", NONE, None),
            Command::Help => format("HELP", NONE, None),
            Command::Motd => format("MOTD", NONE, None),
            Command::Ison(nicks) => format("ISON", nicks.as_slice(), None),
            Command::Pong(payload) => format("PONG", NONE, Some(payload.as_str())),
            Command::Quit(Some(message)) => format("QUIT", NONE, Some(message.as_str())),
            Command::Quit(None) => format("QUIT", NONE, None),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_line().trim_end_matches(['\r', '\n']))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_line() {
        let msg = parse(":a!b@c CMD p1 p2 :trailing text");
        assert_eq!(msg.prefix.as_deref(), Some("a!b@c"));
        assert_eq!(msg.command, "CMD");
        assert_eq!(msg.params, vec!["p1", "p2"]);
        assert_eq!(msg.trailing.as_deref(), Some("trailing text"));
        assert_eq!(msg.origin_nick(), Some("a"));
    }

    #[test]
    fn test_parse_bare_command() {
        let msg = parse("PING");
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, "PING");
        assert!(msg.params.is_empty());
        assert_eq!(msg.trailing, None);
    }

    #[test]
    fn test_parse_trailing_without_prefix() {
        let msg = parse("PING :irc.example.org\r\n");
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.trailing.as_deref(), Some("irc.example.org"));

        let msg = parse("ERROR :Closing link: too many colons here");
        assert_eq!(msg.trailing.as_deref(), Some("Closing link: too many colons here"));
    }

    #[test]
    fn test_parse_empty_trailing() {
        let msg = parse(":server 303 me bob :\r\n");
        assert_eq!(msg.command, "303");
        assert_eq!(msg.params, vec!["me", "bob"]);
        assert_eq!(msg.trailing.as_deref(), Some(""));
    }

    #[test]
    fn test_parse_keeps_colons_inside_trailing() {
        let msg = parse(":n!u@h PRIVMSG #rust :see https://example.org :)");
        assert_eq!(msg.params, vec!["#rust"]);
        assert_eq!(msg.trailing.as_deref(), Some("see https://example.org :)"));
    }

    #[test]
    fn test_parse_ipv6_host_in_prefix() {
        let msg = parse(":n!u@2001:db8::1 JOIN #rust");
        assert_eq!(msg.prefix.as_deref(), Some("n!u@2001:db8::1"));
        assert_eq!(msg.command, "JOIN");
        assert_eq!(msg.params, vec!["#rust"]);
        assert_eq!(msg.trailing, None);
    }

    #[test]
    fn test_parse_short_input_is_permissive() {
        let msg = parse("");
        assert_eq!(msg.command, "");
        assert_eq!(msg.last_param(), "");

        let msg = parse(":server.only");
        assert_eq!(msg.prefix.as_deref(), Some("server.only"));
        assert_eq!(msg.command, "");
        assert_eq!(msg.param(0), None);

        let msg = parse(":server 322");
        assert_eq!(msg.command, "322");
        assert_eq!(msg.param(1), None);
        assert_eq!(msg.last_param(), "322");
    }

    #[test]
    fn test_last_param_fallbacks() {
        assert_eq!(parse(":s 001 me :Welcome home").last_param(), "Welcome home");
        assert_eq!(parse(":s MODE me +i").last_param(), "+i");
    }

    #[test]
    fn test_reparse_is_stable() {
        let lines = [
            ":a!b@c CMD p1 p2 :trailing text",
            "PING",
            "PING :irc.example.org",
            ":server 303 me bob :",
            ":server 322 me #rust 42 :Topic: with colon",
            ":nick!user@host JOIN #chan",
            "NOTICE * :*** Looking up your hostname",
        ];
        for line in lines {
            let parsed = parse(line);
            assert_eq!(parse(&parsed.to_line()), parsed, "line: {}", line);
        }
    }

    #[test]
    fn test_format_lines() {
        assert_eq!(format("JOIN", &["#rust"], None), "JOIN #rust\r\n");
        assert_eq!(format("PRIVMSG", &["bob"], Some("hi there")), "PRIVMSG bob :hi there\r\n");
        assert_eq!(format::<&str>("LIST", &[], None), "LIST\r\n");
        assert_eq!(format("PRIVMSG", &["bob"], Some("a\r\nQUIT")), "PRIVMSG bob :a  QUIT\r\n");
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(Command::Nick("me".into()).to_line(), "NICK me\r\n");
        assert_eq!(
            Command::User { username: "me".into(), realname: "Real Name".into() }.to_line(),
            "USER me 0 unused :Real Name\r\n"
        );
        assert_eq!(Command::Ison(vec!["bob".into()]).to_line(), "ISON bob\r\n");
        assert_eq!(Command::Pong("irc.example.org".into()).to_line(), "PONG :irc.example.org\r\n");
        assert_eq!(Command::Names(Some("#rust".into())).to_line(), "NAMES #rust\r\n");
        assert_eq!(Command::Quit(Some("bye".into())).to_string(), "QUIT :bye");
    }

    #[test]
    fn test_nick_from_prefix() {
        assert_eq!(nick_from_prefix("alice!~a@host"), "alice");
        assert_eq!(nick_from_prefix(":alice!~a@host"), "alice");
        assert_eq!(nick_from_prefix("irc.example.org"), "irc.example.org");
    }
}
