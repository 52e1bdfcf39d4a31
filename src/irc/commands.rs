//! User slash-command parser.
//!
//! Parses `/command arg1 arg2 ...` input lines into typed [`ParsedCommand`]
//! values that the main loop dispatches to the client.

use crate::app::state::is_channel_name;

pub const DEFAULT_PORT: u16 = 6667;

/// A parsed user command. Each variant corresponds to a `/command`.
#[derive(Debug, PartialEq)]
pub enum ParsedCommand {
    Connect { host: Option<String>, port: u16 },
    Disconnect,
    Join { channel: String },
    Part,
    List,
    Names,
    Users,
    /// `None` prompts for the nicknames.
    Ison { nicks: Option<String> },
    Msg { target: String, text: String },
    Close { target: String },
    /// Retry registration with another nickname after a collision.
    Nick { nick: String },
    Help,
    Motd,
    Quit,
    Commands,
}

/// Usage lines printed by `/commands`.
pub const USAGE: &[&str] = &[
    "/connect [host[:port]]   connect and register",
    "/disconnect              close the connection",
    "/join <channel>          join a channel (leaves the current one)",
    "/part                    leave the current channel",
    "/list                    list channels",
    "/names                   list nicknames on the current channel",
    "/users                   list users on the server",
    "/ison [nick ...]         check which nicknames are online",
    "/msg <nick> <text>       message a user if they are online",
    "/close <nick|channel>    close a conversation",
    "/nick <nick>             retry registration with another nickname",
    "/help                    ask the server for help",
    "/motd                    show the message of the day",
    "/quit                    disconnect and exit",
    "/commands                show this list",
    "Anything else is sent to the current channel.",
];

/// Parse a slash-command string into a [`ParsedCommand`].
///
/// Returns `None` if the input does not start with `/`, is not a recognized
/// command, or lacks a required argument. Commands are case-insensitive.
pub fn parse_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(3, ' ').collect();
    let cmd = parts.first()?.to_lowercase();
    let arg = |i: usize| parts.get(i).map(|s| s.trim()).filter(|s| !s.is_empty());

    match cmd.as_str() {
        "connect" | "server" => match arg(1) {
            Some(addr) => {
                let (host, port) = parse_host_port(addr)?;
                Some(ParsedCommand::Connect { host: Some(host), port })
            }
            None => Some(ParsedCommand::Connect { host: None, port: DEFAULT_PORT }),
        },
        "disconnect" | "dc" => Some(ParsedCommand::Disconnect),
        "join" | "j" => {
            let channel = arg(1)?;
            let channel = if !is_channel_name(channel) {
                format!("#{}", channel)
            } else {
                channel.to_string()
            };
            Some(ParsedCommand::Join { channel })
        }
        "part" | "leave" => Some(ParsedCommand::Part),
        "list" => Some(ParsedCommand::List),
        "names" => Some(ParsedCommand::Names),
        "users" => Some(ParsedCommand::Users),
        "ison" => {
            let nicks = rest
                .split_once(' ')
                .map(|(_, n)| n.trim().to_string())
                .filter(|n| !n.is_empty());
            Some(ParsedCommand::Ison { nicks })
        }
        "msg" | "query" => {
            let target = arg(1)?.to_string();
            let text = parts.get(2).unwrap_or(&"").to_string();
            Some(ParsedCommand::Msg { target, text })
        }
        "close" => Some(ParsedCommand::Close { target: arg(1)?.to_string() }),
        "nick" => Some(ParsedCommand::Nick { nick: arg(1)?.to_string() }),
        "help" => Some(ParsedCommand::Help),
        "motd" => Some(ParsedCommand::Motd),
        "quit" | "exit" => Some(ParsedCommand::Quit),
        "commands" | "?" => Some(ParsedCommand::Commands),
        _ => None,
    }
}

/// Parse a `host` or `host:port` address string. Defaults to port 6667.
fn parse_host_port(addr: &str) -> Option<(String, u16)> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            Some((host.to_string(), port.parse().ok()?))
        }
        _ => Some((addr.to_string(), DEFAULT_PORT)),
    }
}
