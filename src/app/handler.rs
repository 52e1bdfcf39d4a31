//! Dispatcher for server lines.
//!
//! Each incoming message updates the [`Session`] and yields the [`Action`]s
//! the client must carry out. Handlers bounds-check every field they use and
//! fall back to printing [`ParsedMessage::last_param`] when a line is too
//! short to interpret.

use crate::app::action::Action;
use crate::app::state::{ConversationTarget, IsonRequest, Session};
use crate::irc::message::{numeric, Command, ParsedMessage};

pub fn handle_server_message(
    session: &mut Session,
    server_host: &str,
    message: &ParsedMessage,
) -> Vec<Action> {
    let mut actions = Vec::new();
    let nick_from = message.origin_nick().filter(|n| !n.is_empty());

    match (message.command.as_str(), nick_from) {
        ("PING", _) => {
            let payload = message
                .trailing
                .as_deref()
                .or_else(|| message.param(0))
                .filter(|p| !p.is_empty())
                .unwrap_or(server_host);
            actions.push(Action::Send(Command::Pong(payload.to_string())));
        }

        ("QUIT", Some(nick)) => {
            let text = match message.trailing.as_deref().filter(|r| !r.is_empty()) {
                Some(reason) => format!("{} has quit ({})", nick, reason),
                None => format!("{} has quit", nick),
            };
            actions.push(Action::status(text));
        }

        ("PART", Some(nick)) => handle_part(session, nick, message, &mut actions),

        ("JOIN", Some(nick)) => handle_join(session, nick, message, &mut actions),

        ("PRIVMSG", Some(nick)) => handle_privmsg(session, nick, message, &mut actions),

        (numeric::RPL_LIST, _) => match (message.param(1), message.param(2)) {
            (Some(channel), Some(count)) => {
                actions.push(Action::status(format!("{} has {} user(s)", channel, count)));
            }
            _ => fallback(message, &mut actions),
        },

        (numeric::RPL_NAMREPLY, _) => {
            let channel = message.params.last().filter(|_| message.params.len() >= 2);
            match (channel, message.trailing.as_deref()) {
                (Some(channel), Some(names)) => {
                    actions.push(Action::status(format!("Nicknames on {}: {}", channel, names)));
                }
                _ => fallback(message, &mut actions),
            }
        }

        (numeric::RPL_ISON, _) => handle_ison(session, message, &mut actions),

        ("SQUIT", _) => actions.push(Action::Disconnect {
            reason: "Server requested disconnect".to_string(),
        }),

        (numeric::RPL_LISTSTART, _)
        | (numeric::RPL_LISTEND, _)
        | (numeric::RPL_ENDOFNAMES, _)
        | ("MODE", _) => {}

        _ => fallback(message, &mut actions),
    }

    actions
}

fn fallback(message: &ParsedMessage, actions: &mut Vec<Action>) {
    let text = message.last_param();
    if !text.is_empty() {
        actions.push(Action::status(text));
    }
}

/// Channel named by a JOIN/PART: first middle parameter, or the trailing
/// parameter for servers that send `JOIN :#chan`.
fn channel_param(message: &ParsedMessage) -> Option<&str> {
    message
        .param(0)
        .or(message.trailing.as_deref())
        .filter(|c| !c.is_empty())
}

fn handle_join(session: &mut Session, nick: &str, message: &ParsedMessage, actions: &mut Vec<Action>) {
    let Some(channel) = channel_param(message) else {
        fallback(message, actions);
        return;
    };

    if session.is_self(nick) {
        session.current_channel = Some(channel.to_string());
        let target = ConversationTarget::Channel(channel.to_string());
        if session.open_conversation(target.clone()) {
            actions.push(Action::OpenConversation(target));
        }
    }

    let target = if session.is_current_channel(channel) {
        ConversationTarget::Channel(channel.to_string())
    } else {
        ConversationTarget::Status
    };
    actions.push(Action::display(target, format!("{} has joined {}", nick, channel)));
}

fn handle_part(session: &mut Session, nick: &str, message: &ParsedMessage, actions: &mut Vec<Action>) {
    let Some(channel) = channel_param(message) else {
        fallback(message, actions);
        return;
    };
    let reason = message
        .param(0)
        .and(message.trailing.as_deref())
        .filter(|r| !r.is_empty());
    let text = match reason {
        Some(reason) => format!("{} has left {} ({})", nick, channel, reason),
        None => format!("{} has left {}", nick, channel),
    };

    if !session.is_current_channel(channel) {
        actions.push(Action::status(text));
        return;
    }

    let target = ConversationTarget::Channel(channel.to_string());
    actions.push(Action::display(target.clone(), text));
    if session.is_self(nick) {
        session.current_channel = None;
        if session.close_conversation(&target) {
            actions.push(Action::CloseConversation(target));
        }
    }
}

fn handle_privmsg(session: &mut Session, nick: &str, message: &ParsedMessage, actions: &mut Vec<Action>) {
    let (Some(to), Some(body)) = (message.param(0), message.trailing.as_deref()) else {
        fallback(message, actions);
        return;
    };

    let target = if session.is_current_channel(to) {
        ConversationTarget::Channel(to.to_string())
    } else {
        ConversationTarget::User(nick.to_string())
    };
    if session.open_conversation(target.clone()) {
        actions.push(Action::OpenConversation(target.clone()));
    }
    actions.push(Action::display(target, format!("<{}> {}", nick, body)));
}

fn handle_ison(session: &mut Session, message: &ParsedMessage, actions: &mut Vec<Action>) {
    let online = message.trailing.as_deref().unwrap_or_default();

    let (target, body) = match session.resolve_query() {
        Some(IsonRequest::Directed { target, body, .. }) => (target, body),
        Some(IsonRequest::Expired { target }) => {
            tracing::debug!(%target, "late presence reply for an expired send");
            return;
        }
        Some(IsonRequest::Plain) | None => {
            if online.trim().is_empty() {
                actions.push(Action::status("There are no matching nicknames"));
            } else {
                actions.push(Action::status(format!("Online: {}", online.trim())));
            }
            return;
        }
    };

    let present = online
        .split_whitespace()
        .any(|n| n.eq_ignore_ascii_case(&target));
    if !present {
        tracing::debug!(%target, "directed send dropped, nickname offline");
        actions.push(Action::status(format!(
            "Nickname {} doesn't exist on server; message not sent",
            target
        )));
        return;
    }

    let conversation = ConversationTarget::User(target.clone());
    if session.open_conversation(conversation.clone()) {
        actions.push(Action::OpenConversation(conversation.clone()));
    }
    actions.push(Action::Send(Command::Privmsg {
        target,
        text: body.clone(),
    }));
    actions.push(Action::display(conversation, format!("> {}", body)));
}
