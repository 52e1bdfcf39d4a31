use crate::error::{EngineError, Result};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

/// Routing key for a conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConversationTarget {
    /// Server-level output that belongs to no channel or user.
    Status,
    Channel(String),
    User(String),
}

impl ConversationTarget {
    pub fn name(&self) -> &str {
        match self {
            ConversationTarget::Status => "status",
            ConversationTarget::Channel(name) | ConversationTarget::User(name) => name,
        }
    }
}

impl fmt::Display for ConversationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `#` and `&` prefixes mark channels; anything else is a nickname.
pub fn is_channel_name(name: &str) -> bool {
    name.starts_with('#') || name.starts_with('&')
}

/// One `ISON` awaiting its 303 reply. Servers answer in order, so replies
/// are matched to requests first-in first-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsonRequest {
    /// Asked by the user; the reply is only displayed.
    Plain,
    /// A directed message held back until the recipient is confirmed online.
    Directed {
        target: String,
        body: String,
        since: Instant,
    },
    /// A directed message that timed out. Its slot stays queued so the late
    /// reply is consumed here instead of resolving a newer request.
    Expired { target: String },
}

/// Per-connection conversation state.
#[derive(Debug)]
pub struct Session {
    pub nickname: String,
    /// Only one channel is joined at a time.
    pub current_channel: Option<String>,
    ison_queue: VecDeque<IsonRequest>,
    conversations: BTreeSet<ConversationTarget>,
}

impl Session {
    pub fn new(nickname: impl Into<String>) -> Self {
        let mut conversations = BTreeSet::new();
        conversations.insert(ConversationTarget::Status);
        Self {
            nickname: nickname.into(),
            current_channel: None,
            ison_queue: VecDeque::new(),
            conversations,
        }
    }

    pub fn is_self(&self, nick: &str) -> bool {
        nick.eq_ignore_ascii_case(&self.nickname)
    }

    pub fn is_current_channel(&self, channel: &str) -> bool {
        self.current_channel
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(channel))
    }

    /// Hold `body` for `target` until the presence reply arrives. Only one
    /// directed send may be in flight; a second one is rejected.
    pub fn begin_presence_query(&mut self, target: &str, body: &str) -> Result<()> {
        if let Some(waiting) = self.awaiting_target() {
            return Err(EngineError::PresencePending(waiting.to_string()));
        }
        self.ison_queue.push_back(IsonRequest::Directed {
            target: target.to_string(),
            body: body.to_string(),
            since: Instant::now(),
        });
        Ok(())
    }

    /// Record a user-requested `ISON` so its reply keeps its place in line.
    pub fn begin_plain_query(&mut self) {
        self.ison_queue.push_back(IsonRequest::Plain);
    }

    /// Forget the most recent request; used when its `ISON` was never sent.
    pub fn cancel_last_query(&mut self) {
        self.ison_queue.pop_back();
    }

    /// The request a 303 reply answers, or `None` for an unsolicited reply.
    pub fn resolve_query(&mut self) -> Option<IsonRequest> {
        self.ison_queue.pop_front()
    }

    /// Nickname of the directed send still waiting for its reply.
    pub fn awaiting_target(&self) -> Option<&str> {
        self.ison_queue.iter().find_map(|request| match request {
            IsonRequest::Directed { target, .. } => Some(target.as_str()),
            _ => None,
        })
    }

    /// Give up on a directed send that has waited longer than `timeout`;
    /// returns its target nickname if one expired.
    pub fn expire_pending(&mut self, timeout: Duration, now: Instant) -> Option<String> {
        let request = self.ison_queue.iter_mut().find(|request| {
            matches!(request, IsonRequest::Directed { since, .. }
                if now.saturating_duration_since(*since) >= timeout)
        })?;
        let IsonRequest::Directed { target, .. } = request else {
            return None;
        };
        let target = std::mem::take(target);
        *request = IsonRequest::Expired {
            target: target.clone(),
        };
        Some(target)
    }

    /// Drop every outstanding request; returns the target of a directed send
    /// that will now never be delivered.
    pub fn clear_queries(&mut self) -> Option<String> {
        let waiting = self.awaiting_target().map(str::to_string);
        self.ison_queue.clear();
        waiting
    }

    /// Returns `true` if the conversation did not exist yet.
    pub fn open_conversation(&mut self, target: ConversationTarget) -> bool {
        self.conversations.insert(target)
    }

    /// Returns `true` if the conversation existed. The status log is never
    /// closed.
    pub fn close_conversation(&mut self, target: &ConversationTarget) -> bool {
        if *target == ConversationTarget::Status {
            return false;
        }
        self.conversations.remove(target)
    }

    #[cfg(test)]
    pub fn has_conversation(&self, target: &ConversationTarget) -> bool {
        self.conversations.contains(target)
    }
}
