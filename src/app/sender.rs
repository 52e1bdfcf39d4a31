//! User-triggered commands.
//!
//! Every operation checks its preconditions first and returns
//! [`EngineError::NotConnected`] or [`EngineError::NoChannelJoined`] without
//! transmitting anything when they do not hold.

use crate::app::client::Client;
use crate::app::state::{is_channel_name, ConversationTarget};
use crate::error::{EngineError, Result};
use crate::irc::message::Command;
use crate::ui::DisplaySink;

impl<D: DisplaySink> Client<D> {
    fn require_ready(&self) -> Result<()> {
        if self.connection.is_ready() {
            Ok(())
        } else {
            Err(EngineError::NotConnected)
        }
    }

    fn require_channel(&self) -> Result<String> {
        self.require_ready()?;
        self.session
            .current_channel
            .clone()
            .ok_or(EngineError::NoChannelJoined)
    }

    /// Join `channel`. Only one channel is held at a time, so a different
    /// current channel is parted first.
    pub async fn join(&mut self, channel: &str) -> Result<()> {
        self.require_ready()?;
        let channel = non_empty(channel, "channel")?;
        if let Some(current) = self.session.current_channel.clone() {
            if current.eq_ignore_ascii_case(channel) {
                self.status(&format!("Already in {}", current));
                return Ok(());
            }
            self.transmit(&Command::Part(current)).await?;
        }
        self.transmit(&Command::Join(channel.to_string())).await
    }

    pub async fn leave(&mut self) -> Result<()> {
        let channel = self.require_channel()?;
        self.transmit(&Command::Part(channel)).await
    }

    pub async fn list_channels(&mut self) -> Result<()> {
        self.require_ready()?;
        self.transmit(&Command::List).await
    }

    pub async fn list_names(&mut self) -> Result<()> {
        let channel = self.require_channel()?;
        self.transmit(&Command::Names(Some(channel))).await
    }

    pub async fn list_users(&mut self) -> Result<()> {
        self.require_ready()?;
        self.transmit(&Command::Users).await
    }

    /// Ask whether one or more space-separated nicknames are online.
    pub async fn check_presence(&mut self, nicknames: &str) -> Result<()> {
        self.require_ready()?;
        let nicks: Vec<String> = non_empty(nicknames, "nickname")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        self.session.begin_plain_query();
        if let Err(e) = self.transmit(&Command::Ison(nicks)).await {
            self.session.cancel_last_query();
            return Err(e);
        }
        Ok(())
    }

    pub async fn send_to_channel(&mut self, text: &str) -> Result<()> {
        let channel = self.require_channel()?;
        let text = non_empty(text, "message")?;
        self.transmit(&Command::Privmsg {
            target: channel.clone(),
            text: text.to_string(),
        })
        .await?;
        self.display
            .append(&ConversationTarget::Channel(channel), &format!("> {}", text));
        Ok(())
    }

    /// Message a user once the server confirms they are online: sends
    /// `ISON` now and holds `text` until the matching 303 reply is
    /// dispatched. Replies to earlier `ISON`s are consumed first.
    pub async fn send_to_user(&mut self, nickname: &str, text: &str) -> Result<()> {
        self.require_ready()?;
        let nickname = non_empty(nickname, "nickname")?;
        let text = non_empty(text, "message")?;

        self.session.begin_presence_query(nickname, text)?;
        if let Err(e) = self.transmit(&Command::Ison(vec![nickname.to_string()])).await {
            self.session.cancel_last_query();
            return Err(e);
        }
        Ok(())
    }

    /// Close a conversation log. Closing the current channel leaves it.
    pub async fn close_conversation(&mut self, name: &str) -> Result<()> {
        let name = non_empty(name, "conversation")?;
        if self.session.is_current_channel(name) {
            return self.leave().await;
        }
        let target = if is_channel_name(name) {
            ConversationTarget::Channel(name.to_string())
        } else {
            ConversationTarget::User(name.to_string())
        };
        if self.session.close_conversation(&target) {
            self.display.close(&target);
        } else {
            self.status(&format!("No open conversation with {}", name));
        }
        Ok(())
    }

    pub async fn request_help(&mut self) -> Result<()> {
        self.require_ready()?;
        self.transmit(&Command::Help).await
    }

    pub async fn request_motd(&mut self) -> Result<()> {
        self.require_ready()?;
        self.transmit(&Command::Motd).await
    }
}

fn non_empty<'a>(value: &'a str, what: &'static str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(EngineError::InvalidArgument(what))
    } else {
        Ok(value)
    }
}
