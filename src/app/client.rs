//! The protocol engine's single owner.
//!
//! `Client` holds the connection, the session and the display sink. Server
//! lines reach it as [`AppEvent`]s from the background reader, user commands
//! arrive as method calls (see `sender.rs`); both run on the same task, one
//! at a time, so the session needs no locking.

use crate::app::action::Action;
use crate::app::event::AppEvent;
use crate::app::handler;
use crate::app::state::{ConversationTarget, Session};
use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::irc::connection::{Connection, ConnectionState};
use crate::irc::message::Command;
use crate::ui::DisplaySink;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub registration_timeout: Duration,
    pub presence_timeout: Duration,
    pub quit_message: String,
}

impl ClientOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            registration_timeout: Duration::from_secs(cfg.behavior.registration_timeout_secs),
            presence_timeout: Duration::from_secs(cfg.behavior.presence_timeout_secs),
            quit_message: cfg.server.quit_message.clone(),
        }
    }
}

pub struct Client<D> {
    pub(super) connection: Connection,
    pub(super) session: Session,
    pub(super) display: D,
    events: mpsc::UnboundedSender<AppEvent>,
    presence_timeout: Duration,
    quit_message: String,
}

impl<D: DisplaySink> Client<D> {
    pub fn new(display: D, events: mpsc::UnboundedSender<AppEvent>, options: ClientOptions) -> Self {
        Self {
            connection: Connection::new(options.registration_timeout),
            session: Session::new(""),
            display,
            events,
            presence_timeout: options.presence_timeout,
            quit_message: options.quit_message,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[cfg(test)]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    #[cfg(test)]
    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn status(&mut self, text: &str) {
        self.display.append(&ConversationTarget::Status, text);
    }

    /// Show a failed user operation on the status log.
    pub fn report_error(&mut self, operation: &str, error: &EngineError) {
        self.status(&format!("{} failed: {}", operation, error));
    }

    /// Open the socket, register, and start the background reader. Any
    /// previous connection is closed first.
    ///
    /// A 433 reply yields [`EngineError::NameCollision`] with the socket
    /// left open; follow up with [`Client::retry_nick`].
    pub async fn connect(&mut self, host: &str, port: u16, nickname: &str, realname: &str) -> Result<()> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(EngineError::InvalidArgument("nickname"));
        }

        self.disconnect().await;
        self.status(&format!("Connecting to {}:{}...", host, port));
        self.connection.open(host, port).await?;
        self.session = Session::new(nickname);

        match self.connection.register(nickname, realname).await {
            Ok(true) => self.on_registered(),
            Ok(false) => Err(EngineError::NameCollision(nickname.to_string())),
            Err(e) => {
                self.connection.close(None).await;
                Err(e)
            }
        }
    }

    /// Try another nickname after a collision during registration.
    pub async fn retry_nick(&mut self, nickname: &str) -> Result<()> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(EngineError::InvalidArgument("nickname"));
        }
        if self.connection.state() != ConnectionState::Registering {
            return Err(EngineError::NotConnected);
        }

        match self.connection.retry_nick(nickname).await {
            Ok(true) => {
                self.session.nickname = nickname.to_string();
                self.on_registered()
            }
            Ok(false) => Err(EngineError::NameCollision(nickname.to_string())),
            Err(e) => {
                self.connection.close(None).await;
                Err(e)
            }
        }
    }

    fn on_registered(&mut self) -> Result<()> {
        self.connection.spawn_reader(self.events.clone())?;
        let text = format!("Login successful as {}", self.session.nickname);
        self.status(&text);
        Ok(())
    }

    /// Say goodbye and close the connection. Does nothing when already
    /// disconnected.
    pub async fn disconnect(&mut self) {
        if self.connection.state() == ConnectionState::Disconnected {
            return;
        }
        let farewell = Command::Quit(Some(self.quit_message.clone()));
        self.connection.close(Some(&farewell)).await;
        self.reset_session();
        self.status("Connection closed");
    }

    /// Membership and pending correlations do not survive the socket.
    fn reset_session(&mut self) {
        if let Some(channel) = self.session.current_channel.take() {
            let target = ConversationTarget::Channel(channel);
            if self.session.close_conversation(&target) {
                self.display.close(&target);
            }
        }
        if let Some(target) = self.session.clear_queries() {
            self.status(&format!("Message to {} was not sent", target));
        }
    }

    /// Transmit a command; a transport failure forces the connection closed.
    pub(super) async fn transmit(&mut self, command: &Command) -> Result<()> {
        match self.connection.send_command(command).await {
            Err(EngineError::Connect(e)) => {
                tracing::warn!(error = %e, "write failed, closing connection");
                self.connection.close(None).await;
                self.reset_session();
                Err(EngineError::Connect(e))
            }
            other => other,
        }
    }

    pub async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ServerMessage {
                connection_id,
                message,
            } => {
                if !self.is_live(connection_id) {
                    tracing::debug!(connection_id, "dropping line from closed connection");
                    return;
                }
                tracing::debug!(%message, "dispatch");
                let actions = handler::handle_server_message(
                    &mut self.session,
                    self.connection.host(),
                    &message,
                );
                self.apply(actions).await;
            }
            AppEvent::Disconnected {
                connection_id,
                reason,
            } => {
                if !self.is_live(connection_id) {
                    return;
                }
                self.connection.close(None).await;
                self.reset_session();
                self.status(&format!("Disconnected: {}", reason));
            }
            AppEvent::Tick => self.expire_pending(Instant::now()),
        }
    }

    fn is_live(&self, connection_id: u64) -> bool {
        connection_id == self.connection.id()
            && self.connection.state() != ConnectionState::Disconnected
    }

    fn expire_pending(&mut self, now: Instant) {
        if let Some(target) = self.session.expire_pending(self.presence_timeout, now) {
            self.status(&format!(
                "No presence reply for {}; message not sent",
                target
            ));
        }
    }

    async fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Display { target, text } => self.display.append(&target, &text),
                Action::OpenConversation(target) => self.display.open(&target),
                Action::CloseConversation(target) => self.display.close(&target),
                Action::Send(command) => {
                    if let Err(e) = self.transmit(&command).await {
                        self.report_error("Send", &e);
                    }
                }
                Action::Disconnect { reason } => {
                    self.status(&format!("Disconnected: {}", reason));
                    self.disconnect().await;
                }
            }
        }
    }

    #[cfg(test)]
    pub fn is_awaiting_presence(&self) -> bool {
        self.session.awaiting_target().is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ui::tests::RecordingDisplay;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    pub(crate) fn options() -> ClientOptions {
        ClientOptions {
            registration_timeout: Duration::from_secs(5),
            presence_timeout: Duration::from_secs(15),
            quit_message: "bye".to_string(),
        }
    }

    /// In-process server: records every line the client sends and answers
    /// with whatever `respond` returns for it. `USER` is always answered
    /// with 004 unless `respond` says otherwise.
    pub(crate) async fn fake_server<F>(respond: F) -> (u16, JoinHandle<Vec<String>>)
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let mut seen = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                let reply = respond(&line).or_else(|| {
                    line.starts_with("USER ")
                        .then(|| ":srv 004 me srv v1\r\n".to_string())
                });
                seen.push(line);
                if let Some(reply) = reply {
                    if write_half.write_all(reply.as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
            seen
        });
        (port, handle)
    }

    pub(crate) async fn connected<F>(
        respond: F,
    ) -> (
        Client<RecordingDisplay>,
        mpsc::UnboundedReceiver<AppEvent>,
        JoinHandle<Vec<String>>,
    )
    where
        F: Fn(&str) -> Option<String> + Send + 'static,
    {
        let (port, server) = fake_server(respond).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut client = Client::new(RecordingDisplay::default(), tx, options());
        client.connect("127.0.0.1", port, "me", "Real Name").await.unwrap();
        (client, rx, server)
    }

    async fn pump(client: &mut Client<RecordingDisplay>, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event")
            .expect("channel open");
        client.handle_event(event).await;
    }

    #[tokio::test]
    async fn test_directed_send_round_trip() {
        let (mut client, mut rx, server) = connected(|line| match line {
            "ISON bob" => Some(":srv 303 me :bob\r\n".into()),
            "PRIVMSG bob :hi" => Some("PING :irc.example.org\r\n".into()),
            _ => None,
        })
        .await;
        assert_eq!(client.connection_state(), ConnectionState::Ready);

        client.send_to_user("bob", "hi").await.unwrap();
        assert!(client.is_awaiting_presence());
        pump(&mut client, &mut rx).await;
        assert!(!client.is_awaiting_presence());
        pump(&mut client, &mut rx).await;

        client.disconnect().await;
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(
            server.await.unwrap(),
            vec![
                "NICK me",
                "USER me 0 unused :Real Name",
                "ISON bob",
                "PRIVMSG bob :hi",
                "PONG :irc.example.org",
                "QUIT :bye",
            ]
        );
        let bob = ConversationTarget::User("bob".into());
        assert!(client.display().opened.contains(&bob));
        assert!(client.display().lines_for(&bob).contains(&"> hi".to_string()));
    }

    #[tokio::test]
    async fn test_absent_user_gets_nothing() {
        let (mut client, mut rx, server) = connected(|line| {
            (line == "ISON ghost").then(|| ":srv 303 me :\r\n".to_string())
        })
        .await;

        client.send_to_user("ghost", "boo").await.unwrap();
        pump(&mut client, &mut rx).await;
        client.disconnect().await;

        let seen = server.await.unwrap();
        assert!(!seen.iter().any(|l| l.starts_with("PRIVMSG")));
        assert!(client
            .display()
            .status_lines()
            .iter()
            .any(|l| l.contains("ghost doesn't exist")));
    }

    #[tokio::test]
    async fn test_presence_timeout() {
        let (port, _server) = fake_server(|_| None).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut opts = options();
        opts.presence_timeout = Duration::ZERO;
        let mut client = Client::new(RecordingDisplay::default(), tx, opts);
        client.connect("127.0.0.1", port, "me", "Real Name").await.unwrap();

        client.send_to_user("bob", "hi").await.unwrap();
        client.handle_event(AppEvent::Tick).await;
        assert!(!client.is_awaiting_presence());
        assert!(client
            .display()
            .status_lines()
            .iter()
            .any(|l| l == "No presence reply for bob; message not sent"));
    }

    #[tokio::test]
    async fn test_plain_ison_reply_does_not_resolve_directed_send() {
        let (mut client, mut rx, server) = connected(|line| match line {
            "ISON alice" => Some(":srv 303 me :alice\r\n".into()),
            "ISON bob" => Some(":srv 303 me :bob\r\n".into()),
            _ => None,
        })
        .await;

        client.check_presence("alice").await.unwrap();
        client.send_to_user("bob", "hi").await.unwrap();
        pump(&mut client, &mut rx).await;
        assert!(client.is_awaiting_presence());
        pump(&mut client, &mut rx).await;
        assert!(!client.is_awaiting_presence());

        client.disconnect().await;
        let seen = server.await.unwrap();
        assert_eq!(&seen[2..], &["ISON alice", "ISON bob", "PRIVMSG bob :hi", "QUIT :bye"]);
        let status = client.display().status_lines();
        assert!(status.contains(&"Online: alice".to_string()));
        assert!(!status.iter().any(|l| l.contains("doesn't exist")));
    }

    #[tokio::test]
    async fn test_late_reply_after_timeout_does_not_resolve_next_send() {
        let (port, server) = fake_server(|line| match line {
            "ISON bob" => Some(":srv 303 me :\r\n".into()),
            "ISON carol" => Some(":srv 303 me :carol\r\n".into()),
            _ => None,
        })
        .await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut opts = options();
        opts.presence_timeout = Duration::ZERO;
        let mut client = Client::new(RecordingDisplay::default(), tx, opts);
        client.connect("127.0.0.1", port, "me", "Real Name").await.unwrap();

        client.send_to_user("bob", "old").await.unwrap();
        client.handle_event(AppEvent::Tick).await;
        client.send_to_user("carol", "new").await.unwrap();
        pump(&mut client, &mut rx).await;
        assert!(client.is_awaiting_presence());
        pump(&mut client, &mut rx).await;
        assert!(!client.is_awaiting_presence());

        client.disconnect().await;
        let seen = server.await.unwrap();
        assert!(seen.contains(&"PRIVMSG carol :new".to_string()));
        assert!(!client
            .display()
            .status_lines()
            .iter()
            .any(|l| l.contains("carol doesn't exist")));
    }

    #[tokio::test]
    async fn test_name_collision_then_retry() {
        let (port, server) = fake_server(|line| match line {
            l if l.starts_with("USER ") => Some(":srv 433 * me :Nickname is already in use\r\n".into()),
            "NICK me_" => Some(":srv 004 me_ srv v1\r\n".into()),
            _ => None,
        })
        .await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut client = Client::new(RecordingDisplay::default(), tx, options());

        let err = client.connect("127.0.0.1", port, "me", "Real Name").await.unwrap_err();
        assert!(matches!(err, EngineError::NameCollision(ref n) if n == "me"));
        assert_eq!(client.connection_state(), ConnectionState::Registering);

        client.retry_nick("me_").await.unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Ready);
        assert_eq!(client.session().nickname, "me_");

        client.disconnect().await;
        let seen = server.await.unwrap();
        assert_eq!(seen[2], "NICK me_");
    }

    #[tokio::test]
    async fn test_squit_closes_connection() {
        let (mut client, mut rx, _server) =
            connected(|line| (line == "LIST").then(|| ":srv SQUIT srv :going away\r\n".to_string())).await;

        client.list_channels().await.unwrap();
        pump(&mut client, &mut rx).await;
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        client.disconnect().await;
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_server_hangup_is_reported() {
        let (port, server) = fake_server(|_| None).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut client = Client::new(RecordingDisplay::default(), tx, options());
        client.connect("127.0.0.1", port, "me", "Real Name").await.unwrap();

        server.abort();
        let _ = server.await;
        pump(&mut client, &mut rx).await;
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(client
            .display()
            .status_lines()
            .iter()
            .any(|l| l.starts_with("Disconnected:")));
    }

    #[tokio::test]
    async fn test_events_from_old_connection_are_ignored() {
        let (mut client, _rx, _server) = connected(|_| None).await;
        let stale = client.connection.id() - 1;
        client
            .handle_event(AppEvent::Disconnected {
                connection_id: stale,
                reason: "old".into(),
            })
            .await;
        assert_eq!(client.connection_state(), ConnectionState::Ready);
    }
}
