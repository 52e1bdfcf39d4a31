use crate::app::event::{AppEvent, ConnectionId};
use crate::error::{EngineError, Result};
use crate::irc::codec::LineCodec;
use crate::irc::message::{self, numeric, Command};
use futures::StreamExt;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

/// Lifecycle of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Registering,
    Ready,
    Closing,
}

/// Server lines, framed with a length limit.
type LineReader = FramedRead<OwnedReadHalf, LineCodec>;

/// A single server connection: owns the socket halves and the background
/// reader task once registration has completed.
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    host: String,
    registration_timeout: Duration,
    reader: Option<LineReader>,
    writer: Option<OwnedWriteHalf>,
    shutdown: Option<oneshot::Sender<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn new(registration_timeout: Duration) -> Self {
        Self {
            id: 0,
            state: ConnectionState::Disconnected,
            host: String::new(),
            registration_timeout,
            reader: None,
            writer: None,
            shutdown: None,
            reader_task: None,
        }
    }

    /// Identifies the current socket. Bumped on every successful `open`, so
    /// events from a previous socket can be told apart.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Connect to `host:port`, closing any previous connection first.
    pub async fn open(&mut self, host: &str, port: u16) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            self.close(None).await;
        }

        self.state = ConnectionState::Connecting;
        tracing::info!(host, port, "connecting");
        let stream = match TcpStream::connect((host, port)).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(host, port, error = %e, "connect failed");
                self.state = ConnectionState::Disconnected;
                return Err(e.into());
            }
        };
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        self.id += 1;
        self.host = host.to_string();
        self.reader = Some(FramedRead::new(read_half, LineCodec::default()));
        self.writer = Some(write_half);
        self.state = ConnectionState::Registering;
        Ok(())
    }

    /// Send NICK/USER and wait on the calling task for the server's verdict.
    ///
    /// Returns `Ok(true)` on 004, `Ok(false)` on 433. After a collision the
    /// socket stays open so [`Connection::retry_nick`] can try another name.
    pub async fn register(&mut self, nickname: &str, realname: &str) -> Result<bool> {
        if self.state != ConnectionState::Registering {
            return Err(EngineError::NotConnected);
        }
        self.send_command(&Command::Nick(nickname.to_string())).await?;
        self.send_command(&Command::User {
            username: nickname.to_string(),
            realname: realname.to_string(),
        })
        .await?;
        self.await_registration().await
    }

    /// Offer a different nickname after a 433 during registration.
    pub async fn retry_nick(&mut self, nickname: &str) -> Result<bool> {
        if self.state != ConnectionState::Registering {
            return Err(EngineError::NotConnected);
        }
        self.send_command(&Command::Nick(nickname.to_string())).await?;
        self.await_registration().await
    }

    async fn await_registration(&mut self) -> Result<bool> {
        let (Some(reader), Some(writer)) = (self.reader.as_mut(), self.writer.as_mut()) else {
            return Err(EngineError::NotConnected);
        };
        let limit = self.registration_timeout;
        let outcome = match tokio::time::timeout(limit, read_until_verdict(reader, writer)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::RegistrationTimeout(limit.as_secs())),
        };
        match outcome {
            Ok(true) => {
                tracing::info!(host = %self.host, "registered");
                self.state = ConnectionState::Ready;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                self.close(None).await;
                Err(e)
            }
        }
    }

    /// Hand the read half to a background task that forwards every parsed
    /// line as an [`AppEvent`] until end of stream or [`Connection::close`].
    pub fn spawn_reader(&mut self, events: mpsc::UnboundedSender<AppEvent>) -> Result<()> {
        if !self.is_ready() {
            return Err(EngineError::NotConnected);
        }
        let reader = self.reader.take().ok_or(EngineError::NotConnected)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);
        self.reader_task = Some(tokio::spawn(read_loop(self.id, reader, shutdown_rx, events)));
        Ok(())
    }

    /// Write an already formatted line.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        if !matches!(self.state, ConnectionState::Ready | ConnectionState::Registering) {
            return Err(EngineError::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(EngineError::NotConnected)?;
        write_line(writer, line).await
    }

    pub async fn send_command(&mut self, command: &Command) -> Result<()> {
        tracing::debug!(%command, "send");
        self.send(&command.to_line()).await
    }

    /// Say goodbye, stop the reader and drop the socket. Safe to call in any
    /// state, any number of times.
    pub async fn close(&mut self, farewell: Option<&Command>) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.state = ConnectionState::Closing;

        if let Some(mut writer) = self.writer.take() {
            if let Some(farewell) = farewell {
                if let Err(e) = write_line(&mut writer, &farewell.to_line()).await {
                    tracing::debug!(error = %e, "farewell not delivered");
                }
            }
            let _ = writer.shutdown().await;
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.reader_task.take() {
            let _ = task.await;
        }
        self.reader = None;
        self.state = ConnectionState::Disconnected;
        tracing::info!(host = %self.host, "connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_until_verdict(reader: &mut LineReader, writer: &mut OwnedWriteHalf) -> Result<bool> {
    loop {
        let Some(line) = reader.next().await.transpose()? else {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection during registration",
            )
            .into());
        };
        let msg = message::parse(&line);
        match msg.command.as_str() {
            numeric::RPL_MYINFO => return Ok(true),
            numeric::ERR_NICKNAMEINUSE => {
                tracing::warn!(reason = msg.last_param(), "nickname rejected");
                return Ok(false);
            }
            "PING" => {
                let pong = Command::Pong(msg.last_param().to_string());
                write_line(writer, &pong.to_line()).await?;
            }
            _ => tracing::debug!(%line, "discarding registration line"),
        }
    }
}

async fn read_loop(
    connection_id: ConnectionId,
    mut reader: LineReader,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<AppEvent>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::debug!(connection_id, "reader stopped");
                return;
            }
            line = reader.next() => match line {
                Some(Ok(line)) => {
                    let message = message::parse(&line);
                    if events.send(AppEvent::ServerMessage { connection_id, message }).is_err() {
                        return;
                    }
                }
                None => {
                    let _ = events.send(AppEvent::Disconnected {
                        connection_id,
                        reason: "Connection closed by server".to_string(),
                    });
                    return;
                }
                Some(Err(e)) => {
                    tracing::warn!(connection_id, error = %e, "read failed");
                    let _ = events.send(AppEvent::Disconnected {
                        connection_id,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
    }
}
