mod app;
mod config;
mod error;
mod irc;
mod logging;
mod ui;

use crate::app::client::{Client, ClientOptions};
use crate::app::event::AppEvent;
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::irc::commands::{self, ParsedCommand};
use crate::logging::ChatLogger;
use crate::ui::{DisplaySink, InputSource, TerminalDisplay, TerminalInput};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "ircline")]
#[command(about = "A line-oriented IRC client")]
#[command(version)]
struct Args {
    #[arg(short, long, help = "Path to the config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Server host, overriding the config")]
    host: Option<String>,

    #[arg(short, long, help = "Server port, overriding the config")]
    port: Option<u16>,

    #[arg(short, long, help = "Nickname, overriding the config")]
    nick: Option<String>,

    #[arg(long, help = "Write the effective config to the config path and exit")]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = config::load_config(&path)?;
    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    if args.nick.is_some() {
        cfg.server.nickname = args.nick;
    }

    if args.write_config {
        config::save_config(&path, &cfg)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    logging::init_tracing(&cfg.logging.level);
    tracing::debug!(config = %path.display(), "starting");

    run(cfg).await
}

async fn run(cfg: AppConfig) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();

    let display = TerminalDisplay::new(
        &cfg.behavior.timestamp_format,
        ChatLogger::new(&cfg.logging),
    );
    let mut client = Client::new(display, event_tx.clone(), ClientOptions::from_config(&cfg));
    let mut input = TerminalInput::new();

    // Presence-timeout clock
    let tick_tx = event_tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if tick_tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    client.status("Welcome to ircline. Type /commands for help.");
    if cfg.server.auto_connect {
        let (host, port) = (cfg.server.host.clone(), cfg.server.port);
        connect(&mut client, &mut input, &cfg, &host, port).await?;
    }

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                if !handle_input(&mut client, &mut input, &cfg, &line).await? {
                    break;
                }
            }
            Some(event) = event_rx.recv() => client.handle_event(event).await,
        }
    }

    client.disconnect().await;
    Ok(())
}

/// Act on one line typed by the user. Returns `false` when the user asked
/// to quit. Engine errors are shown on the status log; only a failing
/// stdin is returned as an error.
async fn handle_input<D, I>(
    client: &mut Client<D>,
    input: &mut I,
    cfg: &AppConfig,
    line: &str,
) -> Result<bool>
where
    D: DisplaySink,
    I: InputSource + Send,
{
    let line = line.trim_end();
    if line.trim().is_empty() {
        return Ok(true);
    }
    if !line.starts_with('/') {
        if let Err(e) = client.send_to_channel(line).await {
            client.report_error("Send", &e);
        }
        return Ok(true);
    }

    let Some(command) = commands::parse_command(line) else {
        client.status(&format!("Unknown command or missing argument: {}", line));
        return Ok(true);
    };

    let (operation, outcome) = match command {
        ParsedCommand::Connect { host, port } => {
            let (host, port) = match host {
                Some(host) => (host, port),
                None => (cfg.server.host.clone(), cfg.server.port),
            };
            return connect(client, input, cfg, &host, port).await.map(|_| true);
        }
        ParsedCommand::Disconnect => {
            client.disconnect().await;
            return Ok(true);
        }
        ParsedCommand::Join { channel } => ("Join", client.join(&channel).await),
        ParsedCommand::Part => ("Part", client.leave().await),
        ParsedCommand::List => ("List", client.list_channels().await),
        ParsedCommand::Names => ("Names", client.list_names().await),
        ParsedCommand::Users => ("Users", client.list_users().await),
        ParsedCommand::Ison { nicks } => {
            let nicks = match nicks {
                Some(nicks) => nicks,
                None => input.ask_string("Nicknames to check: ").await?,
            };
            ("Ison", client.check_presence(&nicks).await)
        }
        ParsedCommand::Msg { target, text } => ("Message", client.send_to_user(&target, &text).await),
        ParsedCommand::Close { target } => ("Close", client.close_conversation(&target).await),
        ParsedCommand::Nick { nick } => {
            let outcome = client.retry_nick(&nick).await;
            if let Err(EngineError::NameCollision(_)) = outcome {
                client.status("Nickname still taken; try /nick <another>");
            }
            ("Nick", outcome)
        }
        ParsedCommand::Help => ("Help", client.request_help().await),
        ParsedCommand::Motd => ("Motd", client.request_motd().await),
        ParsedCommand::Quit => return Ok(false),
        ParsedCommand::Commands => {
            for usage in commands::USAGE {
                client.status(usage);
            }
            return Ok(true);
        }
    };

    if let Err(e) = outcome {
        client.report_error(operation, &e);
    }
    Ok(true)
}

/// Connect and register, asking for whatever identity the config lacks. On
/// a nickname collision the user is asked for another until one is accepted
/// or they answer with nothing.
async fn connect<D, I>(
    client: &mut Client<D>,
    input: &mut I,
    cfg: &AppConfig,
    host: &str,
    port: u16,
) -> Result<()>
where
    D: DisplaySink,
    I: InputSource + Send,
{
    let nickname = match cfg.server.nickname.clone() {
        Some(nick) => nick,
        None => {
            let suggested = config::nickname::generate_nickname();
            let answer = input.ask_token(&format!("Nickname [{}]: ", suggested)).await?;
            if answer.is_empty() { suggested } else { answer }
        }
    };
    let realname = match cfg.server.realname.clone() {
        Some(name) => name,
        None => {
            let answer = input.ask_string("Real name: ").await?;
            if answer.is_empty() { nickname.clone() } else { answer }
        }
    };

    let mut outcome = client.connect(host, port, &nickname, &realname).await;
    while let Err(EngineError::NameCollision(taken)) = &outcome {
        client.status(&format!("Nickname {} is already in use", taken));
        let another = input.ask_token("Another nickname (empty to give up): ").await?;
        if another.is_empty() {
            client.disconnect().await;
            return Ok(());
        }
        outcome = client.retry_nick(&another).await;
    }

    if let Err(e) = outcome {
        client.report_error("Connect", &e);
    }
    Ok(())
}
