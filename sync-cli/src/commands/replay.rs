//! Replay a scenario script against the engine.
//!
//! The engine runs in step mode against an in-memory remote, the configured
//! on-disk cache, and a manually driven connectivity monitor. After every
//! step the published snapshot (if it changed), any notices, and the state
//! are printed.
//!
//! Script format, one step per line (`#` starts a comment):
//!
//! ```text
//! online
//! deliver {"_id":"a","text":"hi","createdAt":"2024-01-01T00:00:00Z","user":{"_id":"u2","name":"Bo"}}
//! send hello there
//! send-image https://example.com/cat.png
//! send-audio https://example.com/note.m4a
//! send-location 52.52 13.405
//! offline
//! fail-subscription
//! teardown
//! ```

use anyhow::{bail, Context, Result};
use chat_sync_client::{
    FileStore, ManualConnectivity, MemoryRemote, Message, MessagePublisher, ObserverHandle,
    OutgoingMessage, Snapshot, SyncController, SyncNotice,
};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use super::{describe_notice, format_message, state_label};
use crate::config::AppConfig;

/// Error text used for injected subscription failures.
const INJECTED_FAILURE: &str = "injected failure";

/// One scenario step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Connectivity reading: connected.
    Online,
    /// Connectivity reading: not connected.
    Offline,
    /// Another client writes a message to the remote collection.
    Deliver(Message),
    /// Send a text message through the publisher.
    Send(String),
    /// Send an image message.
    SendImage(String),
    /// Send an audio message.
    SendAudio(String),
    /// Send a location message.
    SendLocation {
        /// Degrees north.
        latitude: f64,
        /// Degrees east.
        longitude: f64,
    },
    /// Break the open subscription, or the next one if none is open.
    FailSubscription,
    /// Tear the engine down.
    Teardown,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Deliver(message) => write!(f, "deliver {}", message.id()),
            Self::Send(text) => write!(f, "send {text}"),
            Self::SendImage(url) => write!(f, "send-image {url}"),
            Self::SendAudio(url) => write!(f, "send-audio {url}"),
            Self::SendLocation {
                latitude,
                longitude,
            } => write!(f, "send-location {latitude} {longitude}"),
            Self::FailSubscription => write!(f, "fail-subscription"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

/// Parse a script into steps. Blank lines and comments are skipped.
pub fn parse_script(contents: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = parse_step(line).with_context(|| format!("line {}: {line}", index + 1))?;
        steps.push(step);
    }
    Ok(steps)
}

fn parse_step(line: &str) -> Result<Step> {
    let (command, args) = match line.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (line, ""),
    };

    let step = match command {
        "online" => Step::Online,
        "offline" => Step::Offline,
        "fail-subscription" => Step::FailSubscription,
        "teardown" => Step::Teardown,
        "deliver" => {
            let message: Message =
                serde_json::from_str(args).context("deliver expects a message JSON object")?;
            return Ok(Step::Deliver(message));
        }
        "send" => {
            if args.is_empty() {
                bail!("send expects message text");
            }
            return Ok(Step::Send(args.to_string()));
        }
        "send-image" | "send-audio" => {
            if args.is_empty() || args.contains(char::is_whitespace) {
                bail!("{command} expects one URL");
            }
            return Ok(match command {
                "send-image" => Step::SendImage(args.to_string()),
                _ => Step::SendAudio(args.to_string()),
            });
        }
        "send-location" => {
            let coordinates: Vec<&str> = args.split_whitespace().collect();
            let [latitude, longitude] = coordinates.as_slice() else {
                bail!("send-location expects <latitude> <longitude>");
            };
            return Ok(Step::SendLocation {
                latitude: latitude.parse().context("invalid latitude")?,
                longitude: longitude.parse().context("invalid longitude")?,
            });
        }
        other => bail!("unknown step {other:?}"),
    };

    if !args.is_empty() {
        bail!("{command} takes no arguments");
    }
    Ok(step)
}

/// Engine wired for replay, reporting into `out`.
pub struct Replay<W> {
    controller: SyncController<MemoryRemote, FileStore>,
    publisher: MessagePublisher<MemoryRemote>,
    remote: MemoryRemote,
    monitor: ManualConnectivity,
    _observer: ObserverHandle,
    updates: watch::Receiver<Snapshot>,
    notices: broadcast::Receiver<SyncNotice>,
    collection: String,
    out: W,
}

impl<W: Write> Replay<W> {
    /// Build the engine from the resolved configuration.
    pub fn new(app: &AppConfig, out: W) -> Self {
        let config = app.sync_config();
        let collection = config.collection.clone();
        let remote = MemoryRemote::new();
        let (controller, publisher) = SyncController::new(
            config,
            Arc::new(remote.clone()),
            FileStore::new(app.cache_dir()),
        );
        let monitor = ManualConnectivity::new();
        let observer = controller.attach(&monitor);
        let updates = publisher.updates();
        let notices = publisher.notices();

        Self {
            controller,
            publisher,
            remote,
            monitor,
            _observer: observer,
            updates,
            notices,
            collection,
            out,
        }
    }

    /// Apply one step, let the engine settle, and report.
    pub async fn step(&mut self, step: &Step) -> Result<()> {
        writeln!(self.out, "> {step}")?;

        match step {
            Step::Online => self.monitor.set_connected(true),
            Step::Offline => self.monitor.set_connected(false),
            Step::Deliver(message) => self.remote.insert(&self.collection, message.clone()),
            Step::Send(text) => self.send(OutgoingMessage::text(text.as_str())).await?,
            Step::SendImage(url) => self.send(OutgoingMessage::image(url.as_str())).await?,
            Step::SendAudio(url) => self.send(OutgoingMessage::audio(url.as_str())).await?,
            Step::SendLocation {
                latitude,
                longitude,
            } => {
                self.send(OutgoingMessage::location(*latitude, *longitude))
                    .await?
            }
            Step::FailSubscription => {
                if self.remote.open_subscriptions() > 0 {
                    self.remote.fail_listeners(&self.collection, INJECTED_FAILURE);
                } else {
                    self.remote.fail_next_subscribe(INJECTED_FAILURE);
                }
            }
            Step::Teardown => self.controller.teardown().await,
        }

        self.controller.process_pending().await;
        self.report()
    }

    async fn send(&mut self, outgoing: OutgoingMessage) -> Result<()> {
        match self.publisher.send(outgoing).await {
            Ok(message) => writeln!(self.out, "sent {}", message.id())?,
            Err(e) => writeln!(self.out, "send failed: {e}")?,
        }
        Ok(())
    }

    fn report(&mut self) -> Result<()> {
        while let Ok(notice) = self.notices.try_recv() {
            writeln!(self.out, "notice: {}", describe_notice(&notice))?;
        }

        if self.updates.has_changed().unwrap_or(false) {
            let snapshot = self.updates.borrow_and_update().clone();
            writeln!(self.out, "snapshot ({} messages):", snapshot.len())?;
            for message in &snapshot {
                writeln!(self.out, "  {}", format_message(message))?;
            }
        }

        writeln!(self.out, "state: {}", state_label(&self.publisher.status()))?;
        Ok(())
    }
}

/// Run the replay command.
pub async fn run(app: &AppConfig, contents: &str) -> Result<()> {
    let steps = parse_script(contents)?;
    let mut replay = Replay::new(app, std::io::stdout());
    for step in &steps {
        replay.step(step).await?;
    }
    Ok(())
}
