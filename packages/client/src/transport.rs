//! # Transport
//!
//! One reconnecting WebSocket per editor session. [`ReconnectState`] holds the
//! connection status and backoff arithmetic; [`Transport::spawn`] drives it
//! from a tokio task.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use loupe_transform::{decode_server_message, ClientMessage, ServerMessage};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// `min(initial * 2^attempt, max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub status: ConnectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Connection status plus retry bookkeeping
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempts: u32,
    connection: Connection,
    intentional_close: bool,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            connection: Connection {
                status: ConnectionStatus::Disconnected,
                last_error: None,
            },
            intentional_close: false,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_connecting(&mut self) {
        self.connection.status = ConnectionStatus::Connecting;
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
        self.connection = Connection {
            status: ConnectionStatus::Connected,
            last_error: None,
        };
    }

    /// Record an unexpected close or failed connect. Returns how long to wait
    /// before the next attempt, or `None` when no retry should happen.
    pub fn on_close(&mut self, reason: Option<String>) -> Option<Duration> {
        if self.intentional_close {
            self.connection.status = ConnectionStatus::Disconnected;
            return None;
        }

        if self.attempts >= self.policy.max_attempts {
            let detail = reason.map(|r| format!(": {}", r)).unwrap_or_default();
            self.connection = Connection {
                status: ConnectionStatus::Error,
                last_error: Some(format!(
                    "Connection lost after {} reconnect attempts{}",
                    self.attempts, detail
                )),
            };
            return None;
        }

        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        self.connection = Connection {
            status: ConnectionStatus::Disconnected,
            last_error: reason,
        };
        Some(delay)
    }

    /// Intentional close: no further reconnects
    pub fn close(&mut self) {
        self.intentional_close = true;
        self.connection.status = ConnectionStatus::Disconnected;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    StatusChanged(Connection),
    Message(ServerMessage),
}

pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Queue a message; it is delivered once connected
    pub fn send(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.outbound.send(message).map_err(|_| TransportError::Closed)
    }

    /// Stop reconnecting, close the socket and wait for the task to end
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Transport task ended abnormally: {}", e);
        }
    }
}

pub struct Transport;

impl Transport {
    /// Start the connection task. Events arrive on the returned receiver.
    pub fn spawn(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        heartbeat: Option<Duration>,
    ) -> (TransportHandle, mpsc::UnboundedReceiver<TransportEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            url: url.into(),
            state: ReconnectState::new(policy),
            heartbeat,
            outbound: outbound_rx,
            queue: VecDeque::new(),
            shutdown: shutdown_rx,
            events: events_tx,
            pings: 0,
        };
        let task = tokio::spawn(worker.run());

        let handle = TransportHandle {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task,
        };
        (handle, events_rx)
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
    Shutdown,
    Closed(Option<String>),
}

struct Worker {
    url: String,
    state: ReconnectState,
    heartbeat: Option<Duration>,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    /// Messages taken off the channel but not yet written
    queue: VecDeque<ClientMessage>,
    shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<TransportEvent>,
    pings: u64,
}

impl Worker {
    async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.state.on_connecting();
            self.emit_status();
            debug!(url = %self.url, attempt = self.state.attempts(), "Connecting");

            let connected = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = self.shutdown.changed() => break,
            };

            let delay = match connected {
                Ok((socket, _)) => {
                    info!(url = %self.url, "Connected");
                    self.state.on_open();
                    self.emit_status();
                    match self.session(socket).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed(reason) => {
                            warn!(url = %self.url, reason = ?reason, "Connection closed");
                            self.state.on_close(reason)
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, "Connect failed: {}", e);
                    self.state.on_close(Some(e.to_string()))
                }
            };
            self.emit_status();

            let Some(delay) = delay else {
                // Out of attempts; the status already says why
                return;
            };
            debug!(delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        self.state.close();
        self.emit_status();
    }

    async fn session(&mut self, socket: Socket) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();

        while let Some(message) = self.queue.pop_front() {
            if let Err(reason) = write(&mut sink, &message).await {
                self.queue.push_front(message);
                return SessionEnd::Closed(Some(reason));
            }
        }

        let mut heartbeat = self.heartbeat.map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
                outbound = self.outbound.recv() => {
                    let Some(message) = outbound else {
                        // Every handle is gone
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    };
                    if let Err(reason) = write(&mut sink, &message).await {
                        self.queue.push_front(message);
                        return SessionEnd::Closed(Some(reason));
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.on_text(&text),
                    Some(Ok(Message::Close(frame))) => {
                        return SessionEnd::Closed(frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Closed(Some(e.to_string())),
                    None => return SessionEnd::Closed(None),
                },
                _ = tick(&mut heartbeat) => {
                    self.pings += 1;
                    let ping = ClientMessage::Ping { id: format!("heartbeat-{}", self.pings) };
                    if let Err(reason) = write(&mut sink, &ping).await {
                        return SessionEnd::Closed(Some(reason));
                    }
                }
            }
        }
    }

    fn on_text(&self, text: &str) {
        match decode_server_message(text) {
            Ok(ServerMessage::Unknown) => warn!("Ignoring server message of unknown type: {}", text),
            Ok(message) => {
                let _ = self.events.send(TransportEvent::Message(message));
            }
            Err(e) => warn!("Ignoring unparseable server message: {}", e),
        }
    }

    fn emit_status(&self) {
        let _ = self
            .events
            .send(TransportEvent::StatusChanged(self.state.connection().clone()));
    }
}

async fn write<S>(sink: &mut S, message: &ClientMessage) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(message).map_err(|e| e.to_string())?;
    sink.send(Message::Text(text)).await.map_err(|e| e.to_string())
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
