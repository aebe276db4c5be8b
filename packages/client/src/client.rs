//! Ties the edit machine to a live transport

use std::time::Duration;

use loupe_source::SourceLocator;
use loupe_transform::{ClientMessage, TransformType};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::machine::{EditMachine, Effect, Event, MachineConfig, Notification};
use crate::transport::{Connection, ConnectionStatus, Transport, TransportEvent, TransportHandle};

/// An editor session connected to a server.
///
/// `Send` effects are forwarded to the socket; every other effect is returned
/// for the host to carry out.
pub struct EditorClient {
    machine: EditMachine,
    transport: TransportHandle,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    connection: Connection,
}

impl EditorClient {
    /// Spawn the transport; must be called inside a tokio runtime
    pub fn connect(config: ClientConfig) -> Self {
        let heartbeat = config.heartbeat_ms.map(Duration::from_millis);
        let (transport, events) = Transport::spawn(config.url.clone(), config.reconnect, heartbeat);
        let machine = EditMachine::new(MachineConfig {
            session_id: config.session_id,
            commit_grace_ms: config.commit_grace_ms,
        });

        Self {
            machine,
            transport,
            events,
            connection: Connection {
                status: ConnectionStatus::Disconnected,
                last_error: None,
            },
        }
    }

    pub fn machine(&self) -> &EditMachine {
        &self.machine
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>, ClientError> {
        let effects = self.machine.handle(event);
        self.route(effects)
    }

    /// Wait for the next server-driven change. Returns `None` once the
    /// transport has stopped for good.
    pub async fn next_event(&mut self) -> Option<Vec<Effect>> {
        let event = self.events.recv().await?;
        let effects = match event {
            TransportEvent::StatusChanged(connection) => {
                debug!(status = ?connection.status, "Connection status changed");
                self.connection = connection.clone();
                vec![Effect::Notify(Notification::ConnectionChanged { connection })]
            }
            TransportEvent::Message(message) => self.machine.handle(Event::ServerMessage(message)),
        };
        Some(effects)
    }

    pub fn dispatch<C: Serialize>(
        &mut self,
        transform_type: TransformType,
        target: SourceLocator,
        change: &C,
    ) -> Result<String, ClientError> {
        let (id, effects) = self.machine.dispatch(transform_type, target, change)?;
        self.route(effects)?;
        Ok(id)
    }

    /// Revert the newest committed edit, returns the id of the revert request
    pub fn undo(&mut self) -> Result<Option<String>, ClientError> {
        let Some((id, effects)) = self.machine.undo()? else {
            return Ok(None);
        };
        self.route(effects)?;
        Ok(Some(id))
    }

    pub fn dismiss_failure(&mut self, id: &str) -> bool {
        self.machine.dismiss_failure(id)
    }

    /// Tear the machine down and close the connection
    pub async fn shutdown(mut self) -> Vec<Effect> {
        let effects = self.machine.teardown();
        self.transport.close().await;
        effects
    }

    /// A transform that cannot be queued is resolved as failed before the
    /// error is returned, so it never stays pending.
    fn route(&mut self, effects: Vec<Effect>) -> Result<Vec<Effect>, ClientError> {
        let mut local = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                Effect::Send(message) => {
                    let id = match &message {
                        ClientMessage::Transform { id, .. } => id.as_str().map(str::to_string),
                        ClientMessage::Ping { .. } => None,
                    };
                    if let Err(e) = self.transport.send(message) {
                        if let Some(id) = id {
                            warn!(id = %id, "Transform could not be sent: {}", e);
                            self.machine.fail_pending(&id, e.to_string());
                        }
                        return Err(e.into());
                    }
                }
                other => local.push(other),
            }
        }
        Ok(local)
    }
}
