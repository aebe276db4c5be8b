//! HTTP + WebSocket surface
//!
//! Each socket owns one [`TransformContext`] and handles its messages one at a
//! time, so results come back in request order.

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use loupe_source::SourceEngine;
use loupe_style::SerializeOptions;
use loupe_transform::{
    decode_client_message, ClientMessage, Inbound, ProtocolError, Registry, ServerMessage,
    TransformContext,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub options: SerializeOptions,
    pub registry: Arc<Registry>,
    /// Changed paths from the file watcher, if one runs
    pub changes: Option<broadcast::Sender<PathBuf>>,
}

impl AppState {
    pub fn new(root: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            root: root.into(),
            options: SerializeOptions::default(),
            registry: Arc::new(registry),
            changes: None,
        }
    }

    pub fn with_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_changes(mut self, changes: broadcast::Sender<PathBuf>) -> Self {
        self.changes = Some(changes);
        self
    }

    fn context(&self) -> TransformContext {
        TransformContext::new(SourceEngine::new(&self.root)).with_options(self.options.clone())
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handle_websocket))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, create_app(state)).await
}

async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("Editor connected");

    let (mut sender, mut receiver) = socket.split();
    let mut context = state.context();
    let mut changes = state.changes.as_ref().map(broadcast::Sender::subscribe);

    if let Some(ack) = encode(&ServerMessage::Connected) {
        if sender.send(Message::Text(ack)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                };
                let Some(reply) = respond(&state.registry, &mut context, &text) else {
                    continue;
                };
                if let Err(e) = sender.send(Message::Text(reply)).await {
                    warn!("Failed to send reply: {}", e);
                    break;
                }
            }
            changed = next_change(&mut changes) => match changed {
                Ok(path) => {
                    if context.engine.invalidate(&path) {
                        debug!(path = %path.display(), "Invalidated cached file");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Missed file change events, clearing cache");
                    context.engine.clear_cache();
                }
                Err(RecvError::Closed) => changes = None,
            },
        }
    }

    info!("Editor disconnected");
}

/// Handle one inbound text frame. `None` means nothing goes back.
pub fn respond(registry: &Registry, context: &mut TransformContext, text: &str) -> Option<String> {
    let message = match decode_client_message(text) {
        Ok(Inbound::Message(message)) => message,
        Ok(Inbound::Unrecognized(value)) => {
            debug!(action = ?value.get("action"), "Echoing unrecognized message");
            return Some(text.to_string());
        }
        Err(ProtocolError::InvalidJson(e)) => {
            warn!("Ignoring unparseable message: {}", e);
            return None;
        }
        Err(e) => {
            warn!("Ignoring message: {}", e);
            return None;
        }
    };

    let reply = match &message {
        ClientMessage::Transform { id, transform_type, .. } => {
            info!(%id, %transform_type, "Transform requested");
            let body = message.request_body()?;
            ServerMessage::TransformResult(registry.execute_raw(&body, context))
        }
        ClientMessage::Ping { id } => ServerMessage::Pong {
            request_id: id.clone(),
        },
    };
    encode(&reply)
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to encode server message: {}", e);
            None
        }
    }
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<PathBuf>>,
) -> Result<PathBuf, RecvError> {
    match changes {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> TransformContext {
        TransformContext::new(SourceEngine::new(dir.path()))
    }

    #[test]
    fn test_ping_gets_pong() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::with_builtin_handlers();
        let reply = respond(&registry, &mut context(&dir), r#"{"action":"ping","id":"p1"}"#).unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply, json!({ "type": "pong", "requestId": "p1" }));
    }

    #[test]
    fn test_unknown_action_is_echoed() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::with_builtin_handlers();
        let text = r#"{"action":"subscribe","channel":"x"}"#;
        assert_eq!(respond(&registry, &mut context(&dir), text).as_deref(), Some(text));
    }

    #[test]
    fn test_bad_json_is_ignored() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::with_builtin_handlers();
        assert!(respond(&registry, &mut context(&dir), "{not json").is_none());
        assert!(respond(&registry, &mut context(&dir), "[1, 2]").is_none());
    }

    #[test]
    fn test_transform_failure_is_a_result() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::with_builtin_handlers();
        let text = json!({
            "action": "transform",
            "id": "t1",
            "type": "text-update",
            "target": { "file": "Missing.tsx", "lineNumber": 1, "column": 1 },
            "change": { "originalText": "", "newText": "Hi" }
        })
        .to_string();

        let reply = respond(&registry, &mut context(&dir), &text).unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["type"], "transform-result");
        assert_eq!(reply["requestId"], "t1");
        assert_eq!(reply["success"], false);
        assert_eq!(reply["error"]["code"], "FILE_NOT_FOUND");
    }

    #[test]
    fn test_numeric_id_gets_a_validation_result() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::with_builtin_handlers();
        let text = json!({
            "action": "transform",
            "id": 1,
            "type": "text-update",
            "target": { "file": "Card.tsx", "lineNumber": 1, "column": 1 },
            "change": { "originalText": "", "newText": "Hi" }
        })
        .to_string();

        let reply: Value =
            serde_json::from_str(&respond(&registry, &mut context(&dir), &text).unwrap()).unwrap();
        assert_eq!(reply["type"], "transform-result");
        assert_eq!(reply["requestId"], "1");
        assert_eq!(reply["success"], false);
        assert_eq!(reply["error"]["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_unknown_transform_type() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::with_builtin_handlers();
        let text = json!({
            "action": "transform",
            "id": "t2",
            "type": "rename-component",
            "target": {},
            "change": {}
        })
        .to_string();

        let reply: Value =
            serde_json::from_str(&respond(&registry, &mut context(&dir), &text).unwrap()).unwrap();
        assert_eq!(reply["error"]["code"], "VALIDATION_ERROR");
    }
}
