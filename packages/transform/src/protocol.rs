//! Wire messages exchanged over the editor WebSocket

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::request::{TransformRequest, TransformResult};

/// Client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Fields stay raw so the registry can report schema problems per field,
    /// including an `id` or `type` of the wrong JSON type
    Transform {
        #[serde(default)]
        id: Value,
        #[serde(rename = "type", default)]
        transform_type: Value,
        #[serde(default)]
        target: Value,
        #[serde(default)]
        change: Value,
    },
    Ping {
        #[serde(default)]
        id: String,
    },
}

impl ClientMessage {
    pub fn transform<C: Serialize>(request: &TransformRequest<C>) -> Result<Self, serde_json::Error> {
        Ok(ClientMessage::Transform {
            id: Value::String(request.id.clone()),
            transform_type: Value::String(request.transform_type.clone()),
            target: serde_json::to_value(&request.target)?,
            change: serde_json::to_value(&request.change)?,
        })
    }

    /// Request body as the registry expects it
    pub fn request_body(&self) -> Option<Value> {
        match self {
            ClientMessage::Transform {
                id,
                transform_type,
                target,
                change,
            } => Some(serde_json::json!({
                "id": id,
                "type": transform_type,
                "target": target,
                "change": change,
            })),
            ClientMessage::Ping { .. } => None,
        }
    }
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Connected,
    TransformResult(TransformResult),
    Pong {
        #[serde(rename = "requestId", default)]
        request_id: String,
    },
    /// Any type this side does not know about
    #[serde(other)]
    Unknown,
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Message is not a JSON object")]
    NotAnObject,
}

/// Inbound frame on the server side
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(ClientMessage),
    /// Recognised JSON with an action the server does not handle
    Unrecognized(Value),
}

pub fn decode_client_message(text: &str) -> Result<Inbound, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }

    let known = matches!(
        value.get("action").and_then(Value::as_str),
        Some("transform") | Some("ping")
    );
    if !known {
        return Ok(Inbound::Unrecognized(value));
    }

    Ok(Inbound::Message(serde_json::from_value(value)?))
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
