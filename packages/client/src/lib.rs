//! # Loupe Client
//!
//! Browser-side half of the editor, without the browser. The host feeds
//! pointer, keyboard and focus events into an [`EditMachine`] and carries out
//! the returned [`Effect`]s; an [`EditorClient`] adds a reconnecting
//! WebSocket [`Transport`] to the server.

pub mod client;
pub mod config;
pub mod error;
pub mod machine;
pub mod transport;

pub use client::EditorClient;
pub use config::ClientConfig;
pub use error::{ClientError, TransportError};
pub use machine::{
    is_text_editable, EditMachine, EditState, Effect, ElementSnapshot, Event, MachineConfig,
    Notification, PendingEdit, PendingStatus, UndoEntry, DEFAULT_COMMIT_GRACE_MS,
    TEXT_EDITABLE_TAGS,
};
pub use transport::{
    Connection, ConnectionStatus, ReconnectPolicy, ReconnectState, Transport, TransportEvent,
    TransportHandle,
};
