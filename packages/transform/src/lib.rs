//! # Loupe Transform
//!
//! Turns a UI edit into a verified source mutation.
//!
//! A [`Registry`] maps a transform type to its handler. Each request is
//! validated against the handler's change schema, executed against a
//! [`TransformContext`], and answered with a [`TransformResult`] carrying
//! undo data on success.
//!
//! ```rust,ignore
//! let registry = Registry::with_builtin_handlers();
//! let mut context = TransformContext::new(SourceEngine::new(root));
//! let result = registry.execute_raw(&raw_request, &mut context);
//! ```

pub mod error;
pub mod handler;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod request;

pub use error::{RegistryError, TransformError, ValidationIssue};
pub use handler::{Applied, TransformContext, TransformHandler};
pub use handlers::{CssAddHandler, CssRemoveHandler, CssUpdateHandler, TextUpdateHandler};
pub use loupe_source::ErrorCode;
pub use protocol::{
    decode_client_message, decode_server_message, ClientMessage, Inbound, ProtocolError,
    ServerMessage,
};
pub use registry::{Registry, RegistryBuilder};
pub use request::{
    CssAddChange, CssRemoveChange, CssUpdateChange, TextUpdateChange, TransformRequest,
    TransformResult, TransformType, UndoData,
};
