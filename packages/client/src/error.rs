use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport task has stopped")]
    Closed,
}
