use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to a Coco server or driving a reply stream
#[derive(Debug, Error)]
pub enum CocoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stream failed: {status} {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No chunk received within {0:?}")]
    Timeout(Duration),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, CocoError>;

/// Reasons a decoded JSON line could not be classified as a stream event
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("chunk has neither a chunk_type nor a type field")]
    MissingKind,

    #[error("unknown chunk kind: {0}")]
    UnknownKind(String),

    #[error("malformed chunk: {0}")]
    Malformed(#[from] serde_json::Error),
}
