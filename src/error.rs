//! Error types for the chat server
//!
//! Defines process-level errors and the rename validation errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// These end an accept loop or the process. Problems with a single
/// connection never surface here; they only close that connection.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket handshake or protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error (bind, accept)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The routing actor is no longer receiving connections
    #[error("Chat server closed")]
    ServerClosed,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Reasons a rename request is refused
///
/// Refusals are silent to the client; the visitor keeps its old name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// Nothing left after normalization
    #[error("name is empty")]
    Empty,

    /// Another live visitor already uses the name (case-insensitive)
    #[error("name '{0}' is already taken")]
    Taken(String),

    /// The requesting visitor is not registered
    #[error("unknown visitor")]
    UnknownVisitor,
}
