//! Basic type definitions for the chat server
//!
//! Provides the identifiers, protocol limits and the transport contract
//! shared by the server, room and visitor actors.

use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

/// Maximum number of members in one room
pub const MAX_ROOM_CAPACITY: usize = 32;

/// Shortest accepted visitor name, in characters
pub const MIN_VISITOR_NAME_LENGTH: usize = 1;

/// Longest accepted visitor name, in characters
pub const MAX_VISITOR_NAME_LENGTH: usize = 16;

/// Longest accepted chat line, in characters
pub const MAX_MESSAGE_LENGTH: usize = 256;

/// ID of the permanent default room
pub const LOBBY_ROOM_ID: &str = "Lobby";

// Mailbox capacities; a full mailbox blocks its sender
pub const PENDING_CONNECTIONS_CAPACITY: usize = 128;
pub const ROOM_CHANGE_REQUESTS_CAPACITY: usize = 128;
pub const RENAME_REQUESTS_CAPACITY: usize = 64;
pub const ROOM_ENTER_CAPACITY: usize = MAX_ROOM_CAPACITY;
pub const ROOM_LEAVE_CAPACITY: usize = MAX_ROOM_CAPACITY;
pub const ROOM_BROADCAST_CAPACITY: usize = 64;
pub const VISITOR_OUTBOX_CAPACITY: usize = 16;

/// Unique visitor identifier (newtype pattern)
///
/// Names change over a visitor's lifetime; this ID does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitorId(pub Uuid);

impl VisitorId {
    /// Create a new random visitor ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VisitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VisitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination of a room change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomTarget {
    /// Enter the room with this (case-preserving) ID
    Room(String),
    /// Leave the current room and disconnect
    Void,
}

impl RoomTarget {
    pub fn lobby() -> Self {
        Self::Room(LOBBY_ROOM_ID.to_string())
    }
}

/// Registry key of a room ID (case-insensitive)
pub fn room_key(id: &str) -> String {
    id.to_lowercase()
}

/// Byte-stream transport a visitor runs on
///
/// Raw TCP streams and the WebSocket bridge both satisfy it.
pub trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

/// An accepted connection handed to the server
pub type Connection = Box<dyn Transport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visitor_id_unique() {
        let id1 = VisitorId::new();
        let id2 = VisitorId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_room_key_case_insensitive() {
        assert_eq!(room_key("Lobby"), room_key("LOBBY"));
        assert_eq!(room_key("Rust"), "rust");
    }

    #[test]
    fn test_connections_can_cross_tasks() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Connection>();
        assert_send_sync::<tokio::io::ReadHalf<Connection>>();
    }

    #[test]
    fn test_lobby_target() {
        assert_eq!(RoomTarget::lobby(), RoomTarget::Room("Lobby".to_string()));
    }
}
