//! Multi-room Line Chat Server Library
//!
//! A line-oriented chat server built on tokio, using the Actor pattern
//! for all shared state.
//!
//! # Features
//! - Raw TCP and WebSocket (`/ws`) clients
//! - Generated visitor names, `/name` to rename
//! - Permanent Lobby plus rooms created on demand with `/room <id>`
//! - Bounded rooms (32 members) and bounded mailboxes (backpressure)
//! - Over-long line rejection with bounded read buffering
//!
//! # Architecture
//! Uses the Actor pattern with bounded `mpsc` channels:
//! - `ChatServer` is the routing actor owning the room and name registries
//! - Each `Room` actor owns its member list and fans out broadcasts
//! - Each `Visitor` runs a read task and a write task over its connection
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_rooms::{serve_tcp, ChatServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:9981").await.unwrap();
//!     let (server, handle) = ChatServer::new();
//!
//!     tokio::spawn(server.run());
//!     serve_tcp(listener, handle).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod signal;
pub mod types;
pub mod visitor;
pub mod websocket;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::{AppError, NameError};
pub use handler::{serve_tcp, serve_websocket};
pub use room::{Room, RoomHandle};
pub use server::{ChatServer, ServerHandle};
pub use types::{Connection, Transport, VisitorId};
pub use visitor::Visitor;
