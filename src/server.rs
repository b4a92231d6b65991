//! ChatServer routing actor implementation
//!
//! The single actor that owns the room registry and the name registry.
//! It admits new connections, applies renames, and sequences every room
//! transition as leave (old room) → enter (new room) or leave → destroy.
//! Uses the Actor pattern with bounded mpsc mailboxes.

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{AppError, NameError};
use crate::message::{self, normalize_name, server_notice};
use crate::room::{Room, RoomHandle};
use crate::signal::{gate, Gate};
use crate::types::{
    room_key, Connection, RoomTarget, VisitorId, LOBBY_ROOM_ID, MAX_VISITOR_NAME_LENGTH,
    MIN_VISITOR_NAME_LENGTH, PENDING_CONNECTIONS_CAPACITY, RENAME_REQUESTS_CAPACITY,
    ROOM_CHANGE_REQUESTS_CAPACITY, VISITOR_OUTBOX_CAPACITY,
};
use crate::visitor::{Visitor, VisitorRef};

/// One step of a visitor's room transition
///
/// Travels visitor → server → old room (leave) → server → new room
/// (enter); whoever finishes the transition opens `gate` with the room
/// the visitor ended up in.
#[derive(Debug)]
pub struct RoomChange {
    pub visitor: VisitorRef,
    /// Room still to be left; `None` once the leave has been applied
    pub current: Option<RoomHandle>,
    pub target: RoomTarget,
    pub gate: Gate<Option<RoomHandle>>,
}

/// Rename request from a visitor
#[derive(Debug)]
pub struct Rename {
    pub visitor: VisitorId,
    pub requested: String,
}

/// Mailboxes visitors and rooms use to reach the routing actor
#[derive(Debug, Clone)]
pub struct ServerMailbox {
    pub room_changes: mpsc::Sender<RoomChange>,
    pub renames: mpsc::Sender<Rename>,
}

/// Handle given to transport listeners
#[derive(Debug, Clone)]
pub struct ServerHandle {
    connections: mpsc::Sender<Connection>,
}

impl ServerHandle {
    /// Hand an accepted connection to the server
    ///
    /// Waits while the pending-connection mailbox is full.
    pub async fn on_new_connection(&self, connection: Connection) -> Result<(), AppError> {
        self.connections
            .send(connection)
            .await
            .map_err(|_| AppError::ServerClosed)
    }
}

/// Registry entry of a live visitor
struct VisitorEntry {
    /// Publishes the current name to the visitor's read half
    name: watch::Sender<String>,
    visitor: VisitorRef,
}

/// The routing actor
pub struct ChatServer {
    /// Lower-cased room ID -> Room
    rooms: HashMap<String, RoomHandle>,
    /// Live visitors
    visitors: HashMap<VisitorId, VisitorEntry>,
    /// Lower-cased name -> visitor owning it
    names: HashMap<String, VisitorId>,
    connections_rx: mpsc::Receiver<Connection>,
    room_changes_rx: mpsc::Receiver<RoomChange>,
    renames_rx: mpsc::Receiver<Rename>,
    mailbox: ServerMailbox,
}

impl ChatServer {
    /// Create the actor and the handle for listeners; the caller spawns `run`
    pub fn new() -> (Self, ServerHandle) {
        let (connections, connections_rx) = mpsc::channel(PENDING_CONNECTIONS_CAPACITY);
        let (room_changes, room_changes_rx) = mpsc::channel(ROOM_CHANGE_REQUESTS_CAPACITY);
        let (renames, renames_rx) = mpsc::channel(RENAME_REQUESTS_CAPACITY);

        let server = Self {
            rooms: HashMap::new(),
            visitors: HashMap::new(),
            names: HashMap::new(),
            connections_rx,
            room_changes_rx,
            renames_rx,
            mailbox: ServerMailbox {
                room_changes,
                renames,
            },
        };

        (server, ServerHandle { connections })
    }

    /// Run the routing loop
    ///
    /// Starts the Lobby, then serves the three mailboxes forever.
    pub async fn run(mut self) {
        info!("ChatServer started");
        self.create_room(LOBBY_ROOM_ID);

        loop {
            tokio::select! {
                Some(connection) = self.connections_rx.recv() => {
                    self.handle_connection(connection).await;
                }
                Some(rename) = self.renames_rx.recv() => {
                    self.handle_rename(rename).await;
                }
                Some(change) = self.room_changes_rx.recv() => {
                    self.handle_room_change(change).await;
                }
                else => break,
            }
        }

        info!("ChatServer shutting down");
    }

    /// Register a visitor for a new connection, start it and send it to the Lobby
    async fn handle_connection(&mut self, connection: Connection) {
        let name = self.random_name();
        let (visitor, name_rx, outbox_rx) = self.register_visitor(name.clone());
        info!("New visitor: {}", name);
        debug!(
            "Total visitors: {}, Total rooms: {}",
            self.visitors.len(),
            self.rooms.len()
        );

        visitor.send(server_notice(&message::welcome(&name))).await;

        let (gate, first_room) = gate();
        let task = Visitor::new(
            visitor.clone(),
            connection,
            outbox_rx,
            name_rx,
            self.mailbox.clone(),
            first_room,
        );
        tokio::spawn(task.run());

        self.handle_room_change(RoomChange {
            visitor,
            current: None,
            target: RoomTarget::lobby(),
            gate,
        })
        .await;
    }

    fn register_visitor(
        &mut self,
        name: String,
    ) -> (VisitorRef, watch::Receiver<String>, mpsc::Receiver<String>) {
        let id = VisitorId::new();
        let (outbox, outbox_rx) = mpsc::channel(VISITOR_OUTBOX_CAPACITY);
        let (name_tx, name_rx) = watch::channel(name.clone());
        let visitor = VisitorRef { id, outbox };

        self.names.insert(name.to_lowercase(), id);
        self.visitors.insert(
            id,
            VisitorEntry {
                name: name_tx,
                visitor: visitor.clone(),
            },
        );

        (visitor, name_rx, outbox_rx)
    }

    /// Generate `visitor_<n>` not used by any live visitor
    fn random_name(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let name = format!("visitor_{}", rng.gen_range(10_000..10_000_000));
            if !self.names.contains_key(&name) {
                return name;
            }
        }
    }

    /// Advance a room transition by one step
    async fn handle_room_change(&mut self, mut change: RoomChange) {
        if let Some(room) = change.current.take() {
            // The room hands the request back once the leave is applied
            room.leave(change).await;
            return;
        }

        match change.target.clone() {
            RoomTarget::Void => {
                let id = change.visitor.id;
                change.gate.open(None);
                self.destroy_visitor(id);
            }
            RoomTarget::Room(id) => {
                let room = match self.rooms.get(&room_key(&id)) {
                    Some(room) => room.clone(),
                    None => self.create_room(&id),
                };
                room.enter(change).await;
            }
        }
    }

    fn create_room(&mut self, id: &str) -> RoomHandle {
        let (room, handle) = Room::new(id, self.mailbox.room_changes.clone());
        tokio::spawn(room.run());
        self.rooms.insert(room_key(id), handle.clone());
        info!("New room: {}", id);
        handle
    }

    /// Drop a visitor from both registries
    ///
    /// Its connection is released by its own supervisor once the
    /// destroy gate is open.
    fn destroy_visitor(&mut self, id: VisitorId) {
        let Some(entry) = self.visitors.remove(&id) else {
            warn!("Destroy requested for unknown visitor {}", id);
            return;
        };

        let name = entry.name.borrow().clone();
        self.names.remove(&name.to_lowercase());
        info!("Destroy visitor: {}", name);
    }

    async fn handle_rename(&mut self, rename: Rename) {
        match self.rename(rename.visitor, &rename.requested) {
            Ok(name) => {
                if let Some(entry) = self.visitors.get(&rename.visitor) {
                    entry
                        .visitor
                        .send(server_notice(&message::name_changed(&name)))
                        .await;
                }
            }
            Err(e) => {
                debug!(
                    "Rename of visitor {} to '{}' refused: {}",
                    rename.visitor, rename.requested, e
                );
            }
        }
    }

    /// Validate and apply a rename, returning the new name
    fn rename(&mut self, id: VisitorId, requested: &str) -> Result<String, NameError> {
        let name = validate_name(requested)?;
        let entry = self.visitors.get(&id).ok_or(NameError::UnknownVisitor)?;

        let key = name.to_lowercase();
        if let Some(owner) = self.names.get(&key) {
            if *owner != id {
                return Err(NameError::Taken(name));
            }
        }

        let old = entry.name.send_replace(name.clone());
        self.names.remove(&old.to_lowercase());
        self.names.insert(key, id);
        info!("Visitor {} renamed to {}", old, name);

        Ok(name)
    }
}

/// Truncate to the maximum length, strip disallowed characters and check bounds
pub fn validate_name(requested: &str) -> Result<String, NameError> {
    let truncated: String = requested.chars().take(MAX_VISITOR_NAME_LENGTH).collect();
    let name = normalize_name(&truncated);

    let len = name.chars().count();
    if !(MIN_VISITOR_NAME_LENGTH..=MAX_VISITOR_NAME_LENGTH).contains(&len) {
        return Err(NameError::Empty);
    }

    Ok(name)
}
