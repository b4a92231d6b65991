//! Room actor implementation
//!
//! Each room owns its ordered member list and runs as its own task,
//! multiplexing enter, leave and broadcast mailboxes. Rooms are created
//! lazily by the routing actor and live for the rest of the process.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::message::{self, format_line};
use crate::server::RoomChange;
use crate::types::{
    LOBBY_ROOM_ID, MAX_ROOM_CAPACITY, ROOM_BROADCAST_CAPACITY, ROOM_ENTER_CAPACITY,
    ROOM_LEAVE_CAPACITY,
};
use crate::visitor::VisitorRef;

/// Cloneable address of a running room
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: String,
    name: String,
    enter: mpsc::Sender<RoomChange>,
    leave: mpsc::Sender<RoomChange>,
    broadcast: mpsc::Sender<String>,
}

impl RoomHandle {
    /// Room ID as first requested (case-preserving)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name: "Lobby" or "Room#<id>"
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_lobby(&self) -> bool {
        self.id == LOBBY_ROOM_ID
    }

    /// Ask the room to admit the visitor of `request`
    pub async fn enter(&self, request: RoomChange) {
        if self.enter.send(request).await.is_err() {
            warn!("Room {} stopped, dropping enter request", self.id);
        }
    }

    /// Ask the room to remove the visitor of `request`
    ///
    /// The room hands the request back to the routing actor afterwards.
    pub async fn leave(&self, request: RoomChange) {
        if self.leave.send(request).await.is_err() {
            warn!("Room {} stopped, dropping leave request", self.id);
        }
    }

    /// Queue a formatted line for every current member
    pub async fn broadcast(&self, line: String) {
        if self.broadcast.send(line).await.is_err() {
            debug!("Room {} stopped, dropping broadcast", self.id);
        }
    }
}

/// Room actor state
pub struct Room {
    handle: RoomHandle,
    /// Members in join order
    members: Vec<VisitorRef>,
    enter_rx: mpsc::Receiver<RoomChange>,
    leave_rx: mpsc::Receiver<RoomChange>,
    broadcast_rx: mpsc::Receiver<String>,
    /// Routing actor's room-change mailbox
    room_changes: mpsc::Sender<RoomChange>,
}

impl Room {
    /// Create a room and its handle; the caller spawns `run`
    pub fn new(id: &str, room_changes: mpsc::Sender<RoomChange>) -> (Self, RoomHandle) {
        let (enter, enter_rx) = mpsc::channel(ROOM_ENTER_CAPACITY);
        let (leave, leave_rx) = mpsc::channel(ROOM_LEAVE_CAPACITY);
        let (broadcast, broadcast_rx) = mpsc::channel(ROOM_BROADCAST_CAPACITY);

        let name = if id == LOBBY_ROOM_ID {
            id.to_string()
        } else {
            format!("Room#{id}")
        };

        let handle = RoomHandle {
            id: id.to_string(),
            name,
            enter,
            leave,
            broadcast,
        };

        let room = Self {
            handle: handle.clone(),
            members: Vec::new(),
            enter_rx,
            leave_rx,
            broadcast_rx,
            room_changes,
        };

        (room, handle)
    }

    /// Run the room event loop
    pub async fn run(mut self) {
        info!("Room {} started", self.handle.id);

        loop {
            tokio::select! {
                Some(request) = self.leave_rx.recv() => self.handle_leave(request).await,
                Some(request) = self.enter_rx.recv() => self.handle_enter(request).await,
                Some(line) = self.broadcast_rx.recv() => self.handle_broadcast(line).await,
                else => break,
            }
        }

        info!("Room {} stopped", self.handle.id);
    }

    async fn handle_leave(&mut self, request: RoomChange) {
        let visitor_id = request.visitor.id;

        match self.members.iter().position(|m| m.id == visitor_id) {
            Some(index) => {
                self.members.remove(index);
                debug!(
                    "Visitor {} left {} ({} members)",
                    visitor_id,
                    self.handle.id,
                    self.members.len()
                );
                request.visitor.send(self.notice(message::LEFT_ROOM)).await;
            }
            None => {
                warn!(
                    "Leave request for visitor {} who is not in {}",
                    visitor_id, self.handle.id
                );
            }
        }

        // Hand back to the routing actor so the transition can continue
        if self.room_changes.send(request).await.is_err() {
            warn!("Routing actor stopped, visitor {} is stranded", visitor_id);
        }
    }

    async fn handle_enter(&mut self, request: RoomChange) {
        let visitor = &request.visitor;

        if self.members.iter().any(|m| m.id == visitor.id) {
            warn!(
                "Visitor {} is already a member of {}",
                visitor.id, self.handle.id
            );
            request.gate.open(Some(self.handle.clone()));
            return;
        }

        if self.members.len() >= MAX_ROOM_CAPACITY {
            debug!(
                "Room {} is full, rejecting visitor {}",
                self.handle.id, visitor.id
            );
            visitor.send(self.notice(message::ROOM_FULL)).await;
            request.gate.open(None);
            return;
        }

        self.members.push(visitor.clone());
        debug!(
            "Visitor {} entered {} ({} members)",
            visitor.id,
            self.handle.id,
            self.members.len()
        );
        visitor.send(self.notice(message::ENTERED_ROOM)).await;
        request.gate.open(Some(self.handle.clone()));
    }

    /// Deliver to members in join order, waiting on full mailboxes
    async fn handle_broadcast(&mut self, line: String) {
        for member in &self.members {
            member.send(line.clone()).await;
        }
    }

    fn notice(&self, text: &str) -> String {
        format_line(&self.handle.name, text)
    }
}
