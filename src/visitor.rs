//! Visitor actor implementation
//!
//! A visitor owns one client connection and runs it as two tasks:
//! - the read half parses lines into commands and chat, and never
//!   processes input while a room change is in flight;
//! - the write half drains the visitor's outbox to the connection.
//!
//! A supervisor waits for both halves, then asks the routing actor to
//! take the visitor out of its room and destroy it.

use tokio::io::{
    AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter, ReadHalf, Take, WriteHalf,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::message::{
    self, format_line, server_notice, trim_line_end, Command, LengthGuard, LineCheck,
};
use crate::room::RoomHandle;
use crate::server::{Rename, RoomChange, ServerMailbox};
use crate::signal::{gate, GateWait, Signal};
use crate::types::{Connection, RoomTarget, VisitorId, MAX_MESSAGE_LENGTH};

/// Unterminated input buffered at any instant is bounded by this quota
const MAX_LINE_BYTES: u64 = ((MAX_MESSAGE_LENGTH as u64) << 2) + 1;

type Input = BufReader<Take<ReadHalf<Connection>>>;
type Output = BufWriter<WriteHalf<Connection>>;

/// Address of a visitor as seen by rooms and the routing actor
#[derive(Debug, Clone)]
pub struct VisitorRef {
    pub id: VisitorId,
    /// Outbound mailbox drained by the write half
    pub outbox: mpsc::Sender<String>,
}

impl VisitorRef {
    /// Queue a line for the client, waiting while the outbox is full
    pub async fn send(&self, line: String) {
        if self.outbox.send(line).await.is_err() {
            debug!("Visitor {} is gone, dropping line", self.id);
        }
    }
}

/// Close notifications shared by the two halves and the supervisor
#[derive(Debug, Clone, Default)]
struct CloseSignals {
    read_closed: Signal,
    write_closed: Signal,
    closed: Signal,
}

/// A connected client, ready to run
pub struct Visitor {
    visitor: VisitorRef,
    connection: Connection,
    outbox_rx: mpsc::Receiver<String>,
    name: watch::Receiver<String>,
    server: ServerMailbox,
    first_room: GateWait<Option<RoomHandle>>,
}

impl Visitor {
    /// `first_room` is opened by the room the routing actor placed the
    /// visitor in; no input is read before that.
    pub fn new(
        visitor: VisitorRef,
        connection: Connection,
        outbox_rx: mpsc::Receiver<String>,
        name: watch::Receiver<String>,
        server: ServerMailbox,
        first_room: GateWait<Option<RoomHandle>>,
    ) -> Self {
        Self {
            visitor,
            connection,
            outbox_rx,
            name,
            server,
            first_room,
        }
    }

    /// Run both halves, then have the routing actor destroy the visitor
    pub async fn run(self) {
        let id = self.visitor.id;
        let signals = CloseSignals::default();
        let (read_half, write_half) = tokio::io::split(self.connection);
        let (room_tx, room_rx) = watch::channel(None);

        let reader = LineReader {
            visitor: self.visitor.clone(),
            input: BufReader::new(read_half.take(MAX_LINE_BYTES)),
            name: self.name,
            server: self.server.clone(),
            room: None,
            published: room_tx,
            pending: Some(self.first_room),
            signals: signals.clone(),
        };
        let writer = LineWriter {
            output: BufWriter::new(write_half),
            outbox: self.outbox_rx,
            signals: signals.clone(),
        };

        let read_task = tokio::spawn(reader.run());
        let write_task = tokio::spawn(writer.run());

        // A half that panics never fires its own signal
        let (read, write) = tokio::join!(
            async {
                let read = read_task.await;
                signals.read_closed.fire();
                read
            },
            async {
                let write = write_task.await;
                signals.write_closed.fire();
                write
            },
        );
        signals.closed.fire();

        let input = finished("Read", id, read);
        let output = finished("Write", id, write);
        // Published by the read half after every transition, so it survives a panic
        let last_room = room_rx.borrow().clone();

        // Leave the current room (if any), then get destroyed
        let (gate, destroyed) = gate();
        let request = RoomChange {
            visitor: self.visitor,
            current: last_room,
            target: RoomTarget::Void,
            gate,
        };
        if self.server.room_changes.send(request).await.is_ok() {
            destroyed.wait().await;
        } else {
            warn!("Routing actor stopped before visitor {} was destroyed", id);
        }

        if let (Some(input), Some(output)) = (input, output) {
            let connection = input.into_inner().into_inner().unsplit(output.into_inner());
            drop(connection);
        }

        info!("Visitor {} closed", id);
    }
}

/// Output of a finished half, or `None` if it panicked
fn finished<T>(half: &str, id: VisitorId, result: Result<T, JoinError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} task of visitor {} failed: {}", half, id, e);
            None
        }
    }
}

/// Read half: client lines → commands, chat and requests
struct LineReader {
    visitor: VisitorRef,
    input: Input,
    name: watch::Receiver<String>,
    server: ServerMailbox,
    /// Room this visitor currently belongs to
    room: Option<RoomHandle>,
    /// Mirror of `room` for the supervisor
    published: watch::Sender<Option<RoomHandle>>,
    /// Room change in flight
    pending: Option<GateWait<Option<RoomHandle>>>,
    signals: CloseSignals,
}

impl LineReader {
    async fn run(mut self) -> Input {
        let mut guard = LengthGuard::new();
        let mut chunk = Vec::new();

        loop {
            // Never read mid-transition
            if let Some(pending) = self.pending.take() {
                self.room = pending.wait().await;
                self.published.send_replace(self.room.clone());
            }

            if self.signals.write_closed.is_fired() || self.signals.closed.is_fired() {
                break;
            }

            chunk.clear();
            let read = tokio::select! {
                read = self.input.read_until(b'\n', &mut chunk) => read,
                _ = self.signals.write_closed.fired() => break,
                _ = self.signals.closed.fired() => break,
            };

            let consumed = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!("Read error for visitor {}: {}", self.visitor.id, e);
                    break;
                }
            };

            // Replenish the quota by what was consumed
            let quota = self.input.get_mut();
            quota.set_limit(quota.limit() + consumed as u64);

            let text = String::from_utf8_lossy(&chunk);
            if let LineCheck::Discard { notify } = guard.check(&text) {
                if notify {
                    self.notify(message::MESSAGE_TOO_LONG).await;
                }
                continue;
            }

            match Command::parse(trim_line_end(&text)) {
                Command::Exit => break,
                Command::ShowRoom => {
                    let reply = match &self.room {
                        Some(room) => message::current_room(room.name()),
                        None => message::IN_NO_ROOM.to_string(),
                    };
                    self.notify(&reply).await;
                }
                Command::ChangeRoom(id) => {
                    if !self.change_room(RoomTarget::Room(id)).await {
                        break;
                    }
                }
                Command::ShowName => {
                    let reply = message::current_name(&self.name.borrow());
                    self.notify(&reply).await;
                }
                Command::ChangeName(requested) => {
                    let rename = Rename {
                        visitor: self.visitor.id,
                        requested,
                    };
                    if self.server.renames.send(rename).await.is_err() {
                        break;
                    }
                }
                Command::Chat(text) => self.chat(&text).await,
                Command::Ignore => {}
            }
        }

        self.signals.read_closed.fire();
        debug!("Read half of visitor {} ended", self.visitor.id);
        self.input
    }

    /// Start a room change; the next loop iteration waits for it
    async fn change_room(&mut self, target: RoomTarget) -> bool {
        let (gate, wait) = gate();
        let request = RoomChange {
            visitor: self.visitor.clone(),
            current: self.room.take(),
            target,
            gate,
        };

        match self.server.room_changes.send(request).await {
            Ok(()) => {
                self.pending = Some(wait);
                true
            }
            Err(mpsc::error::SendError(request)) => {
                self.room = request.current;
                false
            }
        }
    }

    async fn chat(&self, text: &str) {
        match &self.room {
            None => debug!("Visitor {} is in no room, dropping line", self.visitor.id),
            Some(room) if room.is_lobby() => self.notify(message::LOBBY_REMINDER).await,
            Some(room) => {
                let line = format_line(&self.name.borrow(), text);
                room.broadcast(line).await;
            }
        }
    }

    async fn notify(&self, text: &str) {
        self.visitor.send(server_notice(text)).await;
    }
}

/// Write half: outbox → connection
struct LineWriter {
    output: Output,
    outbox: mpsc::Receiver<String>,
    signals: CloseSignals,
}

impl LineWriter {
    async fn run(mut self) -> Output {
        loop {
            tokio::select! {
                _ = self.signals.read_closed.fired() => break,
                _ = self.signals.closed.fired() => break,
                line = self.outbox.recv() => {
                    let Some(line) = line else { break };
                    if let Err(e) = self.write_batch(line).await {
                        debug!("Write error: {}", e);
                        break;
                    }
                }
            }
        }

        // Half-close toward the peer; a failure here means it is already gone
        if let Err(e) = self.output.shutdown().await {
            debug!("Shutdown error: {}", e);
        }
        self.signals.write_closed.fire();
        self.output
    }

    /// Write `first` plus whatever is already queued, then flush once
    async fn write_batch(&mut self, first: String) -> std::io::Result<()> {
        self.output.write_all(first.as_bytes()).await?;
        while let Ok(line) = self.outbox.try_recv() {
            self.output.write_all(line.as_bytes()).await?;
        }
        self.output.flush().await
    }
}
