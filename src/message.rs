//! Line protocol definitions
//!
//! Server → client lines are `[HH:MM:SS] <sender>> <text>\n`.
//! Client → server lines are either commands (`/exit`, `/room [id]`,
//! `/name [new_name]`, matched by case-sensitive prefix) or chat content.

use chrono::Local;

use crate::types::{MAX_MESSAGE_LENGTH, MAX_VISITOR_NAME_LENGTH, MIN_VISITOR_NAME_LENGTH};

/// Sender shown on notices produced by the server itself
pub const SERVER_SENDER: &str = "Server";

pub const ENTERED_ROOM: &str = "<= you entered this room.";
pub const LEFT_ROOM: &str = "<= you left this room.";
pub const ROOM_FULL: &str = "Sorry, I am full. :(";
pub const MESSAGE_TOO_LONG: &str = "your message is too long!";
pub const LOBBY_REMINDER: &str =
    "you are currently in lobby, please input /room room_name to enter a room";
pub const IN_NO_ROOM: &str = "you are in lobby now";

/// Format one outbound line stamped with the local time
pub fn format_line(sender: &str, text: &str) -> String {
    let stamp = Local::now().format("%H:%M:%S");
    format!("[{stamp}] {sender}> {text}\n")
}

/// Format a line sent on behalf of the server
pub fn server_notice(text: &str) -> String {
    format_line(SERVER_SENDER, text)
}

pub fn welcome(name: &str) -> String {
    format!("your name: {name}. You can input /name new_name to change your name.")
}

pub fn current_room(display_name: &str) -> String {
    format!("you are in {display_name} now")
}

pub fn current_name(name: &str) -> String {
    format!("your name is {name}")
}

pub fn name_changed(name: &str) -> String {
    format!("you changed your name to {name}")
}

/// Delete the characters not allowed in room IDs and visitor names
pub fn normalize_name(name: &str) -> String {
    name.chars().filter(|c| !matches!(c, '{' | '}')).collect()
}

/// Strip a trailing `\n` or `\r\n`
pub fn trim_line_end(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Client → server line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/exit`
    Exit,
    /// `/room` without argument
    ShowRoom,
    /// `/room <id>`, ID already normalized
    ChangeRoom(String),
    /// `/name` without argument
    ShowName,
    /// `/name <new_name>`
    ChangeName(String),
    /// Anything else
    Chat(String),
    /// Nothing to do (blank line, unusable argument)
    Ignore,
}

impl Command {
    /// Parse a line with its terminator already removed
    pub fn parse(line: &str) -> Self {
        if line.starts_with("/exit") {
            return Self::Exit;
        }

        if let Some(arg) = line.strip_prefix("/room") {
            let arg = arg.trim();
            if arg.is_empty() {
                return Self::ShowRoom;
            }
            let id = normalize_name(arg);
            if id.is_empty() {
                return Self::Ignore;
            }
            return Self::ChangeRoom(id);
        }

        if let Some(arg) = line.strip_prefix("/name") {
            let arg = arg.trim();
            if arg.is_empty() {
                return Self::ShowName;
            }
            let len = arg.chars().count();
            if (MIN_VISITOR_NAME_LENGTH..=MAX_VISITOR_NAME_LENGTH).contains(&len) {
                return Self::ChangeName(arg.to_string());
            }
            return Self::Ignore;
        }

        if line.trim().is_empty() {
            return Self::Ignore;
        }

        Self::Chat(line.to_string())
    }
}

/// Outcome of checking one chunk of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCheck {
    /// Process the line
    Accept,
    /// Drop the line, telling the client only when `notify` is set
    Discard { notify: bool },
}

/// Tracks over-long lines across read chunks
///
/// A line longer than `MAX_MESSAGE_LENGTH` may arrive as several
/// unterminated chunks; the client is warned once and every chunk up to
/// and including the terminating newline is dropped.
#[derive(Debug, Default)]
pub struct LengthGuard {
    in_long_line: bool,
}

impl LengthGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check one chunk as returned by the line reader (terminator included)
    pub fn check(&mut self, chunk: &str) -> LineCheck {
        let terminated = chunk.ends_with('\n');
        let len = trim_line_end(chunk).chars().count();

        if len > MAX_MESSAGE_LENGTH {
            let notify = !self.in_long_line;
            self.in_long_line = !terminated;
            LineCheck::Discard { notify }
        } else if self.in_long_line {
            // Tail of a line that was already reported.
            self.in_long_line = false;
            LineCheck::Discard { notify: false }
        } else {
            LineCheck::Accept
        }
    }
}
