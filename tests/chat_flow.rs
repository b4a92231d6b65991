//! End-to-end chat scenarios over in-memory connections

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::time::timeout;

use chat_rooms::{ChatServer, ServerHandle};

const READ_TIMEOUT: Duration = Duration::from_secs(3);

fn start_server() -> ServerHandle {
    let (server, handle) = ChatServer::new();
    tokio::spawn(server.run());
    handle
}

struct TestClient {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    name: String,
}

impl TestClient {
    /// Connect and wait until the visitor has been placed in the Lobby
    async fn connect(server: &ServerHandle) -> Self {
        let (client_side, server_side) = tokio::io::duplex(16 * 1024);
        server
            .on_new_connection(Box::new(server_side))
            .await
            .expect("server closed");

        let (reader, writer) = tokio::io::split(client_side);
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            name: String::new(),
        };

        let welcome = client.expect("your name: ").await;
        client.name = parse_name(&welcome);
        client.expect("Lobby> <= you entered this room.").await;
        client
    }

    /// Next line, or an empty string on EOF
    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .expect("read failed");
        line
    }

    /// Skip lines until one contains `needle`
    async fn expect(&mut self, needle: &str) -> String {
        loop {
            let line = self.read_line().await;
            assert!(!line.is_empty(), "EOF while waiting for '{needle}'");
            if line.contains(needle) {
                return line;
            }
        }
    }

    /// Like `expect`, but gives up quietly after `wait`
    async fn try_expect(&mut self, needle: &str, wait: Duration) -> Option<String> {
        timeout(wait, async {
            loop {
                let mut line = String::new();
                match self.reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => return None,
                    Ok(_) if line.contains(needle) => return Some(line),
                    Ok(_) => {}
                }
            }
        })
        .await
        .ok()
        .flatten()
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write failed");
    }

    async fn join(&mut self, room: &str) {
        self.send(&format!("/room {room}")).await;
        self.expect(&format!("Room#{room}> <= you entered this room.")).await;
    }
}

fn parse_name(welcome: &str) -> String {
    let rest = welcome
        .split("your name: ")
        .nth(1)
        .expect("no name in welcome");
    rest.split('.').next().unwrap().to_string()
}

fn is_visitor_name(name: &str) -> bool {
    name.strip_prefix("visitor_")
        .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Retry a rename until the name has been released by its former owner
async fn rename_eventually(client: &mut TestClient, name: &str) -> bool {
    for _ in 0..30 {
        client.send(&format!("/name {name}")).await;
        let changed = format!("you changed your name to {name}");
        if client
            .try_expect(&changed, Duration::from_millis(100))
            .await
            .is_some()
        {
            return true;
        }
    }
    false
}

#[tokio::test]
async fn test_lobby_reminder_then_room_chat() {
    let server = start_server();

    let mut first = TestClient::connect(&server).await;
    assert!(is_visitor_name(&first.name), "bad name {}", first.name);

    first.send("hello").await;
    first
        .expect("Server> you are currently in lobby, please input /room room_name to enter a room")
        .await;

    first.send("/room 1").await;
    first.expect("Lobby> <= you left this room.").await;
    first.expect("Room#1> <= you entered this room.").await;

    let mut second = TestClient::connect(&server).await;
    assert_ne!(first.name, second.name);
    second.send("/room 1").await;
    second.send("hi").await;

    let line = first.expect(&format!("{}> hi", second.name)).await;
    assert!(line.starts_with('['));
    assert!(line.ends_with(&format!("] {}> hi\n", second.name)));
}

#[tokio::test]
async fn test_full_room_rejects_33rd_visitor() {
    let server = start_server();
    let mut members = Vec::new();

    for _ in 0..32 {
        let mut client = TestClient::connect(&server).await;
        client.join("crowded").await;
        members.push(client);
    }

    let mut late = TestClient::connect(&server).await;
    late.send("/room crowded").await;
    late.expect("Room#crowded> Sorry, I am full. :(").await;

    late.send("/room").await;
    late.expect("Server> you are in lobby now").await;

    // Still free to go elsewhere
    late.join("overflow").await;
    late.send("/room").await;
    late.expect("you are in Room#overflow now").await;
}

#[tokio::test]
async fn test_room_report_after_change() {
    let server = start_server();
    let mut client = TestClient::connect(&server).await;

    client.send("/room").await;
    client.expect("you are in Lobby now").await;

    // Second line is only read once the transition is complete
    client.send("/room X").await;
    client.send("/room").await;
    client.expect("Server> you are in Room#X now").await;
}

#[tokio::test]
async fn test_long_line_is_reported_once_and_dropped() {
    let server = start_server();
    let mut sender = TestClient::connect(&server).await;
    let mut listener = TestClient::connect(&server).await;
    sender.join("long").await;
    listener.join("long").await;

    let long = "a".repeat(2000);
    sender
        .writer
        .write_all(long.as_bytes())
        .await
        .expect("write failed");
    tokio::time::sleep(Duration::from_millis(50)).await;
    sender.send("").await;
    sender.send("after").await;

    let mut notices = 0;
    loop {
        let line = sender.read_line().await;
        assert!(!line.is_empty(), "unexpected EOF");
        assert!(!line.contains("aaaa"), "long line was broadcast");
        if line.contains("your message is too long!") {
            notices += 1;
        }
        if line.contains(&format!("{}> after", sender.name)) {
            break;
        }
    }
    assert_eq!(notices, 1);

    loop {
        let line = listener.read_line().await;
        assert!(!line.is_empty(), "unexpected EOF");
        assert!(!line.contains("aaaa"), "long line was broadcast");
        if line.contains(&format!("{}> after", sender.name)) {
            break;
        }
    }
}

#[tokio::test]
async fn test_broadcast_skips_non_members() {
    let server = start_server();
    let mut alice = TestClient::connect(&server).await;
    let mut bob = TestClient::connect(&server).await;
    let mut carol = TestClient::connect(&server).await;

    alice.join("a").await;
    bob.join("a").await;
    carol.join("b").await;

    alice.send("to room a").await;
    bob.expect(&format!("{}> to room a", alice.name)).await;
    alice.expect(&format!("{}> to room a", alice.name)).await;

    carol.send("/room").await;
    let line = carol.read_line().await;
    assert!(line.contains("you are in Room#b now"), "carol saw: {line}");
}

#[tokio::test]
async fn test_rename_flow() {
    let server = start_server();
    let mut alice = TestClient::connect(&server).await;
    let mut bob = TestClient::connect(&server).await;

    alice.send("/name Alice").await;
    alice.expect("Server> you changed your name to Alice").await;
    alice.send("/name").await;
    alice.expect("your name is Alice").await;

    // Taken case-insensitively: silently refused
    bob.send("/name alice").await;
    bob.send("/name").await;
    let line = bob.expect("your name is ").await;
    assert!(line.contains(&format!("your name is {}", bob.name)));

    bob.send("/name {Bob}").await;
    let line = bob.expect("you changed your name to").await;
    assert!(line.contains("you changed your name to Bob"), "got: {line}");

    alice.join("names").await;
    bob.join("names").await;
    bob.send("hey").await;
    alice.expect("Bob> hey").await;
}

#[tokio::test]
async fn test_exit_closes_connection_and_frees_name() {
    let server = start_server();
    let mut leaving = TestClient::connect(&server).await;
    let mut other = TestClient::connect(&server).await;
    let freed = leaving.name.clone();

    leaving.join("bye").await;
    leaving.send("/exit").await;

    loop {
        if leaving.read_line().await.is_empty() {
            break;
        }
    }

    assert!(rename_eventually(&mut other, &freed).await);
}

#[tokio::test]
async fn test_disconnect_does_not_stall_room() {
    let server = start_server();
    let mut gone = TestClient::connect(&server).await;
    let mut stays = TestClient::connect(&server).await;
    let gone_name = gone.name.clone();

    gone.join("busy").await;
    stays.join("busy").await;
    drop(gone);

    for i in 0..40 {
        stays.send(&format!("msg {i}")).await;
    }
    stays.expect(&format!("{}> msg 39", stays.name)).await;

    // The departed visitor was destroyed
    assert!(rename_eventually(&mut stays, &gone_name).await);
}
