//! WebSocket → byte-stream adapter
//!
//! The chat core speaks newline-terminated lines over a byte stream.
//! This module bridges a WebSocket onto an in-memory duplex pipe:
//! every inbound text frame becomes one line, every outbound line
//! becomes one text frame.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadHalf,
    WriteHalf,
};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

/// Pipe buffer between the bridge and the visitor
const BRIDGE_BUFFER_SIZE: usize = 4096;

/// Start bridging `ws` and return the stream the visitor runs on
///
/// The bridge ends when either side closes; the other side then sees EOF.
pub fn bridge<S>(ws: WebSocketStream<S>) -> DuplexStream
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (chat_side, bridge_side) = tokio::io::duplex(BRIDGE_BUFFER_SIZE);
    tokio::spawn(run_bridge(ws, bridge_side));
    chat_side
}

/// Each direction owns its half, so a stalled direction never blocks the other
async fn run_bridge<S>(ws: WebSocketStream<S>, pipe: DuplexStream)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (ws_sender, ws_receiver) = ws.split();
    let (pipe_reader, pipe_writer) = tokio::io::split(pipe);

    let inbound = tokio::spawn(forward_frames(ws_receiver, pipe_writer));
    forward_lines(pipe_reader, ws_sender).await;

    // The visitor is gone; nobody reads further frames
    inbound.abort();
    debug!("WebSocket bridge ended");
}

/// WebSocket → pipe: every text frame becomes one line
async fn forward_frames<S>(
    mut ws_receiver: SplitStream<WebSocketStream<S>>,
    mut pipe_writer: WriteHalf<DuplexStream>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if pipe_writer.write_all(text.as_bytes()).await.is_err()
                    || pipe_writer.write_all(b"\n").await.is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Only text frames carry chat lines
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }

    debug!("WebSocket peer closed");
    let _ = pipe_writer.shutdown().await;
}

/// Pipe → WebSocket: every line becomes one text frame
async fn forward_lines<S>(
    pipe_reader: ReadHalf<DuplexStream>,
    mut ws_sender: SplitSink<WebSocketStream<S>, Message>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut pipe_reader = BufReader::new(pipe_reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match pipe_reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line).into_owned();
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = ws_sender.close().await;
}
