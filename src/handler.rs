//! Transport listeners
//!
//! Accept loops that hand raw connections to the chat server:
//! plain TCP, and WebSocket upgrades on `/ws` bridged to a byte stream.

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::server::ServerHandle;
use crate::websocket;

/// Path accepted for WebSocket upgrades
pub const WS_PATH: &str = "/ws";

/// Accept TCP connections forever
///
/// Returns only when the chat server stops taking connections.
pub async fn serve_tcp(listener: TcpListener, server: ServerHandle) -> Result<(), AppError> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New TCP connection from {}", addr);
                server.on_new_connection(Box::new(stream)).await?;
            }
            Err(e) => {
                error!("Failed to accept TCP connection: {}", e);
            }
        }
    }
}

/// Accept WebSocket connections forever
///
/// Each handshake runs in its own task so a slow client cannot stall
/// the accept loop.
pub async fn serve_websocket(listener: TcpListener, server: ServerHandle) -> Result<(), AppError> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New HTTP connection from {}", addr);
                let server = server.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_websocket(stream, server).await {
                        debug!("WebSocket connection from {} rejected: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept HTTP connection: {}", e);
            }
        }
    }
}

/// Perform the WebSocket handshake and hand the bridged stream to the server
async fn handle_websocket(stream: TcpStream, server: ServerHandle) -> Result<(), AppError> {
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, check_path).await?;
    info!("WebSocket client connected");

    server
        .on_new_connection(Box::new(websocket::bridge(ws_stream)))
        .await
}

#[allow(clippy::result_large_err)]
fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }

    let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}
