//! Multi-room Line Chat Server - Entry Point
//!
//! Starts the ChatServer actor and the TCP and WebSocket listeners.

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_rooms::{serve_tcp, serve_websocket, ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_rooms=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_rooms=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Create ChatServer actor and start
    let (server, handle) = ChatServer::new();
    tokio::spawn(server.run());

    let tcp_listener = TcpListener::bind(config.tcp_addr).await?;
    info!("Chat server listening on {}", config.tcp_addr);

    let tcp_handle = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = serve_tcp(tcp_listener, tcp_handle).await {
            error!("TCP listener stopped: {}", e);
        }
    });

    if let Some(ws_addr) = config.ws_addr {
        let ws_listener = TcpListener::bind(ws_addr).await?;
        info!("WebSocket endpoint listening on ws://{}/ws", ws_addr);

        tokio::spawn(async move {
            if let Err(e) = serve_websocket(ws_listener, handle).await {
                error!("WebSocket listener stopped: {}", e);
            }
        });
    }

    // No internal stop protocol; the process ends on a signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
