//! Server configuration
//!
//! Listener addresses come from defaults, then environment variables,
//! then positional command line arguments: `[tcp_addr] [ws_addr]`.

use std::net::SocketAddr;

use crate::error::AppError;

/// Default raw TCP chat address
pub const DEFAULT_TCP_ADDR: &str = "0.0.0.0:9981";

/// Default WebSocket (HTTP) address
pub const DEFAULT_WS_ADDR: &str = "0.0.0.0:6636";

/// Environment variable overriding the TCP address
pub const TCP_ADDR_ENV: &str = "CHAT_TCP_ADDR";

/// Environment variable overriding the WebSocket address (`off` disables it)
pub const WS_ADDR_ENV: &str = "CHAT_WS_ADDR";

const DISABLED: &str = "off";

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub tcp_addr: SocketAddr,
    /// `None` runs the TCP listener only
    pub ws_addr: Option<SocketAddr>,
}

impl ServerConfig {
    /// Build from the process environment and command line
    pub fn from_env() -> Result<Self, AppError> {
        Self::resolve(
            std::env::var(TCP_ADDR_ENV).ok(),
            std::env::var(WS_ADDR_ENV).ok(),
            std::env::args().skip(1),
        )
    }

    /// Resolve addresses; arguments win over environment values
    pub fn resolve(
        tcp_env: Option<String>,
        ws_env: Option<String>,
        mut args: impl Iterator<Item = String>,
    ) -> Result<Self, AppError> {
        let tcp = args
            .next()
            .or(tcp_env)
            .unwrap_or_else(|| DEFAULT_TCP_ADDR.to_string());
        let ws = args
            .next()
            .or(ws_env)
            .unwrap_or_else(|| DEFAULT_WS_ADDR.to_string());

        let tcp_addr = parse_addr(&tcp)?;
        let ws_addr = if ws.eq_ignore_ascii_case(DISABLED) {
            None
        } else {
            Some(parse_addr(&ws)?)
        };

        Ok(Self { tcp_addr, ws_addr })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_addr: SocketAddr::from(([0, 0, 0, 0], 9981)),
            ws_addr: Some(SocketAddr::from(([0, 0, 0, 0], 6636))),
        }
    }
}

fn parse_addr(value: &str) -> Result<SocketAddr, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Config(format!("'{value}' is not a socket address")))
}
