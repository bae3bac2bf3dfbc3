//! Networking module for TimeSync
//!
//! ## Table of Contents
//! - **ServerHandle**: Address of one downstream game server
//! - **ServerRegistry**: Source of the current downstream server list
//! - **StaticRegistry**: In-process registry backed by a concurrent map
//! - **Transport**: Point-to-point payload delivery on a named channel
//! - **TcpTransport**: One framed TCP write per delivery
//! - **HttpServer**: Axum-based read-only status API

use crate::error::{Result, TimeSyncError};
use crate::protocol::ChannelId;
use async_trait::async_trait;
use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// A downstream server reachable through the proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerHandle {
    /// Registered server name
    pub name: String,
    /// Address the server listens on for channel messages
    pub addr: SocketAddr,
}

impl ServerHandle {
    /// Create a handle
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
        }
    }

    /// Parse `name=host:port`
    pub fn parse(value: &str) -> Result<Self> {
        let (name, addr) = value
            .split_once('=')
            .ok_or_else(|| TimeSyncError::config(format!("Expected name=addr, got {:?}", value)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TimeSyncError::config(format!("Empty server name in {:?}", value)));
        }
        let addr = addr
            .trim()
            .parse()
            .map_err(|e| TimeSyncError::config(format!("Invalid address for {}: {}", name, e)))?;
        Ok(Self::new(name, addr))
    }
}

impl fmt::Display for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.addr)
    }
}

/// Source of the servers a broadcast should reach
#[async_trait]
pub trait ServerRegistry: Send + Sync {
    /// Servers connected right now
    async fn list_servers(&self) -> Vec<ServerHandle>;
}

/// Type alias for a shared registry
pub type BoxedServerRegistry = Arc<dyn ServerRegistry>;

/// Registry whose membership is managed in-process
#[derive(Debug, Default)]
pub struct StaticRegistry {
    servers: DashMap<String, SocketAddr>,
}

impl StaticRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `servers`
    pub fn from_servers(servers: impl IntoIterator<Item = ServerHandle>) -> Self {
        let registry = Self::new();
        for server in servers {
            registry.register(server);
        }
        registry
    }

    /// Add or replace a server
    pub fn register(&self, server: ServerHandle) {
        info!(server = %server, "Server registered");
        self.servers.insert(server.name, server.addr);
    }

    /// Remove a server by name
    pub fn unregister(&self, name: &str) -> Option<ServerHandle> {
        let removed = self
            .servers
            .remove(name)
            .map(|(name, addr)| ServerHandle::new(name, addr));
        if let Some(server) = &removed {
            info!(server = %server, "Server unregistered");
        }
        removed
    }

    /// Number of registered servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether no servers are registered
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[async_trait]
impl ServerRegistry for StaticRegistry {
    async fn list_servers(&self) -> Vec<ServerHandle> {
        let mut servers: Vec<ServerHandle> = self
            .servers
            .iter()
            .map(|e| ServerHandle::new(e.key().clone(), *e.value()))
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }
}

/// Delivery of one opaque payload to one server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` to `server` on `channel`. No acknowledgement is awaited.
    async fn send(&self, server: &ServerHandle, channel: &ChannelId, payload: Bytes) -> Result<()>;
}

/// Type alias for a shared transport
pub type BoxedTransport = Arc<dyn Transport>;

/// TCP transport: connect, write one frame, close
///
/// Frame layout: `u16` channel length, channel bytes, `u32` payload length,
/// payload. All integers big-endian.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport with the given connect timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Build the frame written for one delivery
    pub fn frame(channel: &ChannelId, payload: &[u8]) -> Result<Bytes> {
        let channel = channel.to_string();
        let channel_len = u16::try_from(channel.len())
            .map_err(|_| TimeSyncError::protocol("Channel id too long"))?;
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| TimeSyncError::protocol("Payload too long"))?;

        let mut buf = BytesMut::with_capacity(2 + channel.len() + 4 + payload.len());
        buf.put_u16(channel_len);
        buf.put_slice(channel.as_bytes());
        buf.put_u32(payload_len);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, server: &ServerHandle, channel: &ChannelId, payload: Bytes) -> Result<()> {
        let frame = Self::frame(channel, &payload)?;

        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(server.addr))
            .await
            .map_err(|_| TimeSyncError::network(format!("Connect to {} timed out", server)))?
            .map_err(|e| TimeSyncError::network(format!("Connect to {} failed: {}", server, e)))?;

        stream
            .write_all(&frame)
            .await
            .map_err(|e| TimeSyncError::network(format!("Write to {} failed: {}", server, e)))?;
        stream
            .shutdown()
            .await
            .map_err(|e| TimeSyncError::network(format!("Close of {} failed: {}", server, e)))?;

        debug!(server = %server, bytes = frame.len(), "Frame sent");
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Bind address
    pub bind_addr: SocketAddr,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 8090).into(),
        }
    }
}

impl HttpServerConfig {
    /// Create with custom bind address
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse from string address
    pub fn with_addr_str(self, addr: &str) -> Result<Self> {
        let addr = addr
            .parse()
            .map_err(|e| TimeSyncError::config(format!("Invalid address: {}", e)))?;
        Ok(self.with_addr(addr))
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// HTTP status code
    pub code: u16,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// HTTP server wrapper
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: HttpServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
        }
    }

    /// Set the router
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Start the server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| TimeSyncError::network(format!("Failed to bind: {}", e)))?;

        info!(addr = %self.config.bind_addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .await
            .map_err(|e| TimeSyncError::network(format!("Server error: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_http_config_default() {
        let config = HttpServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8090);
        assert!(HttpServerConfig::default().with_addr_str("nope").is_err());
    }

    #[test]
    fn test_server_handle_parse() {
        let server = ServerHandle::parse("lobby=127.0.0.1:25570").unwrap();
        assert_eq!(server.name, "lobby");
        assert_eq!(server.addr.port(), 25570);
        assert_eq!(server.to_string(), "lobby@127.0.0.1:25570");

        assert!(ServerHandle::parse("lobby").is_err());
        assert!(ServerHandle::parse("=127.0.0.1:1").is_err());
        assert!(ServerHandle::parse("lobby=localhost").is_err());
    }

    #[tokio::test]
    async fn test_static_registry_membership() {
        let registry = StaticRegistry::from_servers([
            ServerHandle::parse("survival=127.0.0.1:3002").unwrap(),
            ServerHandle::parse("lobby=127.0.0.1:3001").unwrap(),
        ]);
        assert_eq!(registry.len(), 2);

        let names: Vec<String> = registry
            .list_servers()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["lobby", "survival"]);

        assert!(registry.unregister("lobby").is_some());
        assert!(registry.unregister("lobby").is_none());
        assert_eq!(registry.list_servers().await.len(), 1);
    }

    #[test]
    fn test_frame_layout() {
        let channel = ChannelId::default();
        let frame = TcpTransport::frame(&channel, b"abc").unwrap();

        assert_eq!(&frame[..2], &13u16.to_be_bytes());
        assert_eq!(&frame[2..15], b"timesync:time");
        assert_eq!(&frame[15..19], &3u32.to_be_bytes());
        assert_eq!(&frame[19..], b"abc");
    }

    #[tokio::test]
    async fn test_tcp_transport_delivers_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let reader = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let server = ServerHandle::new("lobby", addr);
        let channel = ChannelId::default();
        TcpTransport::default()
            .send(&server, &channel, Bytes::from_static(b"payload"))
            .await
            .unwrap();

        let received = reader.await.unwrap();
        let expected = TcpTransport::frame(&channel, b"payload").unwrap();
        assert_eq!(received, expected.to_vec());
    }

    #[tokio::test]
    async fn test_tcp_transport_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = ServerHandle::new("gone", addr);
        let err = TcpTransport::default()
            .send(&server, &ChannelId::default(), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TimeSyncError::Network(_)));
    }
}
