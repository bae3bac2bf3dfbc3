//! File configuration for the TimeSync binary.
//!
//! Every section is optional; anything left out keeps the builder default.
//!
//! ```toml
//! [clock]
//! data_dir = "plugins/TimeSync"
//!
//! [sync]
//! interval_ms = 1000
//! channel = "timesync:time"
//! send_timeout_ms = 500
//! connect_timeout_ms = 250
//!
//! [http]
//! bind = "127.0.0.1:8090"
//! node_name = "proxy-1"
//!
//! [metrics]
//! enabled = true
//!
//! [[servers]]
//! name = "lobby"
//! addr = "127.0.0.1:25570"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::builder::TimeSyncBuilder;
use crate::error::{Result, TimeSyncError};
use crate::networking::ServerHandle;
use crate::protocol::ChannelId;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Clock persistence
    pub clock: ClockSection,

    /// Sync loop and broadcast settings
    pub sync: SyncSection,

    /// Status API
    pub http: HttpSection,

    /// Metrics
    pub metrics: MetricsSection,

    /// Downstream servers
    pub servers: Vec<ServerEntry>,
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TimeSyncError::Config(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TimeSyncError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply the file on top of a builder.
    pub fn apply(&self, mut builder: TimeSyncBuilder) -> Result<TimeSyncBuilder> {
        if let Some(dir) = &self.clock.data_dir {
            builder = builder.with_data_dir(dir.clone());
        }

        builder = builder
            .with_interval(Duration::from_millis(self.sync.interval_ms))
            .with_send_timeout(Duration::from_millis(self.sync.send_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.sync.connect_timeout_ms))
            .with_channel(self.sync.channel.clone())
            .with_metrics(self.metrics.enabled);

        if let Some(bind) = &self.http.bind {
            builder = builder.with_http_addr(bind)?;
        }
        if let Some(name) = &self.http.node_name {
            builder = builder.with_node_name(name.clone());
        }

        for server in &self.servers {
            builder = builder.with_server(ServerHandle::new(server.name.clone(), server.addr));
        }

        Ok(builder)
    }
}

/// Clock persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSection {
    /// Directory holding `time.toml`
    pub data_dir: Option<PathBuf>,
}

/// Sync loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// Milliseconds between advances
    pub interval_ms: u64,
    /// Broadcast channel
    pub channel: ChannelId,
    /// Per-server send timeout in milliseconds
    pub send_timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            channel: ChannelId::default(),
            send_timeout_ms: 500,
            connect_timeout_ms: 250,
        }
    }
}

/// Status API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Bind address; the API is off when unset
    pub bind: Option<String>,
    /// Name reported by the health endpoint; defaults to the hostname
    pub node_name: Option<String>,
}

/// Metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    /// Collect Prometheus metrics
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// One downstream server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Server name
    pub name: String,
    /// Channel listener address
    pub addr: SocketAddr,
}
