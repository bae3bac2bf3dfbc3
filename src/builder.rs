//! TimeSyncBuilder for configuring and constructing TimeSync instances
//!
//! ## Table of Contents
//! - **TimeSyncBuilder**: Builder pattern for TimeSync configuration
//! - **TimeSyncConfig**: Complete configuration struct

use crate::clock::ClockEngine;
use crate::error::{Result, TimeSyncError};
use crate::metrics::TimeSyncMetrics;
use crate::networking::{
    BoxedServerRegistry, BoxedTransport, HttpServerConfig, ServerHandle, StaticRegistry,
    TcpTransport,
};
use crate::protocol::ChannelId;
use crate::runtime::TimeSync;
use crate::storage::{BoxedClockStore, FileStore};
use crate::sync::SyncScheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default directory holding `time.toml`
pub const DEFAULT_DATA_DIR: &str = "plugins/TimeSync";

/// Complete TimeSync configuration
#[derive(Debug, Clone)]
pub struct TimeSyncConfig {
    /// Directory of the persisted clock state
    pub data_dir: PathBuf,
    /// Time between two advances
    pub interval: Duration,
    /// Channel broadcasts are sent on
    pub channel: ChannelId,
    /// Upper bound for one per-server send
    pub send_timeout: Duration,
    /// Upper bound for opening a TCP connection
    pub connect_timeout: Duration,
    /// Status API; disabled when `None`
    pub http_config: Option<HttpServerConfig>,
    /// Enable metrics
    pub metrics_enabled: bool,
    /// Node name used in logs and the health endpoint
    pub node_name: String,
    /// Downstream servers for the built-in registry
    pub servers: Vec<ServerHandle>,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            interval: Duration::from_secs(1),
            channel: ChannelId::default(),
            send_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(250),
            http_config: None,
            metrics_enabled: true,
            node_name: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "timesync-node".to_string()),
            servers: Vec::new(),
        }
    }
}

impl TimeSyncConfig {
    fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(TimeSyncError::config("interval must be greater than zero"));
        }
        if self.send_timeout.is_zero() || self.send_timeout >= self.interval {
            return Err(TimeSyncError::config(format!(
                "send timeout ({:?}) must be non-zero and shorter than the interval ({:?})",
                self.send_timeout, self.interval
            )));
        }
        Ok(())
    }
}

/// Builder for constructing TimeSync instances
pub struct TimeSyncBuilder {
    config: TimeSyncConfig,
    store: Option<BoxedClockStore>,
    registry: Option<BoxedServerRegistry>,
    transport: Option<BoxedTransport>,
}

impl TimeSyncBuilder {
    /// Create a new TimeSyncBuilder with default configuration
    pub fn new() -> Self {
        Self {
            config: TimeSyncConfig::default(),
            store: None,
            registry: None,
            transport: None,
        }
    }

    /// Set the data directory holding `time.toml`
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the advance interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the broadcast channel
    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.config.channel = channel;
        self
    }

    /// Set the broadcast channel from `namespace:name`
    pub fn with_channel_str(mut self, channel: &str) -> Result<Self> {
        self.config.channel = channel.parse()?;
        Ok(self)
    }

    /// Set the per-server send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout = timeout;
        self
    }

    /// Set the TCP connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Enable the status API with this configuration
    pub fn with_http_config(mut self, config: HttpServerConfig) -> Self {
        self.config.http_config = Some(config);
        self
    }

    /// Enable the status API on an address
    pub fn with_http_addr(mut self, addr: &str) -> Result<Self> {
        let config = HttpServerConfig::default().with_addr_str(addr)?;
        Ok(self.with_http_config(config))
    }

    /// Enable or disable metrics
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.config.metrics_enabled = enabled;
        self
    }

    /// Set node name
    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.config.node_name = name.into();
        self
    }

    /// Add a downstream server to the built-in registry
    pub fn with_server(mut self, server: ServerHandle) -> Self {
        self.config.servers.push(server);
        self
    }

    /// Set a custom clock store
    pub fn with_store(mut self, store: BoxedClockStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a custom server registry
    pub fn with_registry(mut self, registry: BoxedServerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set a custom transport
    pub fn with_transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Current configuration
    pub fn config(&self) -> &TimeSyncConfig {
        &self.config
    }

    /// Build the TimeSync instance. Loads the clock state.
    pub fn build(self) -> Result<TimeSync> {
        self.config.validate()?;

        info!(
            node = %self.config.node_name,
            channel = %self.config.channel,
            interval_ms = self.config.interval.as_millis() as u64,
            "Building TimeSync instance"
        );

        let metrics = if self.config.metrics_enabled {
            Some(Arc::new(TimeSyncMetrics::new()?))
        } else {
            None
        };

        let store: BoxedClockStore = match self.store {
            Some(s) => s,
            None => Arc::new(FileStore::in_dir(&self.config.data_dir)) as BoxedClockStore,
        };

        let mut engine = ClockEngine::new(store);
        if let Some(m) = &metrics {
            engine = engine.with_metrics(m.clone());
        }
        engine.load();
        let engine = Arc::new(engine);

        let registry: BoxedServerRegistry = match self.registry {
            Some(r) => {
                if !self.config.servers.is_empty() {
                    warn!(
                        servers = self.config.servers.len(),
                        "Custom registry set, ignoring configured servers"
                    );
                }
                r
            }
            None => Arc::new(StaticRegistry::from_servers(self.config.servers.clone()))
                as BoxedServerRegistry,
        };

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(TcpTransport::new(self.config.connect_timeout)) as BoxedTransport
        });

        let mut scheduler = SyncScheduler::new(
            engine.clone(),
            registry,
            transport,
            self.config.channel.clone(),
            self.config.send_timeout,
        );
        if let Some(m) = &metrics {
            scheduler = scheduler.with_metrics(m.clone());
        }

        Ok(TimeSync::new(self.config, engine, scheduler, metrics))
    }
}

impl Default for TimeSyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::MockTransport;
    use crate::storage::MemoryStore;
    use crate::types::TICKS_PER_STEP;

    #[test]
    fn test_builder_default_config() {
        let builder = TimeSyncBuilder::new();
        let config = builder.config();
        assert_eq!(config.data_dir, PathBuf::from("plugins/TimeSync"));
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.channel.to_string(), "timesync:time");
        assert!(config.http_config.is_none());
    }

    #[test]
    fn test_builder_with_memory_store() {
        let sync = TimeSyncBuilder::new()
            .with_store(Arc::new(MemoryStore::new()))
            .build();
        assert!(sync.is_ok());
    }

    #[test]
    fn test_builder_creates_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let sync = TimeSyncBuilder::new()
            .with_data_dir(dir.path().join("TimeSync"))
            .with_metrics(false)
            .build()
            .unwrap();

        assert!(dir.path().join("TimeSync").join("time.toml").exists());
        assert_eq!(sync.engine().current_snapshot().ticks, 0);
    }

    #[test]
    fn test_builder_rejects_bad_timing() {
        let result = TimeSyncBuilder::new()
            .with_store(Arc::new(MemoryStore::new()))
            .with_send_timeout(Duration::from_secs(2))
            .build();
        assert!(matches!(result, Err(TimeSyncError::Config(_))));

        let result = TimeSyncBuilder::new()
            .with_store(Arc::new(MemoryStore::new()))
            .with_interval(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_channel_and_http() {
        assert!(TimeSyncBuilder::new().with_channel_str("Bad Channel").is_err());
        assert!(TimeSyncBuilder::new().with_http_addr("not-an-addr").is_err());

        let builder = TimeSyncBuilder::new()
            .with_channel_str("arknesia:clock")
            .unwrap()
            .with_http_addr("127.0.0.1:9000")
            .unwrap();
        assert_eq!(builder.config().channel.to_string(), "arknesia:clock");
        assert_eq!(
            builder.config().http_config.as_ref().map(|c| c.bind_addr.port()),
            Some(9000)
        );
    }

    #[test]
    fn test_builder_http_config_and_node_name() {
        let http = HttpServerConfig::default().with_addr(([0, 0, 0, 0], 9200).into());
        let builder = TimeSyncBuilder::new()
            .with_http_config(http)
            .with_node_name("proxy-1");
        assert_eq!(
            builder.config().http_config.as_ref().map(|c| c.bind_addr.port()),
            Some(9200)
        );
        assert_eq!(builder.config().node_name, "proxy-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_builder_injects_registry_and_transport() {
        let registry = Arc::new(StaticRegistry::new());
        registry.register(ServerHandle::new("lobby", ([127, 0, 0, 1], 25570).into()));

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|server, channel, _| {
                server.name == "lobby" && channel.to_string() == "timesync:time"
            })
            .times(2)
            .returning(|_, _, _| Ok(()));

        // Configured servers are ignored once a registry is injected
        let sync = TimeSyncBuilder::new()
            .with_store(Arc::new(MemoryStore::new()))
            .with_server(ServerHandle::new("ignored", ([127, 0, 0, 1], 25571).into()))
            .with_registry(registry)
            .with_transport(Arc::new(transport))
            .with_interval(Duration::from_millis(100))
            .with_send_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let handle = sync.handle();

        let task = tokio::spawn(sync.run());
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.shutdown();
        task.await.unwrap().unwrap();

        assert_eq!(handle.snapshot().ticks, 2 * TICKS_PER_STEP);
    }
}
