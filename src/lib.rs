//! # TimeSync
//!
//! A shared in-game clock for a cluster of game servers behind a proxy.
//! The clock advances once per second, survives restarts through a small
//! TOML state file, and is broadcast to every connected server on a named
//! binary channel.
//!
//! ## Features
//!
//! - **Clock Engine**: Tick/day/month/year state machine with calendar rollover
//! - **Persistence**: Atomic TOML state file, re-defaulted when unreadable
//! - **Broadcast**: Isolated per-server fan-out with bounded sends
//! - **Status API**: Read-only HTTP snapshot and health endpoints
//! - **Metrics**: Prometheus-compatible metrics export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use timesync::{ServerHandle, TimeSyncBuilder};
//!
//! #[tokio::main]
//! async fn main() -> timesync::Result<()> {
//!     let sync = TimeSyncBuilder::new()
//!         .with_data_dir("plugins/TimeSync")
//!         .with_server(ServerHandle::parse("lobby=127.0.0.1:25570")?)
//!         .build()?;
//!
//!     sync.run().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod networking;
pub mod protocol;
pub mod runtime;
pub mod storage;
pub mod sync;
pub mod types;

// Re-exports for ergonomic API
pub use builder::{TimeSyncBuilder, TimeSyncConfig};
pub use clock::ClockEngine;
pub use config::FileConfig;
pub use error::{Result, TimeSyncError};
pub use metrics::TimeSyncMetrics;
pub use networking::{
    HttpServer, HttpServerConfig, ServerHandle, ServerRegistry, StaticRegistry, TcpTransport,
    Transport,
};
pub use protocol::{ChannelId, TimeUpdate};
pub use runtime::{RuntimeState, TimeSync, TimeSyncHandle};
pub use storage::{ClockStore, FileStore, MemoryStore};
pub use sync::{BroadcastReport, SyncScheduler};
pub use types::{ClockState, TimeSnapshot};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::TimeSyncBuilder;
    pub use crate::error::Result;
    pub use crate::networking::{ServerHandle, ServerRegistry, Transport};
    pub use crate::runtime::TimeSync;
    pub use crate::types::{ClockState, TimeSnapshot};
}
