//! Sync scheduler: advance the clock, then fan the result out
//!
//! ## Table of Contents
//! - **SyncScheduler**: One advance plus one broadcast per invocation
//! - **BroadcastReport**: Outcome of a single invocation
//!
//! The scheduler keeps no state of its own. Server membership is read from
//! the registry on every call, and each server gets an independent send
//! bounded by the send timeout, so one slow or dead server never holds up
//! the others or the next tick.

use crate::clock::ClockEngine;
use crate::metrics::TimeSyncMetrics;
use crate::networking::{BoxedServerRegistry, BoxedTransport, ServerHandle};
use crate::protocol::{ChannelId, TimeUpdate};
use crate::types::TimeSnapshot;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one scheduler invocation
#[derive(Debug, Clone)]
pub struct BroadcastReport {
    /// Snapshot produced by the advance
    pub snapshot: TimeSnapshot,
    /// Servers that accepted the payload
    pub delivered: usize,
    /// Names of servers whose send failed or timed out
    pub failed: Vec<String>,
}

impl BroadcastReport {
    /// Number of servers targeted
    pub fn targeted(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Drives the clock engine and broadcasts each new snapshot
pub struct SyncScheduler {
    engine: Arc<ClockEngine>,
    registry: BoxedServerRegistry,
    transport: BoxedTransport,
    channel: ChannelId,
    send_timeout: Duration,
    metrics: Option<Arc<TimeSyncMetrics>>,
}

impl SyncScheduler {
    /// Create a scheduler. The engine should already be loaded.
    pub fn new(
        engine: Arc<ClockEngine>,
        registry: BoxedServerRegistry,
        transport: BoxedTransport,
        channel: ChannelId,
        send_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            registry,
            transport,
            channel,
            send_timeout,
            metrics: None,
        }
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Arc<TimeSyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The engine this scheduler advances
    pub fn engine(&self) -> &Arc<ClockEngine> {
        &self.engine
    }

    /// Channel broadcasts are sent on
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Advance the clock once and broadcast the new time
    pub async fn tick(&self) -> BroadcastReport {
        let snapshot = self.engine.advance();
        self.broadcast(snapshot).await
    }

    /// Send `snapshot` to every server currently in the registry
    pub async fn broadcast(&self, snapshot: TimeSnapshot) -> BroadcastReport {
        let started = Instant::now();

        let payload = match TimeUpdate::from(&snapshot).encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode time update");
                return BroadcastReport {
                    snapshot,
                    delivered: 0,
                    failed: Vec::new(),
                };
            }
        };

        let servers = self.registry.list_servers().await;
        let sends = servers.iter().map(|server| {
            let payload = payload.clone();
            async move { (server, self.send_one(server, payload).await) }
        });

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (server, ok) in join_all(sends).await {
            if ok {
                delivered += 1;
            } else {
                failed.push(server.name.clone());
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_broadcast(servers.len(), failed.len(), started.elapsed().as_secs_f64());
        }
        debug!(
            ticks = snapshot.ticks,
            servers = servers.len(),
            delivered,
            failed = failed.len(),
            "Time broadcast"
        );

        BroadcastReport {
            snapshot,
            delivered,
            failed,
        }
    }

    async fn send_one(&self, server: &ServerHandle, payload: bytes::Bytes) -> bool {
        let send = self.transport.send(server, &self.channel, payload);
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(server = %server.name, error = %e, "Failed to send time update");
                false
            }
            Err(_) => {
                warn!(
                    server = %server.name,
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "Time update send timed out"
                );
                false
            }
        }
    }
}
