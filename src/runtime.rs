//! TimeSync runtime
//!
//! ## Table of Contents
//! - **TimeSync**: Main runtime struct driving the sync loop
//! - **TimeSyncHandle**: Handle for interacting with a running TimeSync

use crate::builder::TimeSyncConfig;
use crate::clock::ClockEngine;
use crate::error::Result;
use crate::metrics::TimeSyncMetrics;
use crate::networking::{ErrorResponse, HttpServer};
use crate::sync::SyncScheduler;
use crate::types::TimeSnapshot;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Not started
    Stopped,
    /// Starting up
    Starting,
    /// Running normally
    Running,
    /// Shutting down
    ShuttingDown,
}

/// Main TimeSync runtime
pub struct TimeSync {
    config: TimeSyncConfig,
    state: Arc<RwLock<RuntimeState>>,
    start_time: Option<Instant>,

    // Core components
    engine: Arc<ClockEngine>,
    scheduler: SyncScheduler,
    metrics: Option<Arc<TimeSyncMetrics>>,

    // Shutdown signal; the receiver is taken at construction so a signal
    // sent before `run` is not lost
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

/// Cloneable handle to a TimeSync that may already be running
#[derive(Clone)]
pub struct TimeSyncHandle {
    engine: Arc<ClockEngine>,
    state: Arc<RwLock<RuntimeState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TimeSyncHandle {
    /// Current clock snapshot
    pub fn snapshot(&self) -> TimeSnapshot {
        self.engine.current_snapshot()
    }

    /// Current runtime state
    pub async fn state(&self) -> RuntimeState {
        *self.state.read().await
    }

    /// Ask the runtime to stop after the current tick
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl TimeSync {
    /// Create a new TimeSync instance (use TimeSyncBuilder instead)
    pub(crate) fn new(
        config: TimeSyncConfig,
        engine: Arc<ClockEngine>,
        scheduler: SyncScheduler,
        metrics: Option<Arc<TimeSyncMetrics>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            config,
            state: Arc::new(RwLock::new(RuntimeState::Stopped)),
            start_time: None,
            engine,
            scheduler,
            metrics,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &TimeSyncConfig {
        &self.config
    }

    /// Get current runtime state
    pub async fn state(&self) -> RuntimeState {
        *self.state.read().await
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Get the clock engine
    pub fn engine(&self) -> &Arc<ClockEngine> {
        &self.engine
    }

    /// Get metrics instance
    pub fn metrics(&self) -> Option<&Arc<TimeSyncMetrics>> {
        self.metrics.as_ref()
    }

    /// Get a handle usable after `run` has taken ownership
    pub fn handle(&self) -> TimeSyncHandle {
        TimeSyncHandle {
            engine: self.engine.clone(),
            state: self.state.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Run the sync loop until shutdown is signalled
    pub async fn run(mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state = RuntimeState::Starting;
        }

        let snapshot = self.engine.current_snapshot();
        info!(
            node_name = %self.config.node_name,
            channel = %self.scheduler.channel(),
            ticks = snapshot.ticks,
            date = %snapshot.date,
            "Starting TimeSync"
        );

        self.start_time = Some(Instant::now());

        if let Some(http_config) = self.config.http_config.clone() {
            let router = self.build_http_router();
            let server = HttpServer::new(http_config).with_router(router);
            let mut http_shutdown = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    result = server.serve() => {
                        if let Err(e) = result {
                            error!(error = %e, "HTTP server error");
                        }
                    }
                    _ = http_shutdown.recv() => {
                        debug!("HTTP server stopping");
                    }
                }
            });
        }

        {
            let mut state = self.state.write().await;
            *state = RuntimeState::Running;
        }

        info!("TimeSync running");

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the first advance happens one
        // full interval after start.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.scheduler.tick().await;
                    if !report.failed.is_empty() {
                        debug!(failed = ?report.failed, "Some servers missed this update");
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Shutdown the runtime, persisting the final clock state
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == RuntimeState::Stopped {
                return Ok(());
            }
            *state = RuntimeState::ShuttingDown;
        }

        info!("Shutting down TimeSync");

        self.engine.save();

        // Stops the HTTP server, if any
        let _ = self.shutdown_tx.send(());

        {
            let mut state = self.state.write().await;
            *state = RuntimeState::Stopped;
        }

        let snapshot = self.engine.current_snapshot();
        info!(ticks = snapshot.ticks, date = %snapshot.date, "TimeSync stopped");
        Ok(())
    }

    // HTTP router

    fn build_http_router(&self) -> Router {
        let state = Arc::new(StatusState {
            engine: self.engine.clone(),
            metrics: self.metrics.clone(),
            node_name: self.config.node_name.clone(),
            started: Instant::now(),
            started_at: Utc::now(),
        });

        Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/api/v1/time", get(time_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
    }
}

// HTTP state for handlers; read-only access to the engine
struct StatusState {
    engine: Arc<ClockEngine>,
    metrics: Option<Arc<TimeSyncMetrics>>,
    node_name: String,
    started: Instant,
    started_at: DateTime<Utc>,
}

// HTTP handlers

async fn health_handler(State(state): State<Arc<StatusState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
        "node": state.node_name,
        "started_at": state.started_at.to_rfc3339(),
    }))
}

async fn ready_handler() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}

async fn time_handler(State(state): State<Arc<StatusState>>) -> Json<TimeSnapshot> {
    Json(state.engine.current_snapshot())
}

async fn metrics_handler(
    State(state): State<Arc<StatusState>>,
) -> std::result::Result<String, ErrorResponse> {
    match &state.metrics {
        Some(m) => m.gather_text().map_err(|e| ErrorResponse {
            error: e.to_string(),
            code: 500,
        }),
        None => Err(ErrorResponse {
            error: "metrics disabled".to_string(),
            code: 404,
        }),
    }
}
