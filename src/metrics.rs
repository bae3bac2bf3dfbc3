//! Metrics and monitoring for TimeSync
//!
//! ## Table of Contents
//! - **TimeSyncMetrics**: Prometheus counters and gauges for the sync loop

use crate::error::{Result, TimeSyncError};
use prometheus::{Counter, CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

/// Core metrics for TimeSync
pub struct TimeSyncMetrics {
    registry: Registry,

    // Clock metrics
    /// Clock advances
    pub advances: Counter,
    /// Day boundaries crossed
    pub day_rollovers: Counter,
    /// Current sub-day tick
    pub ticks: Gauge,
    /// Elapsed in-game days
    pub total_days: Gauge,
    /// Failed state writes
    pub save_failures: Counter,

    // Broadcast metrics
    /// Per-server sends by result
    pub broadcast_sends: CounterVec,
    /// Fan-out duration
    pub broadcast_duration: Histogram,
    /// Servers targeted by the last broadcast
    pub connected_servers: Gauge,
}

impl TimeSyncMetrics {
    /// Create a new metrics instance
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let advances = Counter::new("timesync_advances_total", "Total clock advances")?;
        let day_rollovers =
            Counter::new("timesync_day_rollovers_total", "Total in-game day boundaries crossed")?;
        let ticks = Gauge::new("timesync_ticks", "Current sub-day tick")?;
        let total_days = Gauge::new("timesync_total_days", "Elapsed in-game days")?;
        let save_failures =
            Counter::new("timesync_save_failures_total", "Failed clock state writes")?;

        let broadcast_sends = CounterVec::new(
            Opts::new("timesync_broadcast_sends_total", "Per-server broadcast deliveries"),
            &["result"],
        )?;
        let broadcast_duration = Histogram::with_opts(
            HistogramOpts::new("timesync_broadcast_duration_seconds", "Broadcast fan-out duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        let connected_servers =
            Gauge::new("timesync_connected_servers", "Servers targeted by the last broadcast")?;

        registry.register(Box::new(advances.clone()))?;
        registry.register(Box::new(day_rollovers.clone()))?;
        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(total_days.clone()))?;
        registry.register(Box::new(save_failures.clone()))?;
        registry.register(Box::new(broadcast_sends.clone()))?;
        registry.register(Box::new(broadcast_duration.clone()))?;
        registry.register(Box::new(connected_servers.clone()))?;

        Ok(Self {
            registry,
            advances,
            day_rollovers,
            ticks,
            total_days,
            save_failures,
            broadcast_sends,
            broadcast_duration,
            connected_servers,
        })
    }

    /// Record one clock advance
    pub fn record_advance(&self, day_rolled: bool) {
        self.advances.inc();
        if day_rolled {
            self.day_rollovers.inc();
        }
    }

    /// Mirror the clock position
    pub fn set_clock(&self, ticks: i64, total_days: i64) {
        self.ticks.set(ticks as f64);
        self.total_days.set(total_days as f64);
    }

    /// Record a failed state write
    pub fn record_save_failure(&self) {
        self.save_failures.inc();
    }

    /// Record the outcome of one broadcast
    pub fn record_broadcast(&self, servers: usize, failed: usize, duration_secs: f64) {
        let delivered = servers.saturating_sub(failed);
        self.connected_servers.set(servers as f64);
        self.broadcast_sends
            .with_label_values(&["ok"])
            .inc_by(delivered as f64);
        self.broadcast_sends
            .with_label_values(&["failed"])
            .inc_by(failed as f64);
        self.broadcast_duration.observe(duration_secs);
    }

    /// Gather all metrics as text
    pub fn gather_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TimeSyncError::metrics(format!("Encode error: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| TimeSyncError::metrics(format!("UTF8 error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = TimeSyncMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_advance() {
        let metrics = TimeSyncMetrics::new().unwrap();
        metrics.record_advance(false);
        metrics.record_advance(true);
        assert_eq!(metrics.advances.get(), 2.0);
        assert_eq!(metrics.day_rollovers.get(), 1.0);
    }

    #[test]
    fn test_record_broadcast() {
        let metrics = TimeSyncMetrics::new().unwrap();
        metrics.record_broadcast(3, 1, 0.002);

        assert_eq!(metrics.connected_servers.get(), 3.0);
        assert_eq!(metrics.broadcast_sends.with_label_values(&["ok"]).get(), 2.0);
        assert_eq!(metrics.broadcast_sends.with_label_values(&["failed"]).get(), 1.0);
    }

    #[test]
    fn test_gather_text() {
        let metrics = TimeSyncMetrics::new().unwrap();
        metrics.set_clock(18_020, 4);
        metrics.record_save_failure();

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("timesync_ticks 18020"));
        assert!(text.contains("timesync_total_days 4"));
        assert!(text.contains("timesync_save_failures_total 1"));
    }
}
