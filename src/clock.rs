//! Clock engine: owns the in-game time and keeps storage in step with it
//!
//! ## Table of Contents
//! - **ClockEngine**: Load/advance/save around a [`ClockStore`]
//!
//! The engine never returns storage errors to its callers. A state that
//! cannot be read is replaced by the default one; a state that cannot be
//! written stays authoritative in memory until a later write succeeds.

use crate::metrics::TimeSyncMetrics;
use crate::storage::BoxedClockStore;
use crate::types::{ClockState, TimeSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// In-game clock backed by a state store
pub struct ClockEngine {
    state: Mutex<ClockState>,
    store: BoxedClockStore,
    metrics: Option<Arc<TimeSyncMetrics>>,
}

impl ClockEngine {
    /// Create an engine holding the default state. Call [`load`](Self::load)
    /// before the first advance.
    pub fn new(store: BoxedClockStore) -> Self {
        Self {
            state: Mutex::new(ClockState::default()),
            store,
            metrics: None,
        }
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Arc<TimeSyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load the persisted state, falling back to defaults.
    ///
    /// A missing state is defaulted and written immediately. An unreadable
    /// one is treated the same way, which overwrites the bad copy.
    pub fn load(&self) -> TimeSnapshot {
        let loaded = match self.store.read() {
            Ok(Some(mut state)) => {
                if state.normalize() {
                    warn!(
                        ticks = state.ticks,
                        day = state.day,
                        month = state.month,
                        year = state.year,
                        "Persisted clock state out of range, normalized"
                    );
                }
                Some(state)
            }
            Ok(None) => {
                info!(store = self.store.name(), "No persisted clock state, starting fresh");
                None
            }
            Err(e) => {
                warn!(
                    store = self.store.name(),
                    error = %e,
                    "Failed to load clock state, starting fresh"
                );
                None
            }
        };

        let snapshot = {
            let mut state = self.state.lock();
            *state = loaded.unwrap_or_default();
            if loaded.is_none() {
                self.persist(&state);
            }
            state.snapshot()
        };
        self.publish(&snapshot);

        info!(ticks = snapshot.ticks, date = %snapshot.date, "Clock loaded");
        snapshot
    }

    /// Move the clock forward by one step and persist it.
    ///
    /// The state lock is held across the write, so concurrent callers reach
    /// the store in the same order they stepped the clock.
    pub fn advance(&self) -> TimeSnapshot {
        let (snapshot, crossed) = {
            let mut state = self.state.lock();
            let crossed = state.step();
            self.persist(&state);
            (state.snapshot(), crossed)
        };

        if crossed {
            info!(
                total_days = snapshot.total_days,
                date = %snapshot.date,
                "Day boundary crossed"
            );
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_advance(crossed);
        }
        self.publish(&snapshot);
        snapshot
    }

    /// Current time without mutating anything
    pub fn current_snapshot(&self) -> TimeSnapshot {
        self.state.lock().snapshot()
    }

    /// Copy of the current state
    pub fn state(&self) -> ClockState {
        *self.state.lock()
    }

    /// Write the current state to the store. Failures are logged only.
    pub fn save(&self) {
        let state = self.state.lock();
        self.persist(&state);
    }

    fn persist(&self, state: &ClockState) {
        match self.store.write(state) {
            Ok(()) => debug!(store = self.store.name(), ticks = state.ticks, "Clock state saved"),
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Failed to save clock state");
                if let Some(metrics) = &self.metrics {
                    metrics.record_save_failure();
                }
            }
        }
    }

    fn publish(&self, snapshot: &TimeSnapshot) {
        if let Some(metrics) = &self.metrics {
            metrics.set_clock(snapshot.ticks, snapshot.total_days);
        }
    }
}
