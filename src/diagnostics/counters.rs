//! Frame and query counters for one engine run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared by a history manager and its views.
#[derive(Debug)]
pub struct EngineCounters {
    /// Frames stored in the history
    frames_accepted: AtomicU64,
    /// Frames refused because of a width mismatch
    frames_rejected: AtomicU64,
    /// Reads that produced a value
    queries_served: AtomicU64,
    /// Reads that failed
    query_errors: AtomicU64,
    /// Pause deadlines installed
    pauses_installed: AtomicU64,
    /// When counting started
    started: DateTime<Utc>,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self {
            frames_accepted: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            queries_served: AtomicU64::new(0),
            query_errors: AtomicU64::new(0),
            pauses_installed: AtomicU64::new(0),
            started: Utc::now(),
        }
    }

    pub fn record_frame_accepted(&self) {
        self.frames_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_error(&self) {
        self.query_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pauses(&self, count: u64) {
        self.pauses_installed.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            query_errors: self.query_errors.load(Ordering::Relaxed),
            pauses_installed: self.pauses_installed.load(Ordering::Relaxed),
            started: self.started,
            uptime_secs: (Utc::now() - self.started).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Engine Statistics:\n\
             - Frames accepted: {}\n\
             - Frames rejected: {}\n\
             - Queries served: {}\n\
             - Query errors: {}\n\
             - Pauses installed: {}\n\
             - Uptime: {} seconds",
            stats.frames_accepted,
            stats.frames_rejected,
            stats.queries_served,
            stats.query_errors,
            stats.pauses_installed,
            stats.uptime_secs
        )
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.frames_accepted.store(0, Ordering::Relaxed);
        self.frames_rejected.store(0, Ordering::Relaxed);
        self.queries_served.store(0, Ordering::Relaxed);
        self.query_errors.store(0, Ordering::Relaxed);
        self.pauses_installed.store(0, Ordering::Relaxed);
    }
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub frames_accepted: u64,
    pub frames_rejected: u64,
    pub queries_served: u64,
    pub query_errors: u64,
    pub pauses_installed: u64,
    pub started: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared counters.
pub type SharedEngineCounters = Arc<EngineCounters>;

/// Create new shared counters.
pub fn create_shared_counters() -> SharedEngineCounters {
    Arc::new(EngineCounters::new())
}
