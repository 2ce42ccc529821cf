//! Ownership of one run's frame history and feature registry.
//!
//! The manager is the capture side's entry point (`submit_frame`) and the
//! script side's source of query views. Cloning it is cheap: clones share the
//! same history, so one clone can live on the capture thread while another
//! serves queries.

use crate::core::error::{QueryError, QueryResult};
use crate::core::features::FeatureRegistry;
use crate::core::history::FrameStore;
use crate::core::view::{QueryView, ViewSource};
use crate::core::window::WindowGeometry;
use crate::diagnostics::{create_shared_counters, SharedEngineCounters};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Fixed parameters of a history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of frames kept in the ring
    pub capacity: usize,
    /// Nominal sampling rate in frames per second
    pub frame_rate: f64,
    /// Window length used when a query omits one
    pub default_window_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 600,
            frame_rate: 60.0,
            default_window_ms: 250,
        }
    }
}

/// Rejected engine parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineConfigError {
    #[error("history capacity must be at least 2 frames, got {0}")]
    Capacity(usize),
    #[error("frame rate must be a positive finite number, got {0}")]
    FrameRate(f64),
    #[error("default window must not be negative, got {0}ms")]
    DefaultWindow(i64),
    #[error("no features are registered")]
    NoFeatures,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        if self.capacity < 2 {
            return Err(EngineConfigError::Capacity(self.capacity));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(EngineConfigError::FrameRate(self.frame_rate));
        }
        if self.default_window_ms < 0 {
            return Err(EngineConfigError::DefaultWindow(self.default_window_ms));
        }
        Ok(())
    }

    pub(crate) fn geometry(&self) -> WindowGeometry {
        WindowGeometry::new(self.frame_rate, self.capacity, self.default_window_ms)
    }
}

/// Owns the frame history of one run and mints query views over it.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    store: Arc<RwLock<FrameStore>>,
    registry: Arc<FeatureRegistry>,
    config: EngineConfig,
    counters: SharedEngineCounters,
    run_id: Uuid,
}

impl HistoryManager {
    /// Create a manager with an empty history sized for `registry`.
    pub fn new(registry: FeatureRegistry, config: EngineConfig) -> Result<Self, EngineConfigError> {
        Self::with_counters(registry, config, create_shared_counters())
    }

    /// Create a manager that reports into existing counters.
    pub fn with_counters(
        registry: FeatureRegistry,
        config: EngineConfig,
        counters: SharedEngineCounters,
    ) -> Result<Self, EngineConfigError> {
        config.validate()?;
        if registry.feature_count() == 0 {
            return Err(EngineConfigError::NoFeatures);
        }

        let store = FrameStore::new(config.capacity, registry.feature_count());
        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            capacity = config.capacity,
            frame_rate = config.frame_rate,
            features = registry.feature_count(),
            "frame history created"
        );

        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            registry: Arc::new(registry),
            config,
            counters,
            run_id,
        })
    }

    /// Push one captured frame.
    ///
    /// Returns the frame's logical index. A frame whose width differs from
    /// the feature count is rejected and leaves the history untouched.
    pub fn submit_frame(&self, values: &[f64], timestamp: DateTime<Utc>) -> QueryResult<u64> {
        let expected = self.registry.feature_count();
        if values.len() != expected {
            self.counters.record_frame_rejected();
            tracing::warn!(expected, got = values.len(), "rejected frame with wrong width");
            return Err(QueryError::FrameWidthMismatch {
                expected,
                got: values.len(),
            });
        }

        let index = self.store.write().append(values, timestamp);
        self.counters.record_frame_accepted();
        tracing::trace!(index, %timestamp, "frame stored");
        Ok(index)
    }

    /// View anchored at the most recent frame.
    pub fn view(&self) -> QueryResult<QueryView> {
        let latest = self
            .store
            .read()
            .latest_index()
            .ok_or(QueryError::EmptyEngine)?;
        self.view_at(latest)
    }

    /// View anchored at a logical frame index.
    pub fn view_at(&self, frame_index: u64) -> QueryResult<QueryView> {
        QueryView::anchored(self.source(), self.config.geometry(), frame_index)
    }

    /// Drop every frame and pause for a fresh run.
    pub fn reset(&self) {
        self.store.write().clear();
        self.registry.resume_all();
        tracing::info!(run_id = %self.run_id, "frame history reset");
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn frame_rate(&self) -> f64 {
        self.config.frame_rate
    }

    pub fn default_window_ms(&self) -> i64 {
        self.config.default_window_ms
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn frames_written(&self) -> u64 {
        self.store.read().frames_written()
    }

    pub fn latest_index(&self) -> Option<u64> {
        self.store.read().latest_index()
    }

    pub fn counters(&self) -> &SharedEngineCounters {
        &self.counters
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn source(&self) -> ViewSource {
        ViewSource {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            counters: Arc::clone(&self.counters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn manager(capacity: usize) -> HistoryManager {
        let registry = FeatureRegistry::from_names(["hp", "mp"]).unwrap();
        let config = EngineConfig {
            capacity,
            frame_rate: 10.0,
            default_window_ms: 200,
        };
        HistoryManager::new(registry, config).unwrap()
    }

    #[test]
    fn test_config_validation() {
        let registry = || FeatureRegistry::from_names(["hp"]).unwrap();
        let bad_rate = EngineConfig {
            frame_rate: 0.0,
            ..EngineConfig::default()
        };
        assert_eq!(
            HistoryManager::new(registry(), bad_rate).unwrap_err(),
            EngineConfigError::FrameRate(0.0)
        );

        let bad_capacity = EngineConfig {
            capacity: 1,
            ..EngineConfig::default()
        };
        assert_eq!(
            HistoryManager::new(registry(), bad_capacity).unwrap_err(),
            EngineConfigError::Capacity(1)
        );

        let empty = FeatureRegistry::from_names(Vec::<String>::new()).unwrap();
        assert_eq!(
            HistoryManager::new(empty, EngineConfig::default()).unwrap_err(),
            EngineConfigError::NoFeatures
        );
    }

    #[test]
    fn test_view_requires_frames() {
        let manager = manager(4);
        assert_eq!(manager.view().unwrap_err(), QueryError::EmptyEngine);
    }

    #[test]
    fn test_submit_frame_checks_width() {
        let manager = manager(4);
        assert_eq!(
            manager.submit_frame(&[1.0], t0()),
            Err(QueryError::FrameWidthMismatch {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(manager.frames_written(), 0);
        assert_eq!(manager.counters().stats().frames_rejected, 1);
    }

    #[test]
    fn test_view_at_bounds() {
        let manager = manager(3);
        for i in 0..5 {
            manager
                .submit_frame(&[i as f64, 0.0], t0() + Duration::milliseconds(i * 100))
                .unwrap();
        }

        assert_eq!(manager.view().unwrap().origin_index(), 4);
        assert_eq!(manager.view_at(2).unwrap().frame_index(), 2);
        assert_eq!(
            manager.view_at(1).unwrap_err(),
            QueryError::FrameEvicted {
                requested: 1,
                oldest: 2
            }
        );
        assert_eq!(
            manager.view_at(5).unwrap_err(),
            QueryError::FrameNotCaptured {
                requested: 5,
                latest: 4
            }
        );
    }

    #[test]
    fn test_reset_clears_history_and_pauses() {
        let manager = manager(4);
        manager.submit_frame(&[1.0, 2.0], t0()).unwrap();
        manager.view().unwrap().pause_all().unwrap();

        manager.reset();

        assert_eq!(manager.frames_written(), 0);
        assert_eq!(manager.registry().paused_until(0), None);
        assert_eq!(manager.view().unwrap_err(), QueryError::EmptyEngine);
    }

    #[test]
    fn test_clones_share_history() {
        let manager = manager(4);
        let capture = manager.clone();
        capture.submit_frame(&[1.0, 2.0], t0()).unwrap();
        assert_eq!(manager.latest_index(), Some(0));
    }
}
