//! Delta History - windowed queries over a live frame history.
//!
//! A capture thread pushes one feature vector per frame into a fixed-size
//! ring. Scripts take a view anchored at a frame and ask how named features
//! behaved over a trailing window of milliseconds: the value some time ago,
//! the min, max, mean or standard deviation over a span, the change across
//! it. Individual features can be paused so that recent frames read as NaN.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Delta History                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Capture   │──▶│   History   │──▶│ Frame Store │       │
//! │  │    Feed     │   │   Manager   │   │   (ring)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                  │              │
//! │                           ▼                  ▼              │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │  Feature    │──▶│ Query View  │       │
//! │                    │  Registry   │   │ / Selection │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use delta_history::core::{EngineConfig, FeatureRegistry, HistoryManager};
//!
//! let registry = FeatureRegistry::from_names(["speed", "altitude"]).unwrap();
//! let manager = HistoryManager::new(registry, EngineConfig::default()).unwrap();
//!
//! manager.submit_frame(&[1.0, 100.0], Utc::now()).unwrap();
//! manager.submit_frame(&[3.0, 110.0], Utc::now()).unwrap();
//!
//! let view = manager.view().unwrap();
//! assert_eq!(view.feature("speed").unwrap().current().unwrap(), 3.0);
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod logging;

// Re-export key types at crate root for convenience
pub use capture::{CaptureFeed, FrameSample, FrameSender, Recording};
pub use config::{Config, FeatureConfig};
pub use core::{
    evaluate, EngineConfig, FeatureRegistry, HistoryManager, Operation, PauseDeadline, QueryError,
    QueryOutput, QueryResult, QuerySpec, QueryView, Selection,
};
pub use diagnostics::{EngineCounters, EngineStats, SharedEngineCounters};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
