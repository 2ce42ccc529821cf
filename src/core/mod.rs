//! Core functionality of the delta history engine.
//!
//! This module contains:
//! - The fixed-capacity frame ring buffer
//! - The feature registry with per-feature pause deadlines
//! - The history manager that owns both and mints query views
//! - Windowed query views and their aggregates

pub mod error;
pub mod features;
pub mod history;
pub mod manager;
pub mod query;
pub mod stats;
pub mod view;
pub mod window;

// Re-export commonly used types
pub use error::{QueryError, QueryResult};
pub use features::{FeatureRegistry, PauseDeadline, RegistryBuilder, RegistryError};
pub use history::{FrameRef, FrameStore};
pub use manager::{EngineConfig, EngineConfigError, HistoryManager};
pub use query::{evaluate, Operation, QueryOutput, QuerySpec, QuerySpecError};
pub use stats::{Reducer, SeriesSummary};
pub use view::{QueryView, Selection};
pub use window::{FrameWindow, WindowGeometry};
