//! Runtime counters describing what the engine has done.
//!
//! Counters are cheap atomics so the capture thread and the query thread can
//! both report without contention.

pub mod counters;

// Re-export commonly used types
pub use counters::{create_shared_counters, EngineCounters, EngineStats, SharedEngineCounters};
