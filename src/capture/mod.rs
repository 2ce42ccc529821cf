//! Frame capture plumbing.
//!
//! Frames reach the history either live, from a capture thread pushing
//! through a [`CaptureFeed`], or from a recording on disk replayed through
//! the same feed.

pub mod feed;
pub mod replay;
pub mod types;

// Re-export commonly used types
pub use feed::{CaptureFeed, FeedError, FrameSender, DEFAULT_QUEUE_CAPACITY};
pub use replay::{load_recording, parse_recording, save_recording, spawn_replay, RecordingError};
pub use types::{FrameSample, Recording};
