//! Hand-off of captured frames from a capture thread to the history.
//!
//! The capture side holds a [`FrameSender`] and pushes one sample per frame.
//! The owning side calls [`CaptureFeed::pump`] to move queued samples into
//! the history manager. Sends never block: a full queue drops the frame.

use crate::capture::types::FrameSample;
use crate::core::HistoryManager;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default number of frames that may wait in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;

/// Errors that can occur while feeding frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("capture feed is already running")]
    AlreadyRunning,
    #[error("capture feed is stopped")]
    Stopped,
    #[error("capture queue is full; frame dropped")]
    Full,
    #[error("capture feed has been dropped")]
    Disconnected,
}

/// Producer handle given to a capture thread.
#[derive(Debug, Clone)]
pub struct FrameSender {
    sender: Sender<FrameSample>,
    running: Arc<AtomicBool>,
}

impl FrameSender {
    /// Queue one frame.
    pub fn send(&self, sample: FrameSample) -> Result<(), FeedError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(FeedError::Stopped);
        }
        self.sender.try_send(sample).map_err(|e| match e {
            TrySendError::Full(_) => FeedError::Full,
            TrySendError::Disconnected(_) => FeedError::Disconnected,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Bounded queue between capture and history.
pub struct CaptureFeed {
    sender: Sender<FrameSample>,
    receiver: Receiver<FrameSample>,
    running: Arc<AtomicBool>,
}

impl CaptureFeed {
    /// Create a stopped feed holding up to `queue_capacity` frames.
    pub fn new(queue_capacity: usize) -> Self {
        let (sender, receiver) = bounded(queue_capacity);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start accepting frames.
    pub fn start(&mut self) -> Result<(), FeedError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(FeedError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        tracing::debug!("capture feed started");
        Ok(())
    }

    /// Stop accepting frames. Frames already queued can still be pumped.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::debug!(queued = self.receiver.len(), "capture feed stopped");
    }

    /// Check if the feed is currently accepting frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Producer handle for a capture thread.
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            sender: self.sender.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Number of frames waiting.
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Move every queued frame into the history.
    ///
    /// Returns how many frames were stored. Frames the manager rejects are
    /// logged and skipped.
    pub fn pump(&self, manager: &HistoryManager) -> usize {
        self.receiver
            .try_iter()
            .filter(|sample| submit(manager, sample))
            .count()
    }

    /// Wait up to `timeout` for one frame and store it.
    ///
    /// Returns `false` on timeout or when the manager rejects the frame. The
    /// feed keeps a sender of its own, so an idle queue only ever times out;
    /// callers detect the end of a producer themselves.
    pub fn pump_one(&self, manager: &HistoryManager, timeout: Duration) -> bool {
        self.receiver
            .recv_timeout(timeout)
            .is_ok_and(|sample| submit(manager, &sample))
    }
}

impl Default for CaptureFeed {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

fn submit(manager: &HistoryManager, sample: &FrameSample) -> bool {
    match manager.submit_frame(&sample.values, sample.timestamp) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(timestamp = %sample.timestamp, error = %e, "dropping captured frame");
            false
        }
    }
}
