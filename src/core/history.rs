//! Fixed-capacity ring buffer of per-frame feature vectors.
//!
//! Frames are addressed two ways: by *logical* index, a counter that grows
//! by one per appended frame and never wraps, and by *physical* slot, which
//! is `logical % capacity`. Only the `capacity` most recent logical frames
//! are resident.

use chrono::{DateTime, Utc};

/// Borrowed view of one stored frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRef<'a> {
    /// Time at which the frame's sampling window closed
    pub end: DateTime<Utc>,
    /// One value per feature column
    pub values: &'a [f64],
}

/// Ring buffer holding the most recent frames.
///
/// All rows share one flat allocation of `capacity * feature_count` values.
/// There is no internal locking; the history manager wraps the store in a
/// lock.
#[derive(Debug, Clone)]
pub struct FrameStore {
    capacity: usize,
    feature_count: usize,
    values: Vec<f64>,
    ends: Vec<DateTime<Utc>>,
    /// Logical index the next append will receive
    next_index: u64,
}

impl FrameStore {
    /// Create an empty store.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, feature_count: usize) -> Self {
        assert!(capacity > 0, "frame store capacity must be non-zero");
        Self {
            capacity,
            feature_count,
            values: vec![f64::NAN; capacity * feature_count],
            ends: vec![DateTime::<Utc>::MIN_UTC; capacity],
            next_index: 0,
        }
    }

    /// Append a frame, overwriting the oldest one once the ring is full.
    ///
    /// Returns the logical index assigned to the frame.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the feature column count.
    pub fn append(&mut self, values: &[f64], end: DateTime<Utc>) -> u64 {
        assert_eq!(
            values.len(),
            self.feature_count,
            "frame width must match the feature column count"
        );

        let logical = self.next_index;
        let slot = self.slot_of(logical);
        let start = slot * self.feature_count;
        self.values[start..start + self.feature_count].copy_from_slice(values);
        self.ends[slot] = end;
        self.next_index += 1;
        logical
    }

    /// Value at a physical slot and feature column.
    pub fn get(&self, slot: usize, feature: usize) -> f64 {
        self.values[slot * self.feature_count + feature]
    }

    /// Full row and timestamp at a physical slot.
    pub fn frame(&self, slot: usize) -> FrameRef<'_> {
        let start = slot * self.feature_count;
        FrameRef {
            end: self.ends[slot],
            values: &self.values[start..start + self.feature_count],
        }
    }

    /// Fixed number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of feature columns per frame.
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Total number of frames ever appended.
    pub fn frames_written(&self) -> u64 {
        self.next_index
    }

    /// Logical index of the most recent frame.
    pub fn latest_index(&self) -> Option<u64> {
        self.next_index.checked_sub(1)
    }

    /// Logical index of the oldest frame still held in the ring.
    pub fn oldest_resident(&self) -> Option<u64> {
        if self.next_index == 0 {
            return None;
        }
        Some(self.next_index.saturating_sub(self.capacity as u64))
    }

    /// Whether the logical frame is still stored.
    pub fn is_resident(&self, logical: u64) -> bool {
        match self.oldest_resident() {
            Some(oldest) => logical >= oldest && logical < self.next_index,
            None => false,
        }
    }

    /// Physical slot for a logical index.
    pub fn slot_of(&self, logical: u64) -> usize {
        (logical % self.capacity as u64) as usize
    }

    /// Drop all frames, keeping capacity and width.
    pub fn clear(&mut self) {
        self.values.fill(f64::NAN);
        self.ends.fill(DateTime::<Utc>::MIN_UTC);
        self.next_index = 0;
    }
}
