//! Conversion of millisecond windows into frame offsets.
//!
//! Offsets count frames backward from a view's origin frame: offset 0 is the
//! origin itself, offset 1 the frame before it. A window is the half-open
//! offset range `[start, end)`.

use crate::core::error::{QueryError, QueryResult};

/// Timing parameters shared by every window computed for one history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGeometry {
    /// Nominal frames per second
    pub frame_rate: f64,
    /// Ring capacity in frames
    pub capacity: usize,
    /// Window length used when a caller passes no positive duration
    pub default_window_ms: i64,
}

impl WindowGeometry {
    pub fn new(frame_rate: f64, capacity: usize, default_window_ms: i64) -> Self {
        Self {
            frame_rate,
            capacity,
            default_window_ms,
        }
    }

    /// Largest millisecond value that still maps inside the ring.
    pub fn max_offset_ms(&self) -> i64 {
        let frames = self.capacity.saturating_sub(1) as f64;
        (frames / self.frame_rate * 1000.0).ceil() as i64
    }

    /// Frames covered by `milliseconds`, never less than one.
    ///
    /// Rounds half to even. Fails with [`QueryError::NegativeOffset`] for a
    /// negative argument and [`QueryError::WindowOverflow`] when the offset
    /// would reach a frame the ring no longer holds.
    pub fn frame_offset(&self, milliseconds: i64) -> QueryResult<usize> {
        if milliseconds < 0 {
            return Err(QueryError::NegativeOffset(milliseconds));
        }

        let exact = (self.frame_rate * milliseconds as f64 / 1000.0).round_ties_even();
        let offset = (exact as i64).max(1);
        if offset > self.capacity as i64 - 1 {
            return Err(QueryError::WindowOverflow {
                requested_ms: milliseconds,
                offset,
                capacity: self.capacity,
                max_ms: self.max_offset_ms(),
            });
        }
        Ok(offset as usize)
    }

    /// Resolve a `(start, duration)` pair into an offset range.
    ///
    /// A non-positive start anchors the window at the origin frame. A
    /// non-positive duration falls back to the default window length.
    pub fn resolve(&self, start_ms: i64, duration_ms: i64) -> QueryResult<FrameWindow> {
        let (start_ms, start) = if start_ms <= 0 {
            (0, 0)
        } else {
            (start_ms, self.frame_offset(start_ms)?)
        };

        let duration_ms = if duration_ms <= 0 {
            self.default_window_ms
        } else {
            duration_ms
        };
        let end = self.frame_offset(start_ms.saturating_add(duration_ms))?;

        Ok(FrameWindow { start, end })
    }

    /// Resolve a `(start, end)` pair as used by the two-argument aggregates.
    pub fn between(&self, start_ms: i64, end_ms: i64) -> QueryResult<FrameWindow> {
        self.resolve(start_ms, end_ms.saturating_sub(start_ms))
    }
}

/// Half-open range of frame offsets measured backward from an origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    pub start: usize,
    pub end: usize,
}

impl FrameWindow {
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Number of frames covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Offsets from newest to oldest.
    pub fn offsets(&self) -> std::ops::Range<usize> {
        self.start..self.end.max(self.start)
    }
}

/// Physical slot for `origin - offset` in a ring of `capacity`.
///
/// Uses a Euclidean remainder so that offsets reaching before logical frame
/// zero still land in `[0, capacity)`.
pub fn slot_for(origin: u64, offset: usize, capacity: usize) -> usize {
    let logical = origin as i128 - offset as i128;
    logical.rem_euclid(capacity as i128) as usize
}
