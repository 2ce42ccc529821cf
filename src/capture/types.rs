//! Frame samples as produced by the capture pipeline.

use crate::core::stats::SeriesSummary;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One captured frame: a feature vector and the time its sampling closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    /// End of the frame's sampling window
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    /// One value per feature column
    pub values: Vec<f64>,
}

impl FrameSample {
    pub fn new(values: Vec<f64>, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, values }
    }

    /// Sample stamped with the current time.
    pub fn now(values: Vec<f64>) -> Self {
        Self::new(values, Utc::now())
    }
}

/// An ordered sequence of captured frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub frames: Vec<FrameSample>,
}

impl Recording {
    pub fn new(frames: Vec<FrameSample>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of values in the first frame.
    pub fn width(&self) -> usize {
        self.frames.first().map_or(0, |frame| frame.values.len())
    }

    /// Time between the first and last frame.
    pub fn duration(&self) -> Duration {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }

    /// All values of one column, skipping frames too short to have it.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.frames
            .iter()
            .filter_map(|frame| frame.values.get(index).copied())
            .collect()
    }

    /// Min, max and mean per column.
    pub fn summarize(&self) -> Vec<SeriesSummary> {
        (0..self.width())
            .map(|index| SeriesSummary::of(&self.column(index)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_recording_shape() {
        let recording = Recording::new(vec![
            FrameSample::new(vec![1.0, 10.0], t0()),
            FrameSample::new(vec![3.0, 20.0], t0() + Duration::milliseconds(50)),
        ]);

        assert_eq!(recording.len(), 2);
        assert_eq!(recording.width(), 2);
        assert_eq!(recording.duration(), Duration::milliseconds(50));
        assert_eq!(recording.column(1), vec![10.0, 20.0]);

        let summary = recording.summarize();
        assert_eq!(summary[0].min, 1.0);
        assert_eq!(summary[1].max, 20.0);
        assert!((summary[0].mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_recording() {
        let recording = Recording::default();
        assert!(recording.is_empty());
        assert_eq!(recording.width(), 0);
        assert_eq!(recording.duration(), Duration::zero());
        assert!(recording.summarize().is_empty());
    }
}
