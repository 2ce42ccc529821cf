//! Reducers applied to extracted window values.
//!
//! NaN is contagious: a window containing a masked or missing value reduces
//! to NaN, which scripts test for explicitly. Empty input also reduces to NaN.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// A reduction from a sequence of values to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Min,
    Max,
    Mean,
    /// Sample standard deviation (n - 1 denominator)
    StdDev,
}

impl Reducer {
    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Reducer::Min => Statistics::min(values.iter()),
            Reducer::Max => Statistics::max(values.iter()),
            Reducer::Mean => Statistics::mean(values.iter()),
            Reducer::StdDev => Statistics::std_dev(values.iter()),
        }
    }
}

/// Reduce each column of a row-major `rows x width` block.
pub(crate) fn reduce_columns(block: &[f64], width: usize, reducer: Reducer) -> Vec<f64> {
    let mut column = Vec::with_capacity(block.len() / width.max(1));
    (0..width)
        .map(|n| {
            column.clear();
            column.extend(block.iter().skip(n).step_by(width).copied());
            reducer.apply(&column)
        })
        .collect()
}

/// Min, max and mean of one series, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SeriesSummary {
    pub fn of(values: &[f64]) -> Self {
        Self {
            min: Reducer::Min.apply(values),
            max: Reducer::Max.apply(values),
            mean: Reducer::Mean.apply(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducers() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(Reducer::Min.apply(&values), 2.0);
        assert_eq!(Reducer::Max.apply(&values), 9.0);
        assert!((Reducer::Mean.apply(&values) - 5.0).abs() < 1e-12);
        // Sample deviation: sqrt(32 / 7)
        assert!((Reducer::StdDev.apply(&values) - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_nan_and_empty_propagate() {
        assert!(Reducer::Min.apply(&[1.0, f64::NAN, 3.0]).is_nan());
        assert!(Reducer::Mean.apply(&[]).is_nan());
        assert!(Reducer::StdDev.apply(&[1.0]).is_nan());
    }

    #[test]
    fn test_reduce_columns() {
        // Two features over three frames.
        let block = [1.0, 10.0, 2.0, 20.0, 3.0, 5.0];
        assert_eq!(reduce_columns(&block, 2, Reducer::Min), vec![1.0, 5.0]);
        assert_eq!(reduce_columns(&block, 2, Reducer::Max), vec![3.0, 20.0]);
    }
}
