//! Declarative queries against a view.
//!
//! A [`QuerySpec`] names the features to select, one operation, and its
//! millisecond arguments. Specs deserialize from JSON and parse from a short
//! text form, `names.op(args)`:
//!
//! ```text
//! hp.current
//! hp.old(200)
//! hp,mp.min(0, 300)
//! bars.max_min(500)
//! ```

use crate::core::error::QueryResult;
use crate::core::view::QueryView;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operations a query can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Current,
    Old,
    Min,
    Max,
    Average,
    Stdev,
    Delta,
    DupeDelta,
    IsPaused,
    MaxMin,
    MinMax,
    MaxMinInverse,
    MinMaxInverse,
    Pause,
    Resume,
    PauseAll,
}

impl Operation {
    const ALL: [Operation; 16] = [
        Operation::Current,
        Operation::Old,
        Operation::Min,
        Operation::Max,
        Operation::Average,
        Operation::Stdev,
        Operation::Delta,
        Operation::DupeDelta,
        Operation::IsPaused,
        Operation::MaxMin,
        Operation::MinMax,
        Operation::MaxMinInverse,
        Operation::MinMaxInverse,
        Operation::Pause,
        Operation::Resume,
        Operation::PauseAll,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Current => "current",
            Operation::Old => "old",
            Operation::Min => "min",
            Operation::Max => "max",
            Operation::Average => "average",
            Operation::Stdev => "stdev",
            Operation::Delta => "delta",
            Operation::DupeDelta => "dupe_delta",
            Operation::IsPaused => "is_paused",
            Operation::MaxMin => "max_min",
            Operation::MinMax => "min_max",
            Operation::MaxMinInverse => "max_min_inverse",
            Operation::MinMaxInverse => "min_max_inverse",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::PauseAll => "pause_all",
        }
    }

    /// Whether the operation accepts a `(start, end)` pair.
    pub fn takes_range(self) -> bool {
        matches!(
            self,
            Operation::Min
                | Operation::Max
                | Operation::Average
                | Operation::Stdev
                | Operation::Delta
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = QuerySpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| QuerySpecError::UnknownOperation(s.to_string()))
    }
}

/// Errors parsing the text form of a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuerySpecError {
    #[error("query `{0}` is missing `.operation`")]
    MissingOperation(String),
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
    #[error("query `{0}` selects no features")]
    NoFeatures(String),
    #[error("malformed arguments in `{0}`")]
    MalformedArguments(String),
    #[error("`{op}` takes at most {max} arguments")]
    TooManyArguments { op: Operation, max: usize },
}

/// One query: a feature selection, an operation and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Feature or group names to select
    pub features: Vec<String>,
    /// Operation to run on the selection
    pub op: Operation,
    /// Window start; ignored by single-argument operations
    #[serde(default)]
    pub start_ms: i64,
    /// Window end, or the single argument of one-argument operations
    #[serde(default)]
    pub end_ms: i64,
    /// Logical frame to anchor at instead of the view's origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
}

impl QuerySpec {
    pub fn new(features: &[&str], op: Operation, start_ms: i64, end_ms: i64) -> Self {
        Self {
            features: features.iter().map(|s| s.to_string()).collect(),
            op,
            start_ms,
            end_ms,
            frame: None,
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(frame) = self.frame {
            write!(f, "@{frame} ")?;
        }
        write!(f, "{}.{}", self.features.join(","), self.op)?;
        match self.op {
            Operation::Current | Operation::IsPaused | Operation::PauseAll => Ok(()),
            op if op.takes_range() && self.start_ms != 0 => {
                write!(f, "({}, {})", self.start_ms, self.end_ms)
            }
            _ => write!(f, "({})", self.end_ms),
        }
    }
}

impl FromStr for QuerySpec {
    type Err = QuerySpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (names, call) = text
            .split_once('.')
            .ok_or_else(|| QuerySpecError::MissingOperation(text.to_string()))?;

        let features: Vec<String> = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if features.is_empty() {
            return Err(QuerySpecError::NoFeatures(text.to_string()));
        }

        let (op_name, args) = match call.split_once('(') {
            Some((op_name, rest)) => {
                let inner = rest
                    .strip_suffix(')')
                    .ok_or_else(|| QuerySpecError::MalformedArguments(text.to_string()))?;
                (op_name.trim(), parse_args(inner, text)?)
            }
            None => (call.trim(), Vec::new()),
        };
        let op: Operation = op_name.parse()?;

        let max = if op.takes_range() { 2 } else { 1 };
        let (start_ms, end_ms) = match args.as_slice() {
            [] => (0, 0),
            [end] => (0, *end),
            [start, end] if max == 2 => (*start, *end),
            _ => return Err(QuerySpecError::TooManyArguments { op, max }),
        };

        Ok(Self {
            features,
            op,
            start_ms,
            end_ms,
            frame: None,
        })
    }
}

fn parse_args(inner: &str, text: &str) -> Result<Vec<i64>, QuerySpecError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|arg| {
            arg.trim()
                .parse::<i64>()
                .map_err(|_| QuerySpecError::MalformedArguments(text.to_string()))
        })
        .collect()
}

/// Result of evaluating a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Number(f64),
    Flag(bool),
    /// Side-effecting operations return nothing
    Done,
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Number(value) => write!(f, "{value}"),
            QueryOutput::Flag(flag) => write!(f, "{flag}"),
            QueryOutput::Done => f.write_str("ok"),
        }
    }
}

/// Run one query against a view.
pub fn evaluate(view: &QueryView, spec: &QuerySpec) -> QueryResult<QueryOutput> {
    if spec.op == Operation::PauseAll {
        view.pause_all()?;
        return Ok(QueryOutput::Done);
    }

    let selection = match spec.frame {
        Some(frame) => view.at(frame, &spec.features)?,
        None => view.features(&spec.features)?,
    };
    let (start, end) = (spec.start_ms, spec.end_ms);

    let output = match spec.op {
        Operation::Current => QueryOutput::Number(selection.current()?),
        Operation::Old => QueryOutput::Number(selection.old(end)?),
        Operation::Min => QueryOutput::Number(selection.min_between(start, end)?),
        Operation::Max => QueryOutput::Number(selection.max_between(start, end)?),
        Operation::Average => QueryOutput::Number(selection.average_between(start, end)?),
        Operation::Stdev => QueryOutput::Number(selection.stdev_between(start, end)?),
        Operation::Delta => QueryOutput::Number(selection.delta_between(start, end)?),
        Operation::DupeDelta => QueryOutput::Number(selection.dupe_delta(end)?),
        Operation::IsPaused => QueryOutput::Flag(selection.is_paused()?),
        Operation::MaxMin => QueryOutput::Number(selection.max_min(end)?),
        Operation::MinMax => QueryOutput::Number(selection.min_max(end)?),
        Operation::MaxMinInverse => QueryOutput::Number(selection.max_min_inverse(end)?),
        Operation::MinMaxInverse => QueryOutput::Number(selection.min_max_inverse(end)?),
        Operation::Pause => {
            selection.pause(end)?;
            QueryOutput::Done
        }
        Operation::Resume => {
            selection.resume(end)?;
            QueryOutput::Done
        }
        Operation::PauseAll => unreachable!("handled before selection"),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::QueryError;
    use crate::core::features::FeatureRegistry;
    use crate::core::manager::{EngineConfig, HistoryManager};
    use chrono::{DateTime, Duration, Utc};

    fn manager() -> HistoryManager {
        let registry = FeatureRegistry::builder()
            .feature("hp")
            .feature("mp")
            .group("bars", ["hp", "mp"])
            .build()
            .unwrap();
        let config = EngineConfig {
            capacity: 10,
            frame_rate: 10.0,
            default_window_ms: 100,
        };
        let manager = HistoryManager::new(registry, config).unwrap();
        let t0 = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        for i in 1..=10 {
            manager
                .submit_frame(&[i as f64, 100.0 - i as f64], t0 + Duration::milliseconds(i * 100))
                .unwrap();
        }
        manager
    }

    #[test]
    fn test_parse_text_form() {
        let spec: QuerySpec = "hp, mp.min(100, 300)".parse().unwrap();
        assert_eq!(spec.features, vec!["hp", "mp"]);
        assert_eq!(spec.op, Operation::Min);
        assert_eq!((spec.start_ms, spec.end_ms), (100, 300));

        let spec: QuerySpec = "hp.old(200)".parse().unwrap();
        assert_eq!((spec.start_ms, spec.end_ms), (0, 200));

        let spec: QuerySpec = "bars.is_paused".parse().unwrap();
        assert_eq!(spec.op, Operation::IsPaused);
        assert_eq!(spec.to_string(), "bars.is_paused");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "hp".parse::<QuerySpec>().unwrap_err(),
            QuerySpecError::MissingOperation("hp".to_string())
        );
        assert_eq!(
            "hp.median(3)".parse::<QuerySpec>().unwrap_err(),
            QuerySpecError::UnknownOperation("median".to_string())
        );
        assert_eq!(
            "hp.old(1, 2)".parse::<QuerySpec>().unwrap_err(),
            QuerySpecError::TooManyArguments {
                op: Operation::Old,
                max: 1
            }
        );
        assert_eq!(
            "hp.min(1, x)".parse::<QuerySpec>().unwrap_err(),
            QuerySpecError::MalformedArguments("hp.min(1, x)".to_string())
        );
        assert_eq!(
            ".current".parse::<QuerySpec>().unwrap_err(),
            QuerySpecError::NoFeatures(".current".to_string())
        );
    }

    #[test]
    fn test_json_form() {
        let json = r#"{"features": ["bars"], "op": "max_min_inverse", "end_ms": 300}"#;
        let spec: QuerySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.op, Operation::MaxMinInverse);
        assert_eq!(spec.start_ms, 0);
        assert_eq!(spec.frame, None);
    }

    #[test]
    fn test_evaluate() {
        let manager = manager();
        let view = manager.view().unwrap();

        let eval = |text: &str| evaluate(&view, &text.parse().unwrap());
        assert_eq!(eval("hp.current"), Ok(QueryOutput::Number(10.0)));
        assert_eq!(eval("hp.min(0, 300)"), Ok(QueryOutput::Number(8.0)));
        assert_eq!(eval("bars.max(200)"), Ok(QueryOutput::Number(91.0)));
        assert_eq!(eval("hp.delta(500)"), Ok(QueryOutput::Number(2.0)));
        assert_eq!(eval("hp.is_paused"), Ok(QueryOutput::Flag(false)));
        assert_eq!(eval("mp.pause"), Ok(QueryOutput::Done));
        assert_eq!(eval("bars.is_paused"), Ok(QueryOutput::Flag(true)));
        assert_eq!(eval("mp.resume"), Ok(QueryOutput::Done));
        assert_eq!(eval("bars.is_paused"), Ok(QueryOutput::Flag(false)));
        assert!(matches!(
            eval("hp.old(1000)"),
            Err(QueryError::WindowOverflow { max_ms: 900, .. })
        ));
    }

    #[test]
    fn test_evaluate_anchored_frame() {
        let manager = manager();
        let view = manager.view().unwrap();
        let mut spec: QuerySpec = "hp.current".parse().unwrap();
        spec.frame = Some(3);
        assert_eq!(evaluate(&view, &spec), Ok(QueryOutput::Number(4.0)));
        assert_eq!(spec.to_string(), "@3 hp.current");
    }
}
