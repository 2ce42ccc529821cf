//! Error types surfaced by the query engine.
//!
//! Every variant is a local, synchronous failure reported at the point of the
//! offending call. Numeric edge cases (division by zero, empty input) are not
//! errors; they come back as NaN or infinity.

/// Errors returned by the frame history, the feature registry and query views.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// A feature name was selected that the registry does not know.
    #[error("feature name `{0}` does not exist")]
    NameNotFound(String),

    /// A feature index was selected past the registered column count.
    #[error("feature index {index} is out of range (feature count is {count})")]
    FeatureOutOfRange { index: usize, count: usize },

    /// A read was issued on a selection holding no feature indices.
    #[error("no features selected")]
    EmptySelection,

    /// A millisecond window reaches further back than the ring can hold.
    #[error(
        "{requested_ms}ms reaches back {offset} frames, but the history only holds {capacity}; \
         the largest usable offset is {max_ms}ms"
    )]
    WindowOverflow {
        requested_ms: i64,
        offset: i64,
        capacity: usize,
        max_ms: i64,
    },

    /// A negative millisecond value was passed where only a non-negative
    /// window is meaningful.
    #[error("offset cannot be negative (got {0}ms)")]
    NegativeOffset(i64),

    /// The view or manager has no frame history behind it yet.
    #[error("no frame history is available")]
    EmptyEngine,

    /// The frame was overwritten by the ring buffer after the view was anchored.
    #[error("frame #{requested} has been overwritten; the oldest stored frame is #{oldest}")]
    FrameEvicted { requested: u64, oldest: u64 },

    /// A view was anchored at a frame that has not been captured yet.
    #[error("frame #{requested} has not been captured yet (latest is #{latest})")]
    FrameNotCaptured { requested: u64, latest: u64 },

    /// A submitted frame does not carry one value per feature column.
    #[error("frame carries {got} values, expected {expected}")]
    FrameWidthMismatch { expected: usize, got: usize },
}

/// Result alias used across the engine.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_message_reports_limit() {
        let err = QueryError::WindowOverflow {
            requested_ms: 1000,
            offset: 10,
            capacity: 10,
            max_ms: 900,
        };
        let message = err.to_string();
        assert!(message.contains("900ms"));
        assert!(message.contains("1000ms"));
    }

    #[test]
    fn test_name_not_found_message() {
        let err = QueryError::NameNotFound("hp".to_string());
        assert_eq!(err.to_string(), "feature name `hp` does not exist");
    }
}
