//! Windowed queries over the frame history.
//!
//! A [`QueryView`] is anchored at one origin frame. Selecting features on it
//! produces a [`Selection`], an immutable value that carries its own feature
//! indices, so any number of reads can be issued against the same selection.
//!
//! Every read takes the history's read lock once and holds it for the whole
//! computation. Before touching a frame the read checks that the frame is
//! still resident; a frame that the ring overwrote after the view was
//! anchored fails with [`QueryError::FrameEvicted`] instead of yielding
//! newer data.

use crate::core::error::{QueryError, QueryResult};
use crate::core::features::{FeatureRegistry, PauseDeadline};
use crate::core::history::FrameStore;
use crate::core::stats::{self, Reducer};
use crate::core::window::{slot_for, FrameWindow, WindowGeometry};
use crate::diagnostics::SharedEngineCounters;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Read-only handles a view needs.
#[derive(Clone)]
pub(crate) struct ViewSource {
    pub(crate) store: Arc<RwLock<FrameStore>>,
    pub(crate) registry: Arc<FeatureRegistry>,
    pub(crate) counters: SharedEngineCounters,
}

/// Accessor anchored at one frame of the history.
#[derive(Clone)]
pub struct QueryView {
    source: Option<ViewSource>,
    origin: u64,
    slot: usize,
    geometry: WindowGeometry,
}

impl fmt::Debug for QueryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryView")
            .field("blank", &self.is_blank())
            .field("origin", &self.origin)
            .field("slot", &self.slot)
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl Default for QueryView {
    fn default() -> Self {
        Self::blank()
    }
}

impl QueryView {
    /// A view with no history behind it. Every operation fails with
    /// [`QueryError::EmptyEngine`].
    pub fn blank() -> Self {
        Self {
            source: None,
            origin: 0,
            slot: 0,
            geometry: WindowGeometry::new(1.0, 1, 0),
        }
    }

    pub(crate) fn anchored(
        source: ViewSource,
        geometry: WindowGeometry,
        origin: u64,
    ) -> QueryResult<Self> {
        {
            let store = source.store.read();
            let latest = store.latest_index().ok_or(QueryError::EmptyEngine)?;
            if origin > latest {
                return Err(QueryError::FrameNotCaptured {
                    requested: origin,
                    latest,
                });
            }
            if !store.is_resident(origin) {
                return Err(QueryError::FrameEvicted {
                    requested: origin,
                    oldest: store.oldest_resident().unwrap_or(0),
                });
            }
        }

        let slot = slot_for(origin, 0, geometry.capacity);
        tracing::trace!(origin, slot, "query view anchored");
        Ok(Self {
            source: Some(source),
            origin,
            slot,
            geometry,
        })
    }

    pub fn is_blank(&self) -> bool {
        self.source.is_none()
    }

    /// Logical index of the origin frame.
    pub fn origin_index(&self) -> u64 {
        self.origin
    }

    /// Physical ring slot of the origin frame.
    pub fn frame_index(&self) -> usize {
        self.slot
    }

    pub fn frame_rate(&self) -> f64 {
        self.geometry.frame_rate
    }

    pub fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    /// End timestamp of the origin frame.
    pub fn timestamp(&self) -> QueryResult<DateTime<Utc>> {
        self.read(|reader| reader.origin_end())
    }

    /// Select features by column index.
    pub fn select(&self, indices: &[usize]) -> QueryResult<Selection> {
        let source = self.source()?;
        for &index in indices {
            source.registry.check_index(index)?;
        }
        Selection::new(self.clone(), indices.to_vec())
    }

    /// Select the features a single name stands for.
    pub fn feature(&self, name: &str) -> QueryResult<Selection> {
        let indices = self.source()?.registry.resolve(name)?.to_vec();
        Selection::new(self.clone(), indices)
    }

    /// Select the features of several names, duplicates removed.
    pub fn features<S: AsRef<str>>(&self, names: &[S]) -> QueryResult<Selection> {
        let indices = self.source()?.registry.resolve_many(names)?;
        Selection::new(self.clone(), indices)
    }

    /// Re-anchor at `frame_index`, then select `names` on the new view.
    pub fn at<S: AsRef<str>>(&self, frame_index: u64, names: &[S]) -> QueryResult<Selection> {
        let source = self.source()?.clone();
        let view = Self::anchored(source, self.geometry, frame_index)?;
        view.features(names)
    }

    /// Pause every registered feature until further notice.
    pub fn pause_all(&self) -> QueryResult<()> {
        let source = self.source()?;
        for index in 0..source.registry.feature_count() {
            source.registry.pause(index, PauseDeadline::Forever)?;
        }
        source.counters.record_pauses(source.registry.feature_count() as u64);
        tracing::debug!(origin = self.origin, "all features paused");
        Ok(())
    }

    fn source(&self) -> QueryResult<&ViewSource> {
        self.source.as_ref().ok_or(QueryError::EmptyEngine)
    }

    /// Run `f` under the history read lock and count the outcome.
    fn read<T>(&self, f: impl FnOnce(&Reader<'_>) -> QueryResult<T>) -> QueryResult<T> {
        let source = self.source()?;
        let result = self.locked(source, f);

        match &result {
            Ok(_) => source.counters.record_query(),
            Err(err) => {
                source.counters.record_query_error();
                tracing::debug!(origin = self.origin, error = %err, "query failed");
            }
        }
        result
    }

    /// Run `f` under the history read lock without touching the counters.
    fn locked<T>(
        &self,
        source: &ViewSource,
        f: impl FnOnce(&Reader<'_>) -> QueryResult<T>,
    ) -> QueryResult<T> {
        let store = source.store.read();
        let reader = Reader {
            store: &*store,
            registry: &*source.registry,
            origin: self.origin,
            geometry: self.geometry,
        };
        f(&reader)
    }

    /// Origin timestamp used as the base of pause deadlines. Not a query.
    fn deadline_base(&self) -> QueryResult<DateTime<Utc>> {
        self.locked(self.source()?, |reader| reader.origin_end())
    }
}

/// Locked access to the history for the duration of one read.
struct Reader<'a> {
    store: &'a FrameStore,
    registry: &'a FeatureRegistry,
    origin: u64,
    geometry: WindowGeometry,
}

impl Reader<'_> {
    /// Logical frame at `offset`, or `None` before the first captured frame.
    fn logical(&self, offset: usize) -> QueryResult<Option<u64>> {
        let Some(logical) = self.origin.checked_sub(offset as u64) else {
            return Ok(None);
        };
        if !self.store.is_resident(logical) {
            return Err(QueryError::FrameEvicted {
                requested: logical,
                oldest: self.store.oldest_resident().unwrap_or(0),
            });
        }
        Ok(Some(logical))
    }

    fn origin_end(&self) -> QueryResult<DateTime<Utc>> {
        self.logical(0)?;
        let slot = slot_for(self.origin, 0, self.geometry.capacity);
        Ok(self.store.frame(slot).end)
    }

    /// Masked value of one feature at one offset.
    fn value(&self, offset: usize, feature: usize) -> QueryResult<f64> {
        if self.logical(offset)?.is_none() {
            return Ok(f64::NAN);
        }
        let slot = slot_for(self.origin, offset, self.geometry.capacity);
        let frame = self.store.frame(slot);
        if self.registry.is_masked(feature, frame.end) {
            Ok(f64::NAN)
        } else {
            Ok(frame.values[feature])
        }
    }

    /// Row-major block of masked values: one row per offset, one column per
    /// feature. An empty window yields a single NaN.
    fn block(&self, window: FrameWindow, features: &[usize]) -> QueryResult<Vec<f64>> {
        if window.is_empty() {
            return Ok(vec![f64::NAN]);
        }

        let deadlines = self.registry.deadlines();
        let mut values = Vec::with_capacity(window.len() * features.len());
        for offset in window.offsets() {
            if self.logical(offset)?.is_none() {
                values.extend(std::iter::repeat(f64::NAN).take(features.len()));
                continue;
            }
            let frame = self
                .store
                .frame(slot_for(self.origin, offset, self.geometry.capacity));
            for &feature in features {
                let masked = deadlines[feature].is_some_and(|deadline| deadline.masks(frame.end));
                values.push(if masked { f64::NAN } else { frame.values[feature] });
            }
        }
        Ok(values)
    }
}

/// Features selected on a view, ready for reads.
///
/// Operations documented as single-feature use only the first selected index.
#[derive(Debug, Clone)]
pub struct Selection {
    view: QueryView,
    indices: Vec<usize>,
}

impl Selection {
    fn new(view: QueryView, indices: Vec<usize>) -> QueryResult<Self> {
        if indices.is_empty() {
            return Err(QueryError::EmptySelection);
        }
        Ok(Self { view, indices })
    }

    /// Selected feature indices in selection order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn view(&self) -> &QueryView {
        &self.view
    }

    fn first(&self) -> usize {
        self.indices[0]
    }

    /// A selection holding only the first feature.
    fn single(&self) -> Selection {
        Selection {
            view: self.view.clone(),
            indices: vec![self.first()],
        }
    }

    /// Value of the first feature at the origin frame.
    pub fn current(&self) -> QueryResult<f64> {
        self.view.read(|reader| reader.value(0, self.first()))
    }

    /// Value of the first feature `milliseconds` ago.
    ///
    /// A non-positive argument uses the default window length.
    pub fn old(&self, milliseconds: i64) -> QueryResult<f64> {
        let milliseconds = if milliseconds <= 0 {
            self.view.geometry.default_window_ms
        } else {
            milliseconds
        };
        self.view.read(|reader| {
            let offset = reader.geometry.frame_offset(milliseconds)?;
            reader.value(offset, self.first())
        })
    }

    /// Raw masked values over `[start_ms, end_ms)`, newest frame first and
    /// features interleaved in selection order.
    pub fn values(&self, start_ms: i64, end_ms: i64) -> QueryResult<Vec<f64>> {
        self.view.read(|reader| {
            let window = reader.geometry.between(start_ms, end_ms)?;
            reader.block(window, &self.indices)
        })
    }

    fn pooled(&self, start_ms: i64, end_ms: i64, reducer: Reducer) -> QueryResult<f64> {
        self.values(start_ms, end_ms)
            .map(|values| reducer.apply(&values))
    }

    pub fn min(&self, milliseconds: i64) -> QueryResult<f64> {
        self.min_between(0, milliseconds)
    }

    /// Smallest value of any selected feature in the window.
    pub fn min_between(&self, start_ms: i64, end_ms: i64) -> QueryResult<f64> {
        self.pooled(start_ms, end_ms, Reducer::Min)
    }

    pub fn max(&self, milliseconds: i64) -> QueryResult<f64> {
        self.max_between(0, milliseconds)
    }

    /// Largest value of any selected feature in the window.
    pub fn max_between(&self, start_ms: i64, end_ms: i64) -> QueryResult<f64> {
        self.pooled(start_ms, end_ms, Reducer::Max)
    }

    pub fn average(&self, milliseconds: i64) -> QueryResult<f64> {
        self.average_between(0, milliseconds)
    }

    /// Mean over all selected features in the window.
    pub fn average_between(&self, start_ms: i64, end_ms: i64) -> QueryResult<f64> {
        self.pooled(start_ms, end_ms, Reducer::Mean)
    }

    pub fn stdev(&self, milliseconds: i64) -> QueryResult<f64> {
        self.stdev_between(0, milliseconds)
    }

    /// Sample standard deviation over all selected features in the window.
    pub fn stdev_between(&self, start_ms: i64, end_ms: i64) -> QueryResult<f64> {
        self.pooled(start_ms, end_ms, Reducer::StdDev)
    }

    pub fn delta(&self, milliseconds: i64) -> QueryResult<f64> {
        self.delta_between(0, milliseconds)
    }

    /// Ratio of the first feature at `start_ms` to its value
    /// `end_ms - start_ms` further back.
    ///
    /// Division by zero is not an error; it yields infinity or NaN.
    pub fn delta_between(&self, start_ms: i64, end_ms: i64) -> QueryResult<f64> {
        let (start_ms, start) = if start_ms <= 0 {
            (0, self.current()?)
        } else {
            (start_ms, self.old(start_ms)?)
        };
        Ok(start / self.old(end_ms - start_ms)?)
    }

    /// Minimum over `milliseconds` divided by the maximum over the window of
    /// the same length just before it. First feature only.
    pub fn dupe_delta(&self, milliseconds: i64) -> QueryResult<f64> {
        let single = self.single();
        let recent = single.min(milliseconds)?;
        let previous = single.max_between(milliseconds, milliseconds.saturating_mul(2))?;
        Ok(recent / previous)
    }

    /// Whether any selected feature reads NaN at the origin frame.
    pub fn is_paused(&self) -> QueryResult<bool> {
        self.view.read(|reader| {
            for &feature in &self.indices {
                if reader.value(0, feature)?.is_nan() {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    /// Reduce each selected feature over the window with `inner`, then
    /// combine the per-feature results with `outer`.
    fn per_feature(&self, milliseconds: i64, inner: Reducer, outer: Reducer) -> QueryResult<f64> {
        self.view.read(|reader| {
            let window = reader.geometry.between(0, milliseconds)?;
            let block = reader.block(window, &self.indices)?;
            let width = if window.is_empty() { 1 } else { self.indices.len() };
            Ok(outer.apply(&stats::reduce_columns(&block, width, inner)))
        })
    }

    /// Largest of the per-feature minimums over the window.
    ///
    /// High when at least one selected feature stayed high throughout.
    pub fn max_min(&self, milliseconds: i64) -> QueryResult<f64> {
        self.per_feature(milliseconds, Reducer::Min, Reducer::Max)
    }

    /// Smallest of the per-feature maximums over the window.
    ///
    /// Low when at least one selected feature stayed low throughout.
    pub fn min_max(&self, milliseconds: i64) -> QueryResult<f64> {
        self.per_feature(milliseconds, Reducer::Max, Reducer::Min)
    }

    /// Each feature's minimum over time, then the largest of those.
    pub fn max_min_inverse(&self, milliseconds: i64) -> QueryResult<f64> {
        self.per_feature(milliseconds, Reducer::Min, Reducer::Max)
    }

    /// Each feature's maximum over time, then the smallest of those.
    pub fn min_max_inverse(&self, milliseconds: i64) -> QueryResult<f64> {
        self.per_feature(milliseconds, Reducer::Max, Reducer::Min)
    }

    /// Deadline `milliseconds` after the origin frame, saturating to forever.
    fn deadline_after(origin_end: DateTime<Utc>, milliseconds: i64) -> PauseDeadline {
        origin_end
            .checked_add_signed(Duration::milliseconds(milliseconds))
            .map_or(PauseDeadline::Forever, PauseDeadline::Until)
    }

    /// Mask the selected features for `milliseconds` after the origin frame,
    /// or until resumed when `milliseconds <= 0`.
    pub fn pause(&self, milliseconds: i64) -> QueryResult<()> {
        let source = self.view.source()?;
        let until = if milliseconds > 0 {
            Self::deadline_after(self.view.deadline_base()?, milliseconds)
        } else {
            PauseDeadline::Forever
        };
        for &index in &self.indices {
            source.registry.pause(index, until)?;
        }
        source.counters.record_pauses(self.indices.len() as u64);
        tracing::debug!(features = ?self.indices, ?until, "features paused");
        Ok(())
    }

    /// Unmask the selected features now, or `milliseconds` after the origin
    /// frame when positive.
    pub fn resume(&self, milliseconds: i64) -> QueryResult<()> {
        let source = self.view.source()?;
        let origin_end = self.view.deadline_base()?;
        let until = if milliseconds > 0 {
            Self::deadline_after(origin_end, milliseconds)
        } else {
            PauseDeadline::Until(origin_end)
        };
        for &index in &self.indices {
            source.registry.resume(index, until, origin_end)?;
        }
        tracing::debug!(features = ?self.indices, ?until, "features resumed");
        Ok(())
    }
}
