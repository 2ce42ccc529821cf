//! Feature columns, their names, and per-feature pause deadlines.
//!
//! A feature is one numeric signal tracked per frame, such as the match score
//! of a watched screen region. Each feature owns a stable column index. Names
//! resolve to one or more indices: every feature is reachable by its own name,
//! and groups alias a set of features under one name.
//!
//! Pausing never touches captured data. The registry only stores a deadline
//! per column; query views compare it against frame timestamps and report
//! NaN for masked reads.

use crate::core::error::{QueryError, QueryResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How long a feature stays paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseDeadline {
    /// Masked until explicitly resumed
    Forever,
    /// Masked for frames that ended before this instant
    Until(DateTime<Utc>),
}

impl PauseDeadline {
    /// Whether a frame ending at `frame_end` falls inside the pause.
    pub fn masks(&self, frame_end: DateTime<Utc>) -> bool {
        match self {
            PauseDeadline::Forever => true,
            PauseDeadline::Until(until) => frame_end < *until,
        }
    }
}

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("feature or group name `{0}` is registered twice")]
    DuplicateName(String),
    #[error("group `{group}` references unknown feature `{member}`")]
    UnknownMember { group: String, member: String },
    #[error("group `{0}` has no members")]
    EmptyGroup(String),
}

/// Incrementally declares features and groups.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    columns: Vec<String>,
    index_names: HashMap<String, Vec<usize>>,
    error: Option<RegistryError>,
}

impl RegistryBuilder {
    /// Declare a new feature column reachable by `name`.
    pub fn feature(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.error.is_some() {
            return self;
        }
        if self.index_names.contains_key(&name) {
            self.error = Some(RegistryError::DuplicateName(name));
            return self;
        }
        let index = self.columns.len();
        self.columns.push(name.clone());
        self.index_names.insert(name, vec![index]);
        self
    }

    /// Declare a group name resolving to the union of its members' indices.
    ///
    /// Members may be features or previously declared groups.
    pub fn group<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        if self.error.is_some() {
            return self;
        }
        if self.index_names.contains_key(&name) {
            self.error = Some(RegistryError::DuplicateName(name));
            return self;
        }

        let mut indices = Vec::new();
        for member in members {
            let member = member.as_ref();
            match self.index_names.get(member) {
                Some(found) => {
                    for &index in found {
                        if !indices.contains(&index) {
                            indices.push(index);
                        }
                    }
                }
                None => {
                    self.error = Some(RegistryError::UnknownMember {
                        group: name,
                        member: member.to_string(),
                    });
                    return self;
                }
            }
        }

        if indices.is_empty() {
            self.error = Some(RegistryError::EmptyGroup(name));
            return self;
        }
        self.index_names.insert(name, indices);
        self
    }

    /// Finish building.
    pub fn build(self) -> Result<FeatureRegistry, RegistryError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let count = self.columns.len();
        Ok(FeatureRegistry {
            columns: self.columns,
            index_names: self.index_names,
            deadlines: RwLock::new(vec![None; count]),
        })
    }
}

/// Compiled set of feature columns with their pause state.
///
/// Names are fixed after construction. Deadlines sit behind a lock so the
/// registry can be shared between the capture and script threads.
#[derive(Debug)]
pub struct FeatureRegistry {
    columns: Vec<String>,
    index_names: HashMap<String, Vec<usize>>,
    deadlines: RwLock<Vec<Option<PauseDeadline>>>,
}

impl FeatureRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with one feature per name, no groups.
    pub fn from_names<I, S>(names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .fold(Self::builder(), |builder, name| builder.feature(name))
            .build()
    }

    /// Number of feature columns.
    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    /// Column name of a feature index.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    /// Column names in index order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Feature indices a name stands for.
    pub fn resolve(&self, name: &str) -> QueryResult<&[usize]> {
        self.index_names
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| QueryError::NameNotFound(name.to_string()))
    }

    /// Resolve several names, dropping duplicates and keeping first-seen order.
    pub fn resolve_many<S: AsRef<str>>(&self, names: &[S]) -> QueryResult<Vec<usize>> {
        let mut indices = Vec::new();
        for name in names {
            for &index in self.resolve(name.as_ref())? {
                if !indices.contains(&index) {
                    indices.push(index);
                }
            }
        }
        Ok(indices)
    }

    /// Install a pause deadline, replacing any earlier one.
    pub fn pause(&self, index: usize, until: PauseDeadline) -> QueryResult<()> {
        self.check_index(index)?;
        self.deadlines.write()[index] = Some(until);
        tracing::trace!(index, ?until, "feature paused");
        Ok(())
    }

    /// Resume a feature.
    ///
    /// If `until` is not after `reference` the pause is cleared right away.
    /// Otherwise `until` becomes the feature's deadline, exactly as `pause`
    /// would install it.
    pub fn resume(
        &self,
        index: usize,
        until: PauseDeadline,
        reference: DateTime<Utc>,
    ) -> QueryResult<()> {
        self.check_index(index)?;
        let elapsed = match until {
            PauseDeadline::Forever => false,
            PauseDeadline::Until(at) => at <= reference,
        };
        self.deadlines.write()[index] = if elapsed { None } else { Some(until) };
        tracing::trace!(index, ?until, elapsed, "feature resumed");
        Ok(())
    }

    /// Clear every deadline.
    pub fn resume_all(&self) {
        self.deadlines.write().fill(None);
    }

    /// Current deadline of a feature, if any.
    pub fn paused_until(&self, index: usize) -> Option<PauseDeadline> {
        self.deadlines.read().get(index).copied().flatten()
    }

    /// Whether a read of `index` for a frame ending at `frame_end` is masked.
    pub fn is_masked(&self, index: usize, frame_end: DateTime<Utc>) -> bool {
        self.paused_until(index)
            .is_some_and(|deadline| deadline.masks(frame_end))
    }

    /// Snapshot of all deadlines, for reading many values under one lock.
    pub(crate) fn deadlines(&self) -> Vec<Option<PauseDeadline>> {
        self.deadlines.read().clone()
    }

    pub(crate) fn check_index(&self, index: usize) -> QueryResult<()> {
        if index < self.columns.len() {
            Ok(())
        } else {
            Err(QueryError::FeatureOutOfRange {
                index,
                count: self.columns.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn registry() -> FeatureRegistry {
        FeatureRegistry::builder()
            .feature("hp")
            .feature("mp")
            .feature("boss")
            .group("bars", ["hp", "mp"])
            .group("all", ["bars", "boss", "hp"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_feature_and_group() {
        let registry = registry();
        assert_eq!(registry.feature_count(), 3);
        assert_eq!(registry.resolve("mp").unwrap(), &[1]);
        assert_eq!(registry.resolve("bars").unwrap(), &[0, 1]);
        assert_eq!(registry.resolve("all").unwrap(), &[0, 1, 2]);
        assert_eq!(registry.name_of(2), Some("boss"));
    }

    #[test]
    fn test_resolve_unknown_name() {
        let registry = registry();
        assert_eq!(
            registry.resolve("xp"),
            Err(QueryError::NameNotFound("xp".to_string()))
        );
    }

    #[test]
    fn test_resolve_many_dedupes_in_first_seen_order() {
        let registry = registry();
        let indices = registry.resolve_many(&["boss", "bars", "hp"]).unwrap();
        assert_eq!(indices, vec![2, 0, 1]);
    }

    #[test]
    fn test_builder_rejects_bad_groups() {
        let err = FeatureRegistry::builder()
            .feature("hp")
            .group("bars", ["hp", "mp"])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownMember {
                group: "bars".to_string(),
                member: "mp".to_string()
            }
        );

        let err = FeatureRegistry::from_names(["hp", "hp"]).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("hp".to_string()));
    }

    #[test]
    fn test_pause_last_write_wins() {
        let registry = registry();
        registry.pause(0, PauseDeadline::Forever).unwrap();
        let until = t0() + Duration::milliseconds(500);
        registry.pause(0, PauseDeadline::Until(until)).unwrap();

        assert_eq!(registry.paused_until(0), Some(PauseDeadline::Until(until)));
        assert!(registry.is_masked(0, t0()));
        assert!(!registry.is_masked(0, until));
        assert!(!registry.is_masked(1, t0()));
    }

    #[test]
    fn test_resume_clears_elapsed_deadline() {
        let registry = registry();
        registry.pause(1, PauseDeadline::Forever).unwrap();

        registry
            .resume(1, PauseDeadline::Until(t0()), t0())
            .unwrap();
        assert_eq!(registry.paused_until(1), None);
    }

    #[test]
    fn test_resume_with_future_deadline_installs_it() {
        let registry = registry();
        registry.pause(1, PauseDeadline::Forever).unwrap();

        let until = t0() + Duration::seconds(2);
        registry
            .resume(1, PauseDeadline::Until(until), t0())
            .unwrap();
        assert_eq!(registry.paused_until(1), Some(PauseDeadline::Until(until)));
    }

    #[test]
    fn test_pause_out_of_range() {
        let registry = registry();
        assert_eq!(
            registry.pause(7, PauseDeadline::Forever),
            Err(QueryError::FeatureOutOfRange { index: 7, count: 3 })
        );
    }
}
