//! Selection of first-level outputs for second-level models.
//!
//! Inputs to a group model are chosen by metadata, never by position: each
//! required input is described by an entity filter and resolved against the
//! pool of available statistical maps.

use crate::entities::{describe, matches, Entities};
use crate::error::{GlmError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A statistical map on disk plus the entities describing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatMapRecord {
    /// Location of the map.
    pub file_path: PathBuf,
    /// Provenance entities.
    pub metadata: Entities,
}

impl StatMapRecord {
    /// Pairs a path with its metadata.
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>, metadata: Entities) -> Self {
        Self {
            file_path: file_path.into(),
            metadata,
        }
    }
}

/// Concatenates grouped records in order.
#[must_use]
pub fn flatten<T: Clone>(nested: &[Vec<T>]) -> Vec<T> {
    nested.iter().flatten().cloned().collect()
}

/// Picks, for every filter, the first pool record (in pool order) whose
/// metadata satisfies it.
///
/// The result has one record per filter, in filter order. A record may be
/// selected by more than one filter.
///
/// # Errors
///
/// Returns [`GlmError::UnmatchedFilter`] for the first filter that matches
/// nothing; no partial selection is returned.
///
/// # Examples
///
/// ```
/// use fmri_glm::entities::Entities;
/// use fmri_glm::matcher::{match_runs, StatMapRecord};
/// use serde_json::json;
///
/// let ids = |id: i64| Entities::from([("id".to_string(), json!(id))]);
/// let pool = vec![
///     StatMapRecord::new("a.json", ids(1)),
///     StatMapRecord::new("b.json", ids(2)),
/// ];
///
/// let picked = match_runs(&pool, &[ids(2)]).unwrap();
/// assert_eq!(picked[0].file_path.to_str(), Some("b.json"));
/// assert!(match_runs(&pool, &[ids(3)]).is_err());
/// ```
pub fn match_runs(pool: &[StatMapRecord], filters: &[Entities]) -> Result<Vec<StatMapRecord>> {
    filters
        .iter()
        .map(|filter| {
            pool.iter()
                .find(|record| matches(filter, &record.metadata))
                .cloned()
                .ok_or_else(|| GlmError::UnmatchedFilter {
                    filter: describe(filter),
                })
        })
        .collect()
}
