//! Regressor tables feeding the first-level design matrix.
//!
//! Two kinds of source exist:
//!
//! - **sparse**: event rows (onset, duration, condition, amplitude) that the
//!   engine resamples onto the acquisition grid;
//! - **dense**: columns already sampled once per volume (motion confounds,
//!   caller-supplied drift terms).
//!
//! Both are read from a keyed [`RegressorStore`].

mod store;

pub use store::{RegressorStore, DENSE_KEY, SPARSE_KEY};

use crate::error::{GlmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Event row as stored in the sparse table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Onset in seconds from the first volume.
    pub onset: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Condition label.
    pub condition: String,
    /// Amplitude; absent or non-finite means undefined.
    #[serde(default)]
    pub amplitude: Option<f64>,
}

/// Event in the vocabulary the modeling engine expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Onset in seconds.
    pub onset: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Condition label (`condition` in the sparse table).
    pub trial_type: String,
    /// Amplitude (`amplitude` in the sparse table).
    pub modulation: f64,
}

/// Event-based regressors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseTable {
    rows: Vec<EventRow>,
}

impl SparseTable {
    /// Wraps event rows.
    #[must_use]
    pub fn new(rows: Vec<EventRow>) -> Self {
        Self { rows }
    }

    /// Raw rows, including those with undefined amplitude.
    #[must_use]
    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    /// Renames `condition` → `trial_type` and `amplitude` → `modulation`,
    /// dropping rows whose amplitude is undefined.
    #[must_use]
    pub fn to_events(&self) -> Vec<Event> {
        self.rows
            .iter()
            .filter_map(|row| {
                let modulation = row.amplitude.filter(|a| a.is_finite())?;
                Some(Event {
                    onset: row.onset,
                    duration: row.duration,
                    trial_type: row.condition.clone(),
                    modulation,
                })
            })
            .collect()
    }
}

/// Distinct trial types, sorted.
#[must_use]
pub fn trial_types(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.trial_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseColumn {
    name: String,
    values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseTableRepr {
    columns: Vec<DenseColumn>,
}

/// Regressors sampled once per acquisition volume, with named columns.
///
/// # Examples
///
/// ```
/// use fmri_glm::regressors::DenseTable;
///
/// let table = DenseTable::new(vec![
///     ("trans_x".to_string(), vec![0.0, 0.1, 0.2]),
///     ("rot_z".to_string(), vec![0.0, 0.0, 0.01]),
/// ])
/// .expect("columns have equal length and unique names");
/// assert_eq!(table.shape(), (3, 2));
/// assert!(table.contains("rot_z"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DenseTableRepr", into = "DenseTableRepr")]
pub struct DenseTable {
    columns: Vec<(String, Vec<f64>)>,
    n_rows: usize,
}

impl DenseTable {
    /// Creates a table from named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no columns, lengths differ, or names are
    /// empty or duplicated.
    pub fn new(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let Some((_, first)) = columns.first() else {
            return Err(GlmError::InvalidTable(
                "dense table must have at least one column".into(),
            ));
        };
        let n_rows = first.len();

        let mut seen = BTreeSet::new();
        for (name, values) in &columns {
            if name.is_empty() {
                return Err(GlmError::InvalidTable("column names cannot be empty".into()));
            }
            if values.len() != n_rows {
                return Err(GlmError::InvalidTable(format!(
                    "column '{name}' has {} rows, expected {n_rows}",
                    values.len()
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(GlmError::InvalidTable(format!(
                    "duplicate column name '{name}'"
                )));
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Returns the shape as (`n_rows`, `n_cols`).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    /// Returns the number of rows (volumes).
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Returns the column names in table order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    /// Whether a column with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Returns a column by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column doesn't exist.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| GlmError::InvalidTable(format!("column '{name}' not found")))
    }

    /// Returns an iterator over columns as (name, values) pairs.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }
}

impl TryFrom<DenseTableRepr> for DenseTable {
    type Error = GlmError;

    fn try_from(repr: DenseTableRepr) -> Result<Self> {
        Self::new(
            repr.columns
                .into_iter()
                .map(|c| (c.name, c.values))
                .collect(),
        )
    }
}

impl From<DenseTable> for DenseTableRepr {
    fn from(table: DenseTable) -> Self {
        Self {
            columns: table
                .columns
                .into_iter()
                .map(|(name, values)| DenseColumn { name, values })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "regressors_tests.rs"]
mod tests;
