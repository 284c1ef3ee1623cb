//! Keyed storage for regressor tables.
//!
//! A store is a single JSON document mapping table keys to tables. The
//! sparse table lives under [`SPARSE_KEY`] as an array of event rows, the
//! dense table under [`DENSE_KEY`] as `{"columns": [{"name", "values"}]}`.

use super::{DenseTable, SparseTable};
use crate::error::{GlmError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Key of the event table.
pub const SPARSE_KEY: &str = "sparse";

/// Key of the per-volume table.
pub const DENSE_KEY: &str = "dense";

/// An opened regressor store.
#[derive(Debug, Clone)]
pub struct RegressorStore {
    path: PathBuf,
    tables: Map<String, Value>,
}

impl RegressorStore {
    /// Reads the whole store into memory.
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::MissingInput`] if the file does not exist, or a
    /// JSON error if it is not an object of tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GlmError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let tables: Map<String, Value> = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(Self {
            path: path.to_path_buf(),
            tables,
        })
    }

    /// Writes tables under their keys, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(
        path: impl AsRef<Path>,
        sparse: Option<&SparseTable>,
        dense: Option<&DenseTable>,
    ) -> Result<()> {
        let mut tables = Map::new();
        if let Some(sparse) = sparse {
            tables.insert(SPARSE_KEY.to_string(), serde_json::to_value(sparse)?);
        }
        if let Some(dense) = dense {
            tables.insert(DENSE_KEY.to_string(), serde_json::to_value(dense)?);
        }
        fs::write(path, serde_json::to_vec_pretty(&tables)?)?;
        Ok(())
    }

    /// Path the store was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deserializes the table stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::MissingTable`] if the key is absent.
    pub fn table<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.tables.get(key).ok_or_else(|| GlmError::MissingTable {
            key: key.to_string(),
            path: self.path.clone(),
        })?;
        Ok(T::deserialize(value)?)
    }

    /// The event table.
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::MissingTable`] if the store has no sparse table.
    pub fn sparse(&self) -> Result<SparseTable> {
        self.table(SPARSE_KEY)
    }

    /// The per-volume table.
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::MissingTable`] if the store has no dense table.
    pub fn dense(&self) -> Result<DenseTable> {
        self.table(DENSE_KEY)
    }
}
