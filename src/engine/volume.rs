//! Flat volumetric container for series, masks and contrast maps.

use crate::error::{GlmError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One or more volumes of `n_voxels` values, stored volume by volume.
///
/// A BOLD run is a map with one volume per acquisition; a mask or a t map
/// has a single volume.
///
/// # Examples
///
/// ```
/// use fmri_glm::engine::VolumetricMap;
///
/// let run = VolumetricMap::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// assert_eq!(run.volume(1), &[4.0, 5.0, 6.0]);
/// assert_eq!(run.voxel_series(2), vec![3.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumetricMap {
    n_volumes: usize,
    n_voxels: usize,
    data: Vec<f64>,
}

impl VolumetricMap {
    /// Creates a map from volume-major data.
    ///
    /// # Errors
    ///
    /// Returns an error if `data.len() != n_volumes * n_voxels`.
    pub fn new(n_volumes: usize, n_voxels: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != n_volumes * n_voxels {
            return Err(GlmError::dimension_mismatch(
                "volumes * voxels",
                n_volumes * n_voxels,
                data.len(),
            ));
        }
        Ok(Self {
            n_volumes,
            n_voxels,
            data,
        })
    }

    /// Stacks single-volume maps into one multi-volume map, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if `maps` is empty, a map has more than one volume, or
    /// voxel counts differ.
    pub fn stack(maps: &[Self]) -> Result<Self> {
        let first = maps
            .first()
            .ok_or_else(|| GlmError::InvalidTable("cannot stack zero maps".into()))?;
        let n_voxels = first.n_voxels;
        let mut data = Vec::with_capacity(maps.len() * n_voxels);
        for map in maps {
            if map.n_volumes != 1 {
                return Err(GlmError::dimension_mismatch(
                    "volumes per stacked map",
                    1,
                    map.n_volumes,
                ));
            }
            if map.n_voxels != n_voxels {
                return Err(GlmError::dimension_mismatch("voxels", n_voxels, map.n_voxels));
            }
            data.extend_from_slice(&map.data);
        }
        Self::new(maps.len(), n_voxels, data)
    }

    /// Number of volumes.
    #[must_use]
    pub fn n_volumes(&self) -> usize {
        self.n_volumes
    }

    /// Number of voxels per volume.
    #[must_use]
    pub fn n_voxels(&self) -> usize {
        self.n_voxels
    }

    /// Values of one volume.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= n_volumes`.
    #[must_use]
    pub fn volume(&self, idx: usize) -> &[f64] {
        &self.data[idx * self.n_voxels..(idx + 1) * self.n_voxels]
    }

    /// Values of one voxel across volumes.
    #[must_use]
    pub fn voxel_series(&self, voxel: usize) -> Vec<f64> {
        (0..self.n_volumes)
            .map(|v| self.data[v * self.n_voxels + voxel])
            .collect()
    }

    /// Writes the map as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    /// Reads a map written by [`VolumetricMap::save`].
    ///
    /// # Errors
    ///
    /// Returns [`GlmError::MissingInput`] if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GlmError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let map: Self = serde_json::from_slice(&fs::read(path)?)?;
        // Deserialization bypasses `new`.
        Self::new(map.n_volumes, map.n_voxels, map.data)
    }
}
