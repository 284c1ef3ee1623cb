//! Ordinary least squares engine.
//!
//! # Design construction
//!
//! - one boxcar per trial type (sorted), the summed `modulation` of events
//!   active at each frame time;
//! - confound columns in request order;
//! - the requested drift basis;
//! - `constant`.
//!
//! No haemodynamic convolution is applied.
//!
//! # Estimation
//!
//! β = (X'X)⁻¹X'y per voxel, σ² = RSS / (n - p).
//!
//! - effect size: Cβ
//! - t: cβ / √(σ² c(X'X)⁻¹c')
//! - F: (Cβ)'(C(X'X)⁻¹C')⁻¹(Cβ) / (q σ²)

use super::{FittedModel, ModelingEngine, OutputType, VolumetricMap};
use crate::contrast::ContrastType;
use crate::design::{DesignMatrix, DesignRequest, DriftModel, COSINE_DRIFT_COLUMN};
use crate::error::{GlmError, Result};
use crate::primitives::Matrix;
use crate::regressors::{trial_types, Event};
use std::f64::consts::PI;

/// Default high-pass cutoff of the cosine drift basis, in Hz.
pub const DEFAULT_HIGH_PASS: f64 = 0.01;

const CONSTANT_COLUMN: &str = "constant";

/// Least squares engine with a configurable drift cutoff.
#[derive(Debug, Clone)]
pub struct OlsEngine {
    high_pass: f64,
}

impl Default for OlsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OlsEngine {
    /// Creates an engine with a 0.01 Hz cosine cutoff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            high_pass: DEFAULT_HIGH_PASS,
        }
    }

    /// Sets the cosine drift cutoff frequency (Hz).
    #[must_use]
    pub fn with_high_pass(mut self, high_pass: f64) -> Self {
        self.high_pass = high_pass;
        self
    }

    fn cosine_drift(&self, frame_times: &[f64]) -> Vec<(String, Vec<f64>)> {
        let n = frame_times.len();
        let dt = frame_spacing(frame_times);
        let order = ((2.0 * n as f64 * self.high_pass * dt).floor() as usize)
            .min(n.saturating_sub(1));
        let norm = (2.0 / n as f64).sqrt();

        // The constant term of the DCT basis is added separately.
        (1..order)
            .map(|k| {
                let values = (0..n)
                    .map(|i| norm * (PI / n as f64 * (i as f64 + 0.5) * k as f64).cos())
                    .collect();
                (format!("cosine_{:02}", k - 1), values)
            })
            .collect()
    }
}

fn frame_spacing(frame_times: &[f64]) -> f64 {
    match frame_times {
        [first, second, ..] => second - first,
        _ => 1.0,
    }
}

fn boxcars(events: &[Event], frame_times: &[f64]) -> Vec<(String, Vec<f64>)> {
    let dt = frame_spacing(frame_times);
    trial_types(events)
        .into_iter()
        .map(|trial_type| {
            let values = frame_times
                .iter()
                .map(|&t| {
                    events
                        .iter()
                        .filter(|e| e.trial_type == trial_type)
                        .filter(|e| {
                            if e.duration > 0.0 {
                                e.onset <= t && t < e.onset + e.duration
                            } else {
                                // Impulse lands on the frame whose interval holds the onset.
                                t <= e.onset && e.onset < t + dt
                            }
                        })
                        .map(|e| e.modulation)
                        .sum::<f64>()
                })
                .collect();
            (trial_type, values)
        })
        .collect()
}

/// Legendre-style polynomials of degree 1..=order, orthogonal to the
/// constant and to each other, unit norm.
fn polynomial_drift(frame_times: &[f64], order: usize) -> Vec<(String, Vec<f64>)> {
    let n = frame_times.len();
    let t_max = frame_times.iter().copied().fold(0.0_f64, f64::max).max(f64::EPSILON);
    let mut basis: Vec<Vec<f64>> = vec![vec![1.0 / (n as f64).sqrt(); n]];
    let mut columns = Vec::with_capacity(order);

    for degree in 1..=order {
        let mut values: Vec<f64> = frame_times
            .iter()
            .map(|t| (t / t_max).powi(degree as i32))
            .collect();
        for b in &basis {
            let proj: f64 = values.iter().zip(b).map(|(v, w)| v * w).sum();
            values.iter_mut().zip(b).for_each(|(v, w)| *v -= proj * w);
        }
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            break;
        }
        values.iter_mut().for_each(|v| *v /= norm);
        basis.push(values.clone());
        columns.push((format!("drift_{degree:02}"), values));
    }
    columns
}

impl ModelingEngine for OlsEngine {
    type Fitted = OlsFit;

    fn build_design_matrix(&self, request: &DesignRequest) -> Result<DesignMatrix> {
        let frame_times = &request.frame_times;
        let n = frame_times.len();
        if n == 0 {
            return Err(GlmError::InvalidParameter {
                param: "frame_times".into(),
                value: "[]".into(),
                constraint: "at least one volume".into(),
            });
        }

        let mut columns = Vec::new();

        if let Some(events) = &request.events {
            columns.extend(boxcars(events, frame_times));
        }

        if let Some(confounds) = &request.confounds {
            if confounds.n_rows() != n {
                return Err(GlmError::dimension_mismatch(
                    "confound rows (volumes)",
                    n,
                    confounds.n_rows(),
                ));
            }
            let names = request
                .confound_names
                .clone()
                .unwrap_or_else(|| confounds.column_names());
            for name in names {
                let values = confounds.column(&name)?.to_vec();
                columns.push((name, values));
            }
        }

        match request.drift_model {
            Some(DriftModel::Cosine) => columns.extend(self.cosine_drift(frame_times)),
            Some(DriftModel::Polynomial { order }) => {
                columns.extend(polynomial_drift(frame_times, order));
            }
            None => {}
        }

        if !columns.iter().any(|(name, _)| name == CONSTANT_COLUMN) {
            columns.push((CONSTANT_COLUMN.to_string(), vec![1.0; n]));
        }

        tracing::debug!(
            columns = columns.len(),
            volumes = n,
            has_cosine = columns.iter().any(|(name, _)| name == COSINE_DRIFT_COLUMN),
            "built design matrix"
        );
        DesignMatrix::new(frame_times.clone(), columns)
    }

    fn fit(
        &self,
        data: &VolumetricMap,
        mask: Option<&VolumetricMap>,
        design: &DesignMatrix,
    ) -> Result<OlsFit> {
        let n = design.n_rows();
        let p = design.n_cols();
        if data.n_volumes() != n {
            return Err(GlmError::DimensionMismatch {
                expected: format!("{n} volumes (design rows)"),
                actual: format!("{} volumes in data", data.n_volumes()),
            });
        }
        if n <= p {
            return Err(GlmError::SingularDesign(format!(
                "{n} observations cannot estimate {p} regressors with residual degrees of freedom"
            )));
        }

        let in_mask: Vec<bool> = match mask {
            Some(mask) => {
                if mask.n_voxels() != data.n_voxels() || mask.n_volumes() != 1 {
                    return Err(GlmError::DimensionMismatch {
                        expected: format!("single-volume mask of {} voxels", data.n_voxels()),
                        actual: format!(
                            "{} volumes of {} voxels",
                            mask.n_volumes(),
                            mask.n_voxels()
                        ),
                    });
                }
                mask.volume(0).iter().map(|&v| v != 0.0).collect()
            }
            None => vec![true; data.n_voxels()],
        };

        let x = design.values();
        let xt = x.transpose();
        let xtx = xt
            .matmul(x)
            .map_err(|e| GlmError::SingularDesign(format!("X'X computation failed: {e}")))?;
        let xtx_inv = xtx
            .inverse_spd()
            .map_err(|e| GlmError::SingularDesign(format!("X'X is not invertible: {e}")))?;
        let pinv = xtx_inv
            .matmul(&xt)
            .map_err(|e| GlmError::SingularDesign(format!("pseudo-inverse failed: {e}")))?;

        let dof = n - p;
        let mut betas = Matrix::zeros(p, data.n_voxels());
        let mut residual_variance = vec![0.0; data.n_voxels()];

        for (voxel, _) in in_mask.iter().enumerate().filter(|(_, inside)| **inside) {
            let y = data.voxel_series(voxel);
            let beta = pinv
                .matvec(&y)
                .map_err(|e| GlmError::Other(e.to_string()))?;
            let fitted = x.matvec(&beta).map_err(|e| GlmError::Other(e.to_string()))?;
            let rss: f64 = y.iter().zip(&fitted).map(|(a, b)| (a - b) * (a - b)).sum();

            for (j, b) in beta.into_iter().enumerate() {
                betas.set(j, voxel, b);
            }
            residual_variance[voxel] = rss / dof as f64;
        }

        tracing::debug!(
            voxels = in_mask.iter().filter(|&&m| m).count(),
            regressors = p,
            dof,
            "fitted OLS model"
        );

        Ok(OlsFit {
            betas,
            residual_variance,
            in_mask,
            xtx_inv,
        })
    }
}

/// Per-voxel least squares estimates.
#[derive(Debug, Clone)]
pub struct OlsFit {
    betas: Matrix<f64>,
    residual_variance: Vec<f64>,
    in_mask: Vec<bool>,
    xtx_inv: Matrix<f64>,
}

impl OlsFit {
    /// Parameter estimates, regressors × voxels.
    #[must_use]
    pub fn betas(&self) -> &Matrix<f64> {
        &self.betas
    }

    /// Residual variance per voxel (zero outside the mask).
    #[must_use]
    pub fn residual_variance(&self) -> &[f64] {
        &self.residual_variance
    }

    fn effects(&self, row: &[f64]) -> Vec<f64> {
        (0..self.betas.n_cols())
            .map(|v| {
                row.iter()
                    .enumerate()
                    .map(|(j, c)| c * self.betas.get(j, v))
                    .sum()
            })
            .collect()
    }

    fn contrast_covariance(&self, c: &Matrix<f64>) -> Result<Matrix<f64>> {
        c.matmul(&self.xtx_inv)
            .and_then(|cx| cx.matmul(&c.transpose()))
            .map_err(|e| GlmError::Other(format!("contrast covariance failed: {e}")))
    }

    fn t_stat(&self, row: &[f64]) -> Result<Vec<f64>> {
        let c = Matrix::from_vec(1, row.len(), row.to_vec())
            .map_err(|e| GlmError::Other(e.to_string()))?;
        let var_c = self.contrast_covariance(&c)?.get(0, 0);
        Ok(self
            .effects(row)
            .into_iter()
            .zip(&self.residual_variance)
            .map(|(effect, &s2)| ratio(effect, (s2 * var_c).sqrt()))
            .collect())
    }

    fn f_stat(&self, weights: &[Vec<f64>]) -> Result<Vec<f64>> {
        let q = weights.len();
        let p = self.betas.n_rows();
        let c = Matrix::from_vec(q, p, weights.concat())
            .map_err(|e| GlmError::Other(e.to_string()))?;
        let cov_inv = self.contrast_covariance(&c)?.inverse_spd().map_err(|e| {
            GlmError::SingularDesign(format!("F contrast rows are linearly dependent: {e}"))
        })?;
        let effects: Vec<Vec<f64>> = weights.iter().map(|row| self.effects(row)).collect();

        Ok((0..self.betas.n_cols())
            .map(|v| {
                let e: Vec<f64> = effects.iter().map(|row| row[v]).collect();
                let quad: f64 = cov_inv
                    .matvec(&e)
                    .map(|m| m.iter().zip(&e).map(|(a, b)| a * b).sum())
                    .unwrap_or(0.0);
                ratio(quad, q as f64 * self.residual_variance[v])
            })
            .collect())
    }

    fn masked(&self, mut values: Vec<f64>) -> Vec<f64> {
        values
            .iter_mut()
            .zip(&self.in_mask)
            .filter(|(_, inside)| !**inside)
            .for_each(|(v, _)| *v = 0.0);
        values
    }
}

/// Voxels without residual variance get a zero statistic.
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

impl FittedModel for OlsFit {
    fn compute_contrast(
        &self,
        weights: &[Vec<f64>],
        contrast_type: ContrastType,
        output: OutputType,
    ) -> Result<VolumetricMap> {
        let p = self.betas.n_rows();
        let n_voxels = self.betas.n_cols();
        if weights.is_empty() {
            return Err(GlmError::dimension_mismatch("contrast rows (at least)", 1, 0));
        }
        if let Some(row) = weights.iter().find(|row| row.len() != p) {
            return Err(GlmError::dimension_mismatch("contrast row length", p, row.len()));
        }

        match (output, contrast_type) {
            (OutputType::EffectSize, _) | (OutputType::Stat, ContrastType::Effect) => {
                let data = weights
                    .iter()
                    .flat_map(|row| self.masked(self.effects(row)))
                    .collect();
                VolumetricMap::new(weights.len(), n_voxels, data)
            }
            (OutputType::Stat, ContrastType::T) => {
                if weights.len() != 1 {
                    return Err(GlmError::dimension_mismatch("t contrast rows", 1, weights.len()));
                }
                VolumetricMap::new(1, n_voxels, self.masked(self.t_stat(&weights[0])?))
            }
            (OutputType::Stat, ContrastType::F) => {
                VolumetricMap::new(1, n_voxels, self.masked(self.f_stat(weights)?))
            }
        }
    }
}

#[cfg(test)]
#[path = "ols_tests.rs"]
mod tests;
