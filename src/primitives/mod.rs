//! Dense numeric primitives.
//!
//! Only what the reference engine needs: a row-major `Matrix<f64>` with
//! products and a Cholesky-based solver for symmetric positive definite
//! systems (normal equations, contrast covariance).

mod matrix;

pub use matrix::Matrix;
