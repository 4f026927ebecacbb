//! # Fit Statistics
//!
//! Post-fit quantities derived from the stacked residual vector and the
//! Jacobian of a global fit.
//!
//! The noise model is Gaussian with one a-posteriori standard deviation for
//! all points, estimated from the residuals themselves:
//!
//!   sigma = sqrt(var(r))
//!
//! The parameter covariance is the inverse of the approximate Hessian of the
//! scaled problem:
//!
//!   cov = sigma^2 * inv(J^T * J)
//!
//! which is valid when the residuals are small.

use crate::error::Result;
use crate::utils::linalg;
use ndarray::{Array1, Array2};
use std::f64::consts::PI;

/// A-posteriori noise level: the population standard deviation of `residuals`
pub fn residual_sigma(residuals: &Array1<f64>) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    residuals.var(0.0).sqrt()
}

/// Gaussian log-likelihood of `residuals` with noise level `sigma`
///
/// Undefined (NaN) for an exact fit, where `sigma` is zero.
pub fn log_likelihood(residuals: &Array1<f64>, sigma: f64) -> f64 {
    let n = residuals.len() as f64;
    let chi_squared = residuals.mapv(|r| (r / sigma).powi(2)).sum();
    -0.5 * n * (2.0 * PI).ln() - n * sigma.ln() - 0.5 * chi_squared
}

/// Akaike information criterion for `n_free` fitted parameters
pub fn aic(log_likelihood: f64, n_free: usize) -> f64 {
    2.0 * n_free as f64 - 2.0 * log_likelihood
}

/// AIC with the small-sample correction
pub fn aicc(log_likelihood: f64, n_free: usize, n_residuals: usize) -> f64 {
    let k = n_free as f64;
    aic(log_likelihood, n_free) + (2.0 * k * k + 2.0 * k) / (n_residuals as f64 - k - 1.0)
}

/// Bayesian information criterion
pub fn bic(log_likelihood: f64, n_free: usize, n_residuals: usize) -> f64 {
    n_free as f64 * (n_residuals as f64).ln() - 2.0 * log_likelihood
}

/// Parameter covariance `sigma^2 * inv(J^T J)` for a residual Jacobian `J`
/// of shape `(n_residuals, n_parameters)`
///
/// # Errors
///
/// [`crate::FitError::SingularMatrix`] if `J^T J` is not positive definite,
/// e.g. when a parameter has no influence on the residuals.
pub fn covariance(jacobian: &Array2<f64>, sigma: f64) -> Result<Array2<f64>> {
    let jtj = jacobian.t().dot(jacobian);
    let inverse = linalg::cholesky_inverse(&jtj)?;
    Ok(inverse * (sigma * sigma))
}

/// Calculate correlation matrix from covariance matrix.
///
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
///
/// Entries involving a parameter with zero variance are zero.
pub fn correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Standard errors: square roots of the covariance diagonal
pub fn standard_errors(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
