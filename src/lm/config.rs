//! Configuration options for the solvers.
//!
//! [`LmConfig`] drives the bounded Levenberg-Marquardt solver of a global fit,
//! [`InversionConfig`] the batched diagonal solver used to invert models, and
//! [`Tolerance`] the comparison of analytical against numerical derivatives.

use serde::{Deserialize, Serialize};

/// Method for calculating the Jacobian matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffMethod {
    /// Use finite differences to approximate the Jacobian
    FiniteDifference,

    /// Use the analytical Jacobian when the problem provides one, finite
    /// differences otherwise
    #[default]
    Analytical,
}

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of iterations. Default: 200
    pub max_iterations: usize,

    /// Tolerance for relative change in cost. Default: 1e-6
    pub ftol: f64,

    /// Tolerance for relative change in parameter values. Default: 1e-6
    pub xtol: f64,

    /// Tolerance for the scaled gradient norm. Default: 1e-8
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Method to use for calculating the Jacobian. Default: Analytical
    pub diff_method: DiffMethod,

    /// Whether to calculate and return the Jacobian at the solution. Default: true
    pub calc_jacobian: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-6,
            xtol: 1e-6,
            gtol: 1e-8,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            diff_method: DiffMethod::default(),
            calc_jacobian: true,
        }
    }
}

/// Configuration of the batched inversion solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InversionConfig {
    /// Maximum number of iterations. Default: 100
    pub max_iterations: usize,

    /// Per-point tolerance for relative change in cost. Default: 1e-6
    pub ftol: f64,

    /// Per-point tolerance for relative change in the solution. Default: 1e-6
    pub xtol: f64,

    /// Per-point tolerance for the scaled gradient. Default: 1e-6
    pub gtol: f64,

    /// Relative step of the forward difference used without a derivative. Default: 1e-8
    pub diff_step: f64,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-6,
            xtol: 1e-6,
            gtol: 1e-6,
            diff_step: 1e-8,
        }
    }
}

/// Closeness test for derivative verification: `|a - b| <= atol + rtol * |b|`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-8,
        }
    }
}

impl Tolerance {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    /// Whether `actual` is close to `reference`
    pub fn is_close(&self, actual: f64, reference: f64) -> bool {
        (actual - reference).abs() <= self.atol + self.rtol * reference.abs()
    }
}
