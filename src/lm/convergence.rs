//! Convergence criteria for the least-squares solvers.
//!
//! The tests follow the trust-region-reflective conventions: a relative cost
//! reduction test, a relative step size test, and an infinity-norm test on
//! the gradient scaled by the distance to the bounds it points at.

use super::config::LmConfig;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Possible convergence states for an optimization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small function value change.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small scaled gradient.
    GradientConvergence,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// No trial step decreased the cost before the damping reached its maximum.
    DampingExhausted,

    /// The algorithm has terminated due to a numerical error.
    NumericalError,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small function value change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::DampingExhausted => "Terminated: damping reached its maximum",
            ConvergenceStatus::NumericalError => "Terminated: numerical error",
        }
    }
}

impl fmt::Display for ConvergenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Criteria for determining when an optimization algorithm has converged.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance for change in parameter values.
    pub xtol: f64,

    /// Tolerance for change in function value.
    pub ftol: f64,

    /// Tolerance for the scaled gradient.
    pub gtol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from_config(&LmConfig::default())
    }
}

impl ConvergenceCriteria {
    /// Creates a new set of convergence criteria with the given tolerances.
    pub fn new(xtol: f64, ftol: f64, gtol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            gtol,
            max_iterations,
        }
    }

    pub fn from_config(config: &LmConfig) -> Self {
        Self::new(config.xtol, config.ftol, config.gtol, config.max_iterations)
    }

    /// Check an accepted step from `params` to `new_params`.
    ///
    /// `cost` and `new_cost` are the sums of squared residuals before and
    /// after the step; `gradient_norm` is the scaled gradient at the new point.
    pub fn check(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        cost: f64,
        new_cost: f64,
        gradient_norm: f64,
        iterations: usize,
    ) -> ConvergenceStatus {
        if gradient_norm < self.gtol {
            return ConvergenceStatus::GradientConvergence;
        }

        let reduction = cost - new_cost;
        if reduction >= 0.0 && reduction < self.ftol * cost {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        let step_norm = norm(&(new_params - params));
        if step_norm < self.xtol * (self.xtol + norm(new_params)) {
            return ConvergenceStatus::ParameterConvergence;
        }

        if iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }

        ConvergenceStatus::Running
    }
}

/// Euclidean norm
pub fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Gradient scaled by the distance to the bound it points at
///
/// `gradient` is `Jᵀr`. A component pushing towards a finite bound is
/// multiplied by the distance to that bound; other components are left
/// unscaled. A parameter pinned against a bound it cannot cross therefore
/// does not block gradient convergence.
pub fn scaled_gradient(
    params: &Array1<f64>,
    gradient: &Array1<f64>,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
) -> Array1<f64> {
    let mut scaled = gradient.clone();
    for i in 0..params.len() {
        let g = gradient[i];
        let v = if g < 0.0 && upper[i].is_finite() {
            upper[i] - params[i]
        } else if g > 0.0 && lower[i].is_finite() {
            params[i] - lower[i]
        } else {
            1.0
        };
        scaled[i] = v * g;
    }
    scaled
}

/// Infinity norm
pub fn max_abs(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0, |acc: f64, x| acc.max(x.abs()))
}
