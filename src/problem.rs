//! Problem definition trait.
//!
//! A [`Problem`] is the residual + Jacobian callback contract between a
//! least-squares solver and whatever produces residuals. The global fit
//! implements it over its free parameters; tests implement it directly.

use crate::error::Result;
use ndarray::{Array1, Array2};

/// A nonlinear least-squares problem
///
/// The solver minimizes `0.5 * sum(r_i^2)` over the parameters. Calls must be
/// free of side effects: the solver may evaluate trial points it then rejects.
pub trait Problem {
    /// Residual vector at `params`
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Number of parameters
    fn parameter_count(&self) -> usize;

    /// Number of residuals
    fn residual_count(&self) -> usize;

    /// Jacobian of the residuals, shape `(residual_count, parameter_count)`
    ///
    /// Defaults to forward finite differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Whether [`Problem::jacobian`] is analytical
    fn has_custom_jacobian(&self) -> bool {
        false
    }

    /// Sum of squared residuals
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}
