//! Integration tests for the bounded Levenberg-Marquardt solver.

use approx::assert_relative_eq;
use fdfit_rs::lm::{DiffMethod, LevenbergMarquardt, LmConfig};
use fdfit_rs::{FitError, Problem, Result};
use ndarray::{array, Array1, Array2};

/// The Rosenbrock function in a least squares form.
/// f(x,y) = (1-x)² + 100(y-x²)²
struct RosenbrockProblem;

impl Problem for RosenbrockProblem {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let (x, y) = (params[0], params[1]);
        Ok(array![1.0 - x, 10.0 * (y - x * x)])
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let x = params[0];
        Ok(array![[-1.0, 0.0], [-20.0 * x, 10.0]])
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }
}

/// Exponential decay: f(x) = a * exp(-x / tau), numerical Jacobian only
struct Decay {
    x: Array1<f64>,
    y: Array1<f64>,
}

impl Decay {
    fn new(a: f64, tau: f64) -> Self {
        let x = Array1::linspace(0.0, 8.0, 25);
        let y = x.mapv(|x| a * (-x / tau).exp());
        Self { x, y }
    }
}

impl Problem for Decay {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        if params.len() != 2 {
            return Err(FitError::ShapeMismatch {
                what: "decay parameters".to_string(),
                expected: 2,
                actual: params.len(),
            });
        }
        let (a, tau) = (params[0], params[1]);
        Ok(self.x.mapv(|x| a * (-x / tau).exp()) - &self.y)
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        self.x.len()
    }
}

#[test]
fn test_rosenbrock_optimization() {
    let lm = LevenbergMarquardt::new()
        .with_ftol(1e-12)
        .with_xtol(1e-12)
        .with_gtol(1e-12);

    let result = lm.minimize(&RosenbrockProblem, array![-1.2, 1.0]).unwrap();

    assert!(result.success, "{}", result);
    assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-4);
    assert!(result.cost < 1e-8);
}

#[test]
fn test_rosenbrock_with_active_bound() {
    // Minimum at (1, 1) lies outside x <= 0.5; best point is on the bound
    let lower = array![f64::NEG_INFINITY, f64::NEG_INFINITY];
    let upper = array![0.5, f64::INFINITY];

    let result = LevenbergMarquardt::new()
        .minimize_bounded(&RosenbrockProblem, array![0.0, 0.0], &lower, &upper)
        .unwrap();

    assert!(result.params[0] <= 0.5);
    assert_relative_eq!(result.params[0], 0.5, epsilon = 1e-3);
    assert_relative_eq!(result.params[1], 0.25, epsilon = 1e-3);
}

#[test]
fn test_finite_difference_matches_analytical() {
    let analytical = LevenbergMarquardt::new()
        .minimize(&RosenbrockProblem, array![-1.2, 1.0])
        .unwrap();
    let numerical = LevenbergMarquardt::new()
        .with_differentiation_method(DiffMethod::FiniteDifference)
        .minimize(&RosenbrockProblem, array![-1.2, 1.0])
        .unwrap();

    assert!(numerical.success, "{}", numerical);
    assert!(numerical.func_evals > analytical.func_evals);
    for (a, n) in analytical.params.iter().zip(numerical.params.iter()) {
        assert_relative_eq!(*a, *n, epsilon = 1e-3);
    }
}

#[test]
fn test_decay_without_jacobian() {
    let problem = Decay::new(3.0, 2.0);
    assert!(!problem.has_custom_jacobian());

    let result = LevenbergMarquardt::new()
        .minimize_bounded(
            &problem,
            array![1.0, 1.0],
            &array![0.0, 0.1],
            &array![10.0, 10.0],
        )
        .unwrap();

    assert!(result.success, "{}", result);
    assert_relative_eq!(result.params[0], 3.0, max_relative = 1e-4);
    assert_relative_eq!(result.params[1], 2.0, max_relative = 1e-4);
    assert_eq!(result.residuals.len(), 25);
}

#[test]
fn test_max_iterations_is_not_success() {
    let result = LevenbergMarquardt::new()
        .with_max_iterations(1)
        .with_ftol(0.0)
        .with_xtol(0.0)
        .with_gtol(0.0)
        .minimize(&RosenbrockProblem, array![-1.2, 1.0])
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_config_from_json() {
    let config: LmConfig = serde_json::from_str(r#"{"max_iterations": 50, "gtol": 1e-6}"#).unwrap();
    assert_eq!(config.max_iterations, 50);
    assert_eq!(config.gtol, 1e-6);
    // Missing keys fall back to the defaults
    assert_eq!(config.ftol, 1e-6);
    assert_eq!(config.diff_method, DiffMethod::Analytical);
}
