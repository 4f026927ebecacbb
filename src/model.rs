//! Composable, differentiable models.
//!
//! A [`Model`] is a named callable `y = f(x, p)` with an ordered list of
//! local parameter names. Models compose into sums, invert into models of the
//! swapped variables, and shift their independent variable by a fitted
//! offset. Each variant propagates whether an analytical Jacobian and
//! derivative are available.
//!
//! ```
//! use fdfit_rs::model::Model;
//! use ndarray::{array, Array2};
//!
//! let line = Model::new("line", &["slope", "intercept"], |x, p| Ok(x * p[0] + p[1]))
//!     .with_jacobian(|x, _p| {
//!         let mut jac = Array2::ones((2, x.len()));
//!         jac.row_mut(0).assign(x);
//!         Ok(jac)
//!     })
//!     .with_derivative(|x, p| Ok(x.mapv(|_| p[0])));
//!
//! let y = line.evaluate(&array![0.0, 1.0], &[2.0, 1.0]).unwrap();
//! assert_eq!(y.to_vec(), vec![1.0, 3.0]);
//! assert!(line.has_jacobian() && line.has_derivative());
//! ```

use crate::error::{FitError, Result};
use crate::inversion;
use crate::lm::config::{InversionConfig, Tolerance};
use crate::lm::diagonal::PointwiseFn;
use crate::parameters::{Parameter, Parameters};
use crate::utils::finite_difference::{self, DEFAULT_DX};
use ndarray::{Array1, Array2};
use std::fmt;
use std::ops::Add;
use std::sync::Arc;

/// Model function: `f(x, p)` with one output per element of `x`
pub type ModelFn = Arc<dyn Fn(&Array1<f64>, &[f64]) -> Result<Array1<f64>> + Send + Sync>;

/// Parameter Jacobian: shape `(n_params, n_points)`
pub type JacobianFn = Arc<dyn Fn(&Array1<f64>, &[f64]) -> Result<Array2<f64>> + Send + Sync>;

#[derive(Clone)]
enum ModelKind {
    Primitive {
        function: ModelFn,
        jacobian: Option<JacobianFn>,
        derivative: Option<ModelFn>,
    },
    Composite {
        lhs: Arc<Model>,
        rhs: Arc<Model>,
        lhs_indices: Vec<usize>,
        rhs_indices: Vec<usize>,
    },
    Inverted {
        model: Arc<Model>,
        lower: f64,
        upper: f64,
        config: InversionConfig,
    },
    /// Slot 0 is the offset, the wrapped model's slots follow
    IndependentOffset { model: Arc<Model> },
}

/// A named model with an ordered local parameter signature
#[derive(Clone)]
pub struct Model {
    name: String,
    parameters: Vec<(String, Option<Parameter>)>,
    kind: ModelKind,
}

/// Outcome of comparing an analytical derivative with a numerical one
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeCheck {
    /// Whether every entry matched within tolerance
    pub is_close: bool,

    /// Maximum absolute deviation per parameter (a single entry for derivatives)
    pub max_deviation: Vec<f64>,
}

impl Model {
    /// Create a model from a function of the independent variable and a
    /// parameter slice ordered like `parameter_names`.
    pub fn new<F>(name: impl Into<String>, parameter_names: &[&str], function: F) -> Self
    where
        F: Fn(&Array1<f64>, &[f64]) -> Result<Array1<f64>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: parameter_names
                .iter()
                .map(|name| (name.to_string(), None))
                .collect(),
            kind: ModelKind::Primitive {
                function: Arc::new(function),
                jacobian: None,
                derivative: None,
            },
        }
    }

    /// Attach an analytical parameter Jacobian, shape `(n_params, n_points)`
    ///
    /// Only primitive models take user functions; other variants derive theirs.
    pub fn with_jacobian<F>(mut self, jacobian_fn: F) -> Self
    where
        F: Fn(&Array1<f64>, &[f64]) -> Result<Array2<f64>> + Send + Sync + 'static,
    {
        match &mut self.kind {
            ModelKind::Primitive { jacobian, .. } => *jacobian = Some(Arc::new(jacobian_fn)),
            _ => log::warn!("Ignoring jacobian for derived model {}", self.name),
        }
        self
    }

    /// Attach an analytical derivative with respect to the independent variable
    pub fn with_derivative<F>(mut self, derivative_fn: F) -> Self
    where
        F: Fn(&Array1<f64>, &[f64]) -> Result<Array1<f64>> + Send + Sync + 'static,
    {
        match &mut self.kind {
            ModelKind::Primitive { derivative, .. } => *derivative = Some(Arc::new(derivative_fn)),
            _ => log::warn!("Ignoring derivative for derived model {}", self.name),
        }
        self
    }

    /// Set the default of a local parameter
    ///
    /// # Errors
    ///
    /// [`FitError::UnknownParameter`] if the model has no such parameter.
    pub fn with_default(mut self, name: &str, default: Parameter) -> Result<Self> {
        let slot = self
            .parameters
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| FitError::UnknownParameter(name.to_string()))?;
        slot.1 = Some(default);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local parameter names in slot order
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn n_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Default of a local parameter, if one was given
    pub fn default_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, p)| p.as_ref())
    }

    /// Local parameter names with their defaults, in slot order
    pub fn defaults(&self) -> &[(String, Option<Parameter>)] {
        &self.parameters
    }

    /// Whether [`Model::jacobian`] is available
    pub fn has_jacobian(&self) -> bool {
        match &self.kind {
            ModelKind::Primitive { jacobian, .. } => jacobian.is_some(),
            ModelKind::Composite { lhs, rhs, .. } => lhs.has_jacobian() && rhs.has_jacobian(),
            ModelKind::Inverted { model, .. } | ModelKind::IndependentOffset { model } => {
                model.has_jacobian() && model.has_derivative()
            }
        }
    }

    /// Whether [`Model::derivative`] is available
    pub fn has_derivative(&self) -> bool {
        match &self.kind {
            ModelKind::Primitive { derivative, .. } => derivative.is_some(),
            ModelKind::Composite { lhs, rhs, .. } => lhs.has_derivative() && rhs.has_derivative(),
            ModelKind::Inverted { model, .. } | ModelKind::IndependentOffset { model } => {
                model.has_derivative()
            }
        }
    }

    fn check_parameters(&self, params: &[f64]) -> Result<()> {
        if params.len() != self.parameters.len() {
            return Err(FitError::shape(
                format!("parameters of model {}", self.name),
                self.parameters.len(),
                params.len(),
            ));
        }
        Ok(())
    }

    fn missing(&self, what: &'static str) -> FitError {
        FitError::MissingDerivativeInfo {
            model: self.name.clone(),
            what,
        }
    }

    /// Evaluate the model
    ///
    /// # Errors
    ///
    /// [`FitError::ShapeMismatch`] if `params` does not have one value per
    /// local parameter or the function returns the wrong number of values.
    pub fn evaluate(&self, x: &Array1<f64>, params: &[f64]) -> Result<Array1<f64>> {
        self.check_parameters(params)?;
        let y = match &self.kind {
            ModelKind::Primitive { function, .. } => function(x, params)?,
            ModelKind::Composite {
                lhs,
                rhs,
                lhs_indices,
                rhs_indices,
            } => {
                lhs.evaluate(x, &gather(params, lhs_indices))?
                    + rhs.evaluate(x, &gather(params, rhs_indices))?
            }
            ModelKind::Inverted {
                model,
                lower,
                upper,
                config,
            } => invert_model(model, x, params, *lower, *upper, config)?,
            ModelKind::IndependentOffset { model } => {
                model.evaluate(&(x - params[0]), &params[1..])?
            }
        };
        self.check_points("output", x, y.len())?;
        Ok(y)
    }

    /// Parameter Jacobian, shape `(n_params, n_points)`
    ///
    /// # Errors
    ///
    /// [`FitError::MissingDerivativeInfo`] if [`Model::has_jacobian`] is false.
    pub fn jacobian(&self, x: &Array1<f64>, params: &[f64]) -> Result<Array2<f64>> {
        self.check_parameters(params)?;
        if !self.has_jacobian() {
            return Err(self.missing("jacobian"));
        }

        let jac = match &self.kind {
            ModelKind::Primitive { jacobian, .. } => match jacobian {
                Some(jacobian) => jacobian(x, params)?,
                None => return Err(self.missing("jacobian")),
            },
            ModelKind::Composite {
                lhs,
                rhs,
                lhs_indices,
                rhs_indices,
            } => {
                let mut jac = Array2::zeros((self.parameters.len(), x.len()));
                let parts = [
                    (lhs.jacobian(x, &gather(params, lhs_indices))?, lhs_indices),
                    (rhs.jacobian(x, &gather(params, rhs_indices))?, rhs_indices),
                ];
                for (part, indices) in parts.iter() {
                    for (row, &merged) in indices.iter().enumerate() {
                        let mut target = jac.row_mut(merged);
                        target += &part.row(row);
                    }
                }
                jac
            }
            ModelKind::Inverted {
                model,
                lower,
                upper,
                config,
            } => inversion::invert_jacobian(
                x,
                |d| invert_model(model, d, params, *lower, *upper, config),
                |f| model.jacobian(f, params),
                |f| model.derivative(f, params),
            )?,
            ModelKind::IndependentOffset { model } => {
                let shifted = x - params[0];
                let inner = model.jacobian(&shifted, &params[1..])?;
                let slope = model.derivative(&shifted, &params[1..])?;

                let mut jac = Array2::zeros((self.parameters.len(), x.len()));
                jac.row_mut(0).assign(&(-slope));
                jac.slice_mut(ndarray::s![1.., ..]).assign(&inner);
                jac
            }
        };

        if jac.nrows() != self.parameters.len() {
            return Err(FitError::shape(
                format!("jacobian rows of model {}", self.name),
                self.parameters.len(),
                jac.nrows(),
            ));
        }
        self.check_points("jacobian columns", x, jac.ncols())?;
        Ok(jac)
    }

    /// Derivative with respect to the independent variable
    ///
    /// # Errors
    ///
    /// [`FitError::MissingDerivativeInfo`] if [`Model::has_derivative`] is false.
    pub fn derivative(&self, x: &Array1<f64>, params: &[f64]) -> Result<Array1<f64>> {
        self.check_parameters(params)?;
        if !self.has_derivative() {
            return Err(self.missing("derivative"));
        }

        let d = match &self.kind {
            ModelKind::Primitive { derivative, .. } => match derivative {
                Some(derivative) => derivative(x, params)?,
                None => return Err(self.missing("derivative")),
            },
            ModelKind::Composite {
                lhs,
                rhs,
                lhs_indices,
                rhs_indices,
            } => {
                lhs.derivative(x, &gather(params, lhs_indices))?
                    + rhs.derivative(x, &gather(params, rhs_indices))?
            }
            ModelKind::Inverted {
                model,
                lower,
                upper,
                config,
            } => inversion::invert_derivative(
                x,
                |d| invert_model(model, d, params, *lower, *upper, config),
                |f| model.derivative(f, params),
            )?,
            ModelKind::IndependentOffset { model } => {
                model.derivative(&(x - params[0]), &params[1..])?
            }
        };
        self.check_points("derivative", x, d.len())?;
        Ok(d)
    }

    fn check_points(&self, what: &str, x: &Array1<f64>, actual: usize) -> Result<()> {
        if actual != x.len() {
            return Err(FitError::shape(
                format!("{} of model {}", what, self.name),
                x.len(),
                actual,
            ));
        }
        Ok(())
    }

    /// Evaluate with parameters looked up by local name
    ///
    /// # Errors
    ///
    /// [`FitError::UnknownParameter`] if a local parameter is missing from `params`.
    pub fn evaluate_with(&self, x: &Array1<f64>, params: &Parameters) -> Result<Array1<f64>> {
        let values = self
            .parameters
            .iter()
            .map(|(name, _)| params.value(name))
            .collect::<Result<Vec<f64>>>()?;
        self.evaluate(x, &values)
    }

    /// Central-difference parameter Jacobian, shape `(n_params, n_points)`
    pub fn numerical_jacobian(&self, x: &Array1<f64>, params: &[f64], dx: f64) -> Result<Array2<f64>> {
        self.check_parameters(params)?;
        finite_difference::central_jacobian(|p| self.evaluate(x, p), params, dx)
    }

    /// Central-difference derivative with respect to the independent variable
    pub fn numerical_derivative(&self, x: &Array1<f64>, params: &[f64], dx: f64) -> Result<Array1<f64>> {
        self.check_parameters(params)?;
        finite_difference::central_derivative(|x| self.evaluate(x, params), x, dx)
    }

    /// Compare [`Model::jacobian`] with [`Model::numerical_jacobian`]
    ///
    /// Mismatches are logged per parameter with their maximum deviation.
    pub fn verify_jacobian(
        &self,
        x: &Array1<f64>,
        params: &[f64],
        tolerance: Tolerance,
        dx: Option<f64>,
    ) -> Result<DerivativeCheck> {
        let analytical = self.jacobian(x, params)?;
        let numerical = self.numerical_jacobian(x, params, dx.unwrap_or(DEFAULT_DX))?;

        let mut is_close = true;
        let mut max_deviation = Vec::with_capacity(params.len());
        for (k, (name, _)) in self.parameters.iter().enumerate() {
            let (close, deviation) = compare(
                analytical.row(k).iter().copied(),
                numerical.row(k).iter().copied(),
                tolerance,
            );
            if !close {
                log::warn!(
                    "Jacobian of {} w.r.t. {} deviates from finite differences by up to {:e}",
                    self.name,
                    name,
                    deviation
                );
            }
            is_close &= close;
            max_deviation.push(deviation);
        }

        Ok(DerivativeCheck {
            is_close,
            max_deviation,
        })
    }

    /// Compare [`Model::derivative`] with [`Model::numerical_derivative`]
    pub fn verify_derivative(
        &self,
        x: &Array1<f64>,
        params: &[f64],
        tolerance: Tolerance,
        dx: Option<f64>,
    ) -> Result<DerivativeCheck> {
        let analytical = self.derivative(x, params)?;
        let numerical = self.numerical_derivative(x, params, dx.unwrap_or(DEFAULT_DX))?;

        let (is_close, deviation) = compare(
            analytical.iter().copied(),
            numerical.iter().copied(),
            tolerance,
        );
        if !is_close {
            log::warn!(
                "Derivative of {} deviates from finite differences by up to {:e}",
                self.name,
                deviation
            );
        }

        Ok(DerivativeCheck {
            is_close,
            max_deviation: vec![deviation],
        })
    }

    /// Sum of two shared models
    ///
    /// Parameters are merged lhs first, then rhs; a name present on both
    /// sides is one shared slot at its lhs position. On such a collision the
    /// rhs default replaces the lhs default, also when the rhs has none.
    pub fn composite(lhs: Arc<Model>, rhs: Arc<Model>) -> Model {
        let mut parameters: Vec<(String, Option<Parameter>)> = Vec::new();
        let mut merge = |source: &Model| -> Vec<usize> {
            source
                .parameters
                .iter()
                .map(|(name, default)| {
                    match parameters.iter().position(|(n, _)| n == name) {
                        Some(i) => {
                            parameters[i].1 = default.clone();
                            i
                        }
                        None => {
                            parameters.push((name.clone(), default.clone()));
                            parameters.len() - 1
                        }
                    }
                })
                .collect()
        };
        let lhs_indices = merge(&lhs);
        let rhs_indices = merge(&rhs);

        Model {
            name: format!("{}_with_{}", lhs.name, rhs.name),
            parameters,
            kind: ModelKind::Composite {
                lhs,
                rhs,
                lhs_indices,
                rhs_indices,
            },
        }
    }

    /// Swap dependent and independent variable, solving on `[0, ∞)`
    pub fn invert(self) -> Model {
        self.invert_within(0.0, f64::INFINITY)
    }

    /// Swap dependent and independent variable, solving within `[lower, upper]`
    pub fn invert_within(self, lower: f64, upper: f64) -> Model {
        Self::inverted(Arc::new(self), lower, upper, InversionConfig::default())
    }

    /// Inverted model over a shared inner model with explicit solver settings
    pub fn inverted(model: Arc<Model>, lower: f64, upper: f64, config: InversionConfig) -> Model {
        Model {
            name: format!("inv({})", model.name),
            parameters: model.parameters.clone(),
            kind: ModelKind::Inverted {
                model,
                lower,
                upper,
                config,
            },
        }
    }

    /// Evaluate at `x - offset`, with `offset` a new leading free parameter
    pub fn subtract_offset(self, offset_name: &str) -> Model {
        Self::independent_offset(Arc::new(self), offset_name)
    }

    /// Offset model over a shared inner model
    pub fn independent_offset(model: Arc<Model>, offset_name: &str) -> Model {
        let mut parameters = vec![(offset_name.to_string(), None)];
        parameters.extend(model.parameters.iter().cloned());
        Model {
            name: format!("{}(x-d)", model.name),
            parameters,
            kind: ModelKind::IndependentOffset { model },
        }
    }
}

fn gather(params: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| params[i]).collect()
}

fn invert_model(
    model: &Model,
    target: &Array1<f64>,
    params: &[f64],
    lower: f64,
    upper: f64,
    config: &InversionConfig,
) -> Result<Array1<f64>> {
    let forward = |f: &Array1<f64>| model.evaluate(f, params);
    let slope = |f: &Array1<f64>| model.derivative(f, params);
    let derivative: Option<PointwiseFn<'_>> = if model.has_derivative() {
        Some(&slope)
    } else {
        None
    };
    inversion::invert_function(
        target,
        &Array1::ones(target.len()),
        lower,
        upper,
        &forward,
        derivative,
        config,
    )
}

fn compare(
    analytical: impl Iterator<Item = f64>,
    numerical: impl Iterator<Item = f64>,
    tolerance: Tolerance,
) -> (bool, f64) {
    analytical
        .zip(numerical)
        .fold((true, 0.0), |(close, deviation), (a, n)| {
            (
                close && tolerance.is_close(a, n),
                f64::max(deviation, (a - n).abs()),
            )
        })
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ModelKind::Primitive { .. } => "Primitive",
            ModelKind::Composite { .. } => "Composite",
            ModelKind::Inverted { .. } => "Inverted",
            ModelKind::IndependentOffset { .. } => "IndependentOffset",
        };
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("parameters", &self.parameter_names())
            .field("has_jacobian", &self.has_jacobian())
            .field("has_derivative", &self.has_derivative())
            .finish()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_names().join(", "))
    }
}

impl Add for Model {
    type Output = Model;

    fn add(self, rhs: Model) -> Model {
        Model::composite(Arc::new(self), Arc::new(rhs))
    }
}

impl Add for &Model {
    type Output = Model;

    fn add(self, rhs: &Model) -> Model {
        Model::composite(Arc::new(self.clone()), Arc::new(rhs.clone()))
    }
}
