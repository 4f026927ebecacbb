//! Parameter definition and implementation
//!
//! A [`Parameter`] is a bounded scalar with a fit toggle. It carries no name:
//! names are the keys of the [`Parameters`](crate::parameters::Parameters)
//! registry that owns it, so the same default can be reused under the
//! different global names a data transformation introduces.

use crate::parameters::bounds::{Bounds, BoundsError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parameter for a global fit
///
/// The value is not clamped into the bounds at construction. Staying inside
/// the box is the optimizer's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Current value of the parameter
    value: f64,

    /// Initial value when created (for reset operations)
    init_value: f64,

    /// Minimum and maximum bounds for the parameter value
    bounds: Bounds,

    /// Whether this parameter is free during optimization
    pub vary: bool,

    /// Shared parameters keep their bare name when prefixed by a model factory
    #[serde(default)]
    pub shared: bool,

    /// Physical unit, for display only
    #[serde(default)]
    pub unit: Option<String>,

    /// Standard error of the parameter (set after fitting)
    #[serde(default)]
    pub stderr: Option<f64>,
}

impl Default for Parameter {
    /// Value 0, unbounded, free.
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Parameter {
    /// Create a new free, unbounded parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use fdfit_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new(16.0);
    /// assert_eq!(param.value(), 16.0);
    /// assert_eq!(param.init_value(), 16.0);
    /// assert!(param.vary());
    /// assert_eq!(param.lower_bound(), f64::NEG_INFINITY);
    /// ```
    pub fn new(value: f64) -> Self {
        Self {
            value,
            init_value: value,
            bounds: Bounds::default(),
            vary: true,
            shared: false,
            unit: None,
            stderr: None,
        }
    }

    /// Set the bounds of the parameter
    ///
    /// # Examples
    ///
    /// ```
    /// use fdfit_rs::parameters::Parameter;
    ///
    /// let kt = Parameter::new(4.11).with_bounds(0.0, 8.0).unwrap().fixed();
    /// assert_eq!(kt.upper_bound(), 8.0);
    /// assert!(!kt.vary());
    /// assert!(Parameter::new(1.0).with_bounds(2.0, 1.0).is_err());
    /// ```
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Result<Self, BoundsError> {
        self.bounds = Bounds::new(lower, upper)?;
        Ok(self)
    }

    /// Set whether the parameter is free during optimization
    pub fn with_vary(mut self, vary: bool) -> Self {
        self.vary = vary;
        self
    }

    /// Hold the parameter at its value during optimization
    pub fn fixed(self) -> Self {
        self.with_vary(false)
    }

    /// Mark the parameter as shared between models
    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    /// Attach a unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Get the current value of the parameter
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value of the parameter. Bounds and the free flag are left alone.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Get the value the parameter was created with
    pub fn init_value(&self) -> f64 {
        self.init_value
    }

    /// Restore the value the parameter was created with
    pub fn reset(&mut self) {
        self.value = self.init_value;
        self.stderr = None;
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn lower_bound(&self) -> f64 {
        self.bounds.min
    }

    pub fn upper_bound(&self) -> f64 {
        self.bounds.max
    }

    /// Whether the parameter is free (`is_free`) during optimization
    pub fn vary(&self) -> bool {
        self.vary
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn stderr(&self) -> Option<f64> {
        self.stderr
    }

    /// Whether the current value lies inside the bounds
    pub fn is_within_bounds(&self) -> bool {
        self.bounds.is_within_bounds(self.value)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6e}", self.value)?;
        if let Some(unit) = &self.unit {
            write!(f, " [{}]", unit)?;
        }
        if let Some(stderr) = self.stderr {
            write!(f, " +/- {:.3e}", stderr)?;
        }
        write!(
            f,
            " (bounds: {}, {}; {})",
            self.bounds.min,
            self.bounds.max,
            if self.vary { "free" } else { "fixed" }
        )
    }
}
