//! Experimental curves attached to a fit.

use crate::error::{FitError, Result};
use crate::transformation::{Transformation, Transformations};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// One experimental curve and the parameter transformations it is fitted with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitData {
    pub name: String,
    x: Array1<f64>,
    y: Array1<f64>,
    transformations: Transformations,
}

impl FitData {
    /// Create a data set
    ///
    /// # Errors
    ///
    /// [`FitError::ShapeMismatch`] when `x` and `y` differ in length.
    pub fn new(
        name: impl Into<String>,
        x: Array1<f64>,
        y: Array1<f64>,
        transformations: Transformations,
    ) -> Result<Self> {
        let name = name.into();
        if x.len() != y.len() {
            return Err(FitError::shape(
                format!("dependent values of data set '{}'", name),
                x.len(),
                y.len(),
            ));
        }

        Ok(Self {
            name,
            x,
            y,
            transformations,
        })
    }

    /// Independent variable
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    /// Dependent variable
    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn transformations(&self) -> &Transformations {
        &self.transformations
    }

    /// Transformation applied to a base model parameter
    pub fn transformation(&self, base_name: &str) -> Option<&Transformation> {
        self.transformations
            .iter()
            .find(|(name, _)| name == base_name)
            .map(|(_, t)| t)
    }

    /// Names of the global parameters this data set reads, in base order
    pub fn free_parameter_names(&self) -> impl Iterator<Item = &str> {
        self.transformations.iter().filter_map(|(_, t)| t.free_name())
    }
}

/// Reference to a data set loaded into a [`FitObject`](crate::fit::FitObject)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataHandle {
    pub(crate) model: usize,
    pub(crate) index: usize,
}

impl DataHandle {
    /// Index of the model the data set was loaded into
    pub fn model(&self) -> usize {
        self.model
    }

    /// Position of the data set among that model's data
    pub fn index(&self) -> usize {
        self.index
    }
}
