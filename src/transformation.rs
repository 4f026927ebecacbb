//! Per-data-set parameter substitutions.
//!
//! Loading a data set into a model maps each of the model's base parameter
//! names either onto a (possibly renamed) free parameter of the global fit or
//! onto a fixed constant. [`resolve`] turns a sparse list of substitutions
//! into that full mapping.

use crate::error::{FitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a base model parameter becomes for one data set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transformation {
    /// Read from the global parameter with this name
    Free(String),

    /// Held at this constant
    Fixed(f64),
}

impl Transformation {
    /// Name of the global parameter, if the slot is free
    pub fn free_name(&self) -> Option<&str> {
        match self {
            Transformation::Free(name) => Some(name),
            Transformation::Fixed(_) => None,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Transformation::Free(_))
    }
}

impl From<&str> for Transformation {
    fn from(name: &str) -> Self {
        Transformation::Free(name.to_string())
    }
}

impl From<String> for Transformation {
    fn from(name: String) -> Self {
        Transformation::Free(name)
    }
}

impl From<f64> for Transformation {
    fn from(value: f64) -> Self {
        Transformation::Fixed(value)
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformation::Free(name) => write!(f, "{}", name),
            Transformation::Fixed(value) => write!(f, "{}", value),
        }
    }
}

/// Full mapping from base parameter name to its transformation, in base order
pub type Transformations = Vec<(String, Transformation)>;

/// Resolve substitutions against a model's base parameter names
///
/// Every base name maps onto itself unless a substitution overrides it. The
/// output follows the order of `base_names`. A later substitution for the
/// same name overrides an earlier one.
///
/// # Errors
///
/// [`FitError::UnknownParameter`] when a substitution names a parameter that
/// is not in `base_names`.
///
/// # Examples
///
/// ```
/// use fdfit_rs::transformation::{resolve, Transformation};
///
/// let resolved = resolve(
///     &["Lp", "Lc", "kT"],
///     &[("Lc", Transformation::from("Lc_b")), ("kT", 4.0.into())],
/// )
/// .unwrap();
///
/// assert_eq!(resolved[0], ("Lp".to_string(), Transformation::from("Lp")));
/// assert_eq!(resolved[1].1, Transformation::Free("Lc_b".to_string()));
/// assert_eq!(resolved[2].1, Transformation::Fixed(4.0));
/// assert!(resolve(&["Lp"], &[("Lq", 1.0.into())]).is_err());
/// ```
pub fn resolve<S: AsRef<str>>(
    base_names: &[S],
    substitutions: &[(&str, Transformation)],
) -> Result<Transformations> {
    let mut resolved: Transformations = base_names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            (name.to_string(), Transformation::Free(name.to_string()))
        })
        .collect();

    for (key, value) in substitutions {
        let slot = resolved
            .iter_mut()
            .find(|(name, _)| name == key)
            .ok_or_else(|| FitError::UnknownParameter(key.to_string()))?;
        slot.1 = value.clone();
    }

    Ok(resolved)
}
