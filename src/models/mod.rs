//! Built-in force-extension models.
//!
//! [`force_model`] builds the standard single-molecule models with analytical
//! Jacobians, derivatives and sensible parameter defaults. Parameter names
//! are prefixed with the model name (`DNA_Lc`), except for shared parameters
//! such as `kT`, which keep their bare name so that several models in one fit
//! refer to the same value.
//!
//! ```
//! use fdfit_rs::models::{force_model, ForceModelKind};
//!
//! let dna = force_model("DNA", ForceModelKind::Wlc).unwrap();
//! assert_eq!(dna.parameter_names(), vec!["DNA_Lp", "DNA_Lc", "DNA_St", "kT"]);
//!
//! let kind: ForceModelKind = "invWLC".parse().unwrap();
//! assert_eq!(kind, ForceModelKind::InvertedWlc);
//! ```

use crate::error::{FitError, Result};
use crate::lm::config::InversionConfig;
use crate::model::Model;
use crate::parameters::Parameter;
use ndarray::{Array1, Array2, Axis};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod fjc;
mod inverted_wlc;
mod twlc;
mod wlc;

pub use fjc::coth;

type ForceFn = fn(&Array1<f64>, &[f64]) -> Result<Array1<f64>>;
type ForceJacobianFn = fn(&Array1<f64>, &[f64]) -> Result<Array2<f64>>;

/// The available force-extension models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForceModelKind {
    /// Constant offset on the model output
    Offset,
    /// Marko-Siggia entropic worm-like chain, distance to force (F < 10 pN)
    MarkoSiggia,
    /// Odijk's extensible worm-like chain, force to distance
    Wlc,
    /// Twistable worm-like chain, force to distance
    Twlc,
    /// Extensible freely-jointed chain, force to distance
    Fjc,
    /// Closed-form inverse of the Odijk model, distance to force
    InvertedWlc,
    /// Numerically inverted twistable worm-like chain, distance to force
    InvertedTwlc,
    /// Numerically inverted freely-jointed chain, distance to force
    InvertedFjc,
}

impl ForceModelKind {
    /// Every kind, in declaration order
    pub const ALL: [ForceModelKind; 8] = [
        ForceModelKind::Offset,
        ForceModelKind::MarkoSiggia,
        ForceModelKind::Wlc,
        ForceModelKind::Twlc,
        ForceModelKind::Fjc,
        ForceModelKind::InvertedWlc,
        ForceModelKind::InvertedTwlc,
        ForceModelKind::InvertedFjc,
    ];

    /// Unprefixed parameter names in slot order
    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            ForceModelKind::Offset => &["offset"],
            ForceModelKind::MarkoSiggia => &["Lp", "Lc", "kT"],
            ForceModelKind::Wlc
            | ForceModelKind::Fjc
            | ForceModelKind::InvertedWlc
            | ForceModelKind::InvertedFjc => &["Lp", "Lc", "St", "kT"],
            ForceModelKind::Twlc | ForceModelKind::InvertedTwlc => {
                &["Lp", "Lc", "St", "C", "g0", "g1", "Fc", "kT"]
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForceModelKind::Offset => "offset",
            ForceModelKind::MarkoSiggia => "Marko_Siggia",
            ForceModelKind::Wlc => "WLC",
            ForceModelKind::Twlc => "tWLC",
            ForceModelKind::Fjc => "FJC",
            ForceModelKind::InvertedWlc => "invWLC",
            ForceModelKind::InvertedTwlc => "invtWLC",
            ForceModelKind::InvertedFjc => "invFJC",
        }
    }
}

impl fmt::Display for ForceModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForceModelKind {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self> {
        ForceModelKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = ForceModelKind::ALL.iter().map(|k| k.as_str()).collect();
                FitError::InvalidInput(format!(
                    "Invalid model {} selected. Valid options are {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Build a force model named `name`
///
/// # Arguments
///
/// * `name` - Model name, also the prefix of the non-shared parameter names
/// * `kind` - Which model to build
///
/// # Returns
///
/// * A model with analytical Jacobian and derivative (the inverted
///   freely-jointed chain derives both through the inversion)
pub fn force_model(name: &str, kind: ForceModelKind) -> Result<Model> {
    match kind {
        ForceModelKind::Offset => primitive(
            name,
            kind,
            offset,
            offset_jacobian,
            Some(offset_derivative),
        ),
        ForceModelKind::MarkoSiggia => primitive(
            name,
            kind,
            wlc::marko_siggia,
            wlc::marko_siggia_jacobian,
            Some(wlc::marko_siggia_derivative),
        ),
        ForceModelKind::Wlc => primitive(
            name,
            kind,
            wlc::wlc,
            wlc::wlc_jacobian,
            Some(wlc::wlc_derivative),
        ),
        ForceModelKind::Twlc => primitive(
            name,
            kind,
            twlc::twlc,
            twlc::twlc_jacobian,
            Some(twlc::twlc_derivative),
        ),
        ForceModelKind::Fjc => primitive(
            name,
            kind,
            fjc::fjc,
            fjc::fjc_jacobian,
            Some(fjc::fjc_derivative),
        ),
        ForceModelKind::InvertedWlc => primitive(
            name,
            kind,
            inverted_wlc::inverted_wlc,
            inverted_wlc::inverted_wlc_jacobian,
            Some(inverted_wlc::inverted_wlc_derivative),
        ),
        ForceModelKind::InvertedTwlc => primitive(
            name,
            kind,
            twlc::inverted_twlc,
            twlc::inverted_twlc_jacobian,
            Some(twlc::inverted_twlc_derivative),
        ),
        ForceModelKind::InvertedFjc => {
            let forward = force_model(name, ForceModelKind::Fjc)?;
            Ok(Model::inverted(
                Arc::new(forward),
                0.0,
                f64::INFINITY,
                InversionConfig::default(),
            ))
        }
    }
}

/// Default for an unprefixed parameter of `kind`
///
/// Returns `None` for names without a default.
pub fn default_parameter(kind: ForceModelKind, base: &str) -> Result<Option<Parameter>> {
    let parameter = match base {
        "kT" => Parameter::new(4.11)
            .with_bounds(0.0, 8.0)?
            .fixed()
            .shared()
            .with_unit("pN*nm"),
        "Lp" => Parameter::new(40.0)
            .with_bounds(0.0, f64::INFINITY)?
            .with_unit("nm"),
        "Lc" => Parameter::new(16.0)
            .with_bounds(0.0, f64::INFINITY)?
            .with_unit("micron"),
        "St" => Parameter::new(1500.0)
            .with_bounds(0.0, f64::INFINITY)?
            .with_unit("pN"),
        "Fc" => {
            let upper = if kind == ForceModelKind::InvertedTwlc {
                100.0
            } else {
                50000.0
            };
            Parameter::new(30.6).with_bounds(0.0, upper)?.with_unit("pN")
        }
        "C" => Parameter::new(440.0)
            .with_bounds(0.0, 50000.0)?
            .with_unit("pN*nm**2"),
        "g0" => Parameter::new(-637.0)
            .with_bounds(-50000.0, 50000.0)?
            .with_unit("pN*nm"),
        "g1" => Parameter::new(17.0)
            .with_bounds(-50000.0, 50000.0)?
            .with_unit("nm"),
        "offset" => Parameter::new(0.01).with_bounds(0.0, f64::INFINITY)?,
        _ => return Ok(None),
    };
    Ok(Some(parameter))
}

fn primitive(
    name: &str,
    kind: ForceModelKind,
    function: ForceFn,
    jacobian: ForceJacobianFn,
    derivative: Option<ForceFn>,
) -> Result<Model> {
    let mut names = Vec::new();
    let mut defaults = Vec::new();
    for &base in kind.parameter_names() {
        let default = default_parameter(kind, base)?;
        let shared = default.as_ref().map_or(false, Parameter::is_shared);
        names.push(if shared {
            base.to_string()
        } else {
            format!("{}_{}", name, base)
        });
        defaults.push(default);
    }

    let slots: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut model = Model::new(name, &slots, function).with_jacobian(jacobian);
    if let Some(derivative) = derivative {
        model = model.with_derivative(derivative);
    }
    for (slot, default) in names.iter().zip(defaults) {
        if let Some(default) = default {
            model = model.with_default(slot, default)?;
        }
    }

    log::debug!("Created {} model {}", kind, model);
    Ok(model)
}

/// Fill a `(N, n_points)` Jacobian one column per point
pub(crate) fn jacobian_columns<const N: usize>(
    x: &Array1<f64>,
    column: impl Fn(f64) -> [f64; N],
) -> Array2<f64> {
    let mut jac = Array2::zeros((N, x.len()));
    for (mut col, &xi) in jac.axis_iter_mut(Axis(1)).zip(x.iter()) {
        for (entry, value) in col.iter_mut().zip(column(xi)) {
            *entry = value;
        }
    }
    jac
}

fn offset(x: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    Ok(Array1::from_elem(x.len(), p[0]))
}

fn offset_jacobian(x: &Array1<f64>, _p: &[f64]) -> Result<Array2<f64>> {
    Ok(Array2::ones((1, x.len())))
}

fn offset_derivative(x: &Array1<f64>, _p: &[f64]) -> Result<Array1<f64>> {
    Ok(Array1::zeros(x.len()))
}
