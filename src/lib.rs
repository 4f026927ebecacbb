//! # fdfit-rs
//!
//! `fdfit-rs` fits force-extension models of single molecules (DNA, proteins)
//! to optical-tweezers data. Many curves can be fitted globally at once: each
//! data set maps the parameters of its model onto shared, renamed or fixed
//! global parameters, and a bounded Levenberg-Marquardt solver fits all free
//! parameters against the stacked residuals.
//!
//! The library provides:
//! - Models built from plain functions, composed with `+`, inverted
//!   numerically or shifted by an offset on the independent variable
//! - The standard polymer models (WLC, tWLC, FJC, Marko-Siggia) and their
//!   inverses, with analytical Jacobians
//! - Per-data-set parameter substitutions and global fits over several models
//! - Post-fit statistics: covariance, standard errors, AIC, AICc and BIC
//!
//! ## Basic Usage
//!
//! ```
//! use fdfit_rs::{force_model, FitObject, ForceModelKind, LmConfig};
//! use ndarray::Array1;
//!
//! let model = force_model("DNA", ForceModelKind::Wlc).unwrap();
//!
//! let force = Array1::linspace(0.5, 18.0, 30);
//! let distance = model.evaluate(&force, &[40.0, 16.0, 1500.0, 4.11]).unwrap();
//!
//! let mut fit = FitObject::new(model);
//! fit.load_data(force, distance, "reference", &[]).unwrap();
//! fit.parameters_mut().unwrap().set_value("DNA_Lc", 15.0).unwrap();
//!
//! let report = fit.fit(&LmConfig::default()).unwrap();
//! assert!(report.success);
//!
//! let lc = fit.parameters().unwrap().value("DNA_Lc").unwrap();
//! assert!((lc - 16.0).abs() < 1e-3);
//! ```

pub mod error;

// Parameter system
pub mod parameters;

// Data sets and their parameter mapping
pub mod condition;
pub mod data;
pub mod transformation;

// Models
pub mod inversion;
pub mod model;
pub mod models;

// Solvers
pub mod lm;
pub mod problem;

pub mod fit;
pub mod statistics;
pub mod utils;

// Re-exports for convenience
pub use data::{DataHandle, FitData};
pub use error::{FitError, Result};
pub use fit::{FitObject, FitReport};
pub use lm::{InversionConfig, LevenbergMarquardt, LmConfig, Tolerance};
pub use model::Model;
pub use models::{force_model, ForceModelKind};
pub use parameters::{Parameter, Parameters};
pub use problem::Problem;
pub use transformation::Transformation;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
