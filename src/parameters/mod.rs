//! # Parameter System
//!
//! Named, bounded scalars and the ordered registry that defines the global
//! parameter vector of a fit.
//!
//! - [`Parameter`]: a value with bounds, a free flag, an optional unit and,
//!   after fitting, a standard error
//! - [`Parameters`]: an insertion-ordered registry; its order is the index
//!   convention of every global parameter vector
//! - [`Bounds`]: box constraints, serialized with `null` for infinite limits
//!
//! ```rust
//! use fdfit_rs::parameters::{Parameter, Parameters};
//!
//! let mut params = Parameters::new();
//! params.insert("DNA_Lc", Parameter::new(16.0).with_bounds(0.0, f64::INFINITY).unwrap());
//! params.insert("kT", Parameter::new(4.11).fixed());
//!
//! params.set_value("DNA_Lc", 15.0).unwrap();
//! assert_eq!(params.values().to_vec(), vec![15.0, 4.11]);
//! assert!(params.set_value("Lc", 1.0).is_err());
//! ```

pub mod bounds;
pub mod parameter;
pub mod parameters;

pub use bounds::{Bounds, BoundsError};
pub use parameter::Parameter;
pub use parameters::Parameters;
