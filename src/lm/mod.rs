//! Least-squares solvers.
//!
//! [`LevenbergMarquardt`] is the bounded solver used for global fits;
//! [`minimize_diagonal`] is the batched solver used to invert models point by
//! point.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod diagonal;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::{DiffMethod, InversionConfig, LmConfig, Tolerance};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use diagonal::{minimize_diagonal, DiagonalResult};
