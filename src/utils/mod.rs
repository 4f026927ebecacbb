//! Numerical helpers shared by the models and the solvers.

pub mod finite_difference;
pub mod linalg;
