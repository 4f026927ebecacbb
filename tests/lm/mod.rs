//! Solver tests

mod solver;
