//! Global fit tests

mod global_fit;
mod statistics;
