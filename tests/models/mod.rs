//! Model tests

mod composition;
mod force_models;
