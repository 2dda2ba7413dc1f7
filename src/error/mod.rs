//! Error handling built on `thiserror` and `anyhow`.
//!
//! This module provides the domain error type for datastore operations and
//! operational error context propagation for callers that only need to
//! report failures.

pub mod domain;
pub mod operational;

pub use {
    domain::{Result, StoreError},
    operational::{ErrorReporter, ResultExt},
};
