//! Operational error context propagation with `anyhow`.
//!
//! This module provides extension traits and utilities for attaching
//! context to datastore failures and reporting them through `tracing`.

use std::{error::Error as StdError, fmt::Display};

use {
    anyhow::{Context, Error, Result as AnyhowResult},
    tracing::error,
};

/// Extension trait for enhanced error context.
///
/// This trait provides methods to add contextual information to errors,
/// making failures surfaced by the datastore easier to trace back.
pub trait ResultExt<T, E> {
    /// Adds context to an error with a formatted string.
    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(format.to_string())
    }
}

/// Centralized error reporting and logging.
///
/// Presentation of failures belongs to the caller; `ErrorReporter` gives
/// callers one place to log them with the full context chain.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Reports an error-level error (non-recoverable issues).
    pub fn error(error: &Error, context: &str) {
        error!(context = context, error = %format!("{error:#}"), "Datastore error");
    }
}
