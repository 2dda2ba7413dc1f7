//! Domain-specific error types using `thiserror`.
//!
//! This module defines the error enum returned by every fallible datastore
//! operation. Absent keys are never errors; they resolve to defaults.

use std::{io::Error as IoError, path::PathBuf, result::Result as StdResult};

use {
    anyhow::Error, serde_json::Error as SerdeJsonError, thiserror::Error,
    tokio::task::JoinError,
};

/// Datastore errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read, write, or replace the container file.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
    /// Failed to encode a snapshot for persistence.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    /// The container file exists but does not hold a valid preference map.
    #[error("Corrupted container {path:?}: {source}")]
    Corruption {
        path: PathBuf,
        #[source]
        source: SerdeJsonError,
    },
    /// A key holds a value of another kind than the one being read or written.
    #[error("Key {key:?} holds a value of another kind")]
    KindMismatch { key: String },
    /// The store configuration cannot be used.
    #[error("Invalid store config: {reason}")]
    InvalidConfig { reason: String },
    /// The edit task panicked or was cancelled before it completed.
    #[error("Write aborted: {0}")]
    WriteAborted(#[from] JoinError),
}

impl StoreError {
    /// Creates a new `InvalidConfig` error.
    ///
    /// # Arguments
    ///
    /// * `reason` - Why the configuration was rejected.
    ///
    /// # Returns
    ///
    /// A new `StoreError::InvalidConfig`.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a new `KindMismatch` error.
    pub fn kind_mismatch(key: impl Into<String>) -> Self {
        Self::KindMismatch { key: key.into() }
    }
}

/// Operational error context propagation with `anyhow`.
///
/// This type is used for operational errors that need rich context
/// but don't require specific handling logic.
pub type Result<T> = StdResult<T, Error>;
