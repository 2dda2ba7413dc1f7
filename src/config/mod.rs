//! Store configuration and on-disk location management.
//!
//! This module provides the container configuration with XDG Base Directory
//! compliance for the data file location.

pub mod settings;

pub use settings::{QuantityKeyScheme, StoreConfig, get_data_dir};
