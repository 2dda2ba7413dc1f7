//! Container configuration with XDG Base Directory compliance.
//!
//! This module provides the `StoreConfig` used to open a product datastore,
//! including where the container file lives and which key scheme quantity
//! writes use.

use std::{env::var, path::PathBuf};

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::error::StoreError;

/// Default name of the persistent preference container.
pub const DEFAULT_CONTAINER_NAME: &str = "productos_datastore";

/// File extension of the container file.
const CONTAINER_EXTENSION: &str = "json";

/// Key scheme used by quantity increase/decrease operations.
///
/// Reads always address the prefixed `cantidad_<id>` key. Historically,
/// increase and decrease wrote the bare product identifier instead, so the
/// two families never agreed. `Legacy` keeps that layout for files written
/// by older builds; `Prefixed` makes every quantity operation use one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityKeyScheme {
    /// Increase/decrease write the bare product identifier key.
    #[default]
    Legacy,
    /// Increase/decrease write the same `cantidad_<id>` key reads use.
    Prefixed,
}

/// Configuration for opening a product datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the container file.
    pub data_dir: PathBuf,
    /// Name of the preference container (file stem).
    pub container_name: String,
    /// Key scheme for quantity writes.
    pub quantity_keys: QuantityKeyScheme,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            quantity_keys: QuantityKeyScheme::default(),
        }
    }
}

impl StoreConfig {
    /// Sets the directory holding the container file.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory for the container file.
    ///
    /// # Returns
    ///
    /// The updated configuration.
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the container name.
    ///
    /// # Arguments
    ///
    /// * `container_name` - Name of the preference container.
    ///
    /// # Returns
    ///
    /// The updated configuration.
    #[must_use]
    pub fn with_container_name(mut self, container_name: impl Into<String>) -> Self {
        self.container_name = container_name.into();
        self
    }

    /// Sets the quantity key scheme.
    #[must_use]
    pub fn with_quantity_keys(mut self, quantity_keys: QuantityKeyScheme) -> Self {
        self.quantity_keys = quantity_keys;
        self
    }

    /// Full path of the container file.
    ///
    /// # Returns
    ///
    /// `<data_dir>/<container_name>.json`.
    #[must_use]
    pub fn container_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{CONTAINER_EXTENSION}", self.container_name))
    }

    /// Checks that the configuration names a usable container.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidConfig` if the container name is empty or
    /// contains a path separator.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.container_name.trim().is_empty() {
            return Err(StoreError::invalid_config("container name is empty"));
        }

        if self.container_name.contains(['/', '\\']) {
            return Err(StoreError::invalid_config(format!(
                "container name {:?} contains a path separator",
                self.container_name
            )));
        }

        debug!("Validated store config: {:?}", self);
        Ok(())
    }
}

/// Gets the data directory for the product datastore.
///
/// # Returns
///
/// `$XDG_DATA_HOME/product-datastore`, falling back to
/// `$HOME/.local/share/product-datastore`.
#[must_use]
pub fn get_data_dir() -> PathBuf {
    let mut data_dir = get_xdg_data_home();
    data_dir.push("product-datastore");
    data_dir
}

/// Gets the XDG data home directory following XDG Base Directory specification.
///
/// Uses `XDG_DATA_HOME` environment variable if set, otherwise defaults to $HOME/.local/share
fn get_xdg_data_home() -> PathBuf {
    if let Ok(data_home) = var("XDG_DATA_HOME")
        && !data_home.is_empty()
    {
        return PathBuf::from(data_home);
    }

    if let Ok(home) = var("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".local");
        path.push("share");
        return path;
    }

    PathBuf::from(".")
}
