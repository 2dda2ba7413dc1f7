//! Persistent product preferences with live, reactive reads.
//!
//! This module provides the generic file-backed `DataStore` and the
//! `ProductDataStore` accessor for favorites, cart, and quantities built
//! on top of it.

pub mod preferences;
pub mod product;
pub mod product_store;
pub mod store;
pub mod subscription;

pub use {
    preferences::{Key, MutablePreferences, PreferenceType, PreferenceValue, Preferences},
    product::{Product, ProductRef},
    product_store::ProductDataStore,
    store::DataStore,
    subscription::Subscription,
};
