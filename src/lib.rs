//! Product Datastore - Favorites, Cart, and Quantity Persistence
//!
//! A small persistence layer for a shopping app. It keeps the user's
//! favorite products, the products in their cart, and per-product
//! quantities in one named preference container on disk, with atomic
//! read-modify-write updates and live subscriptions for readers.

pub mod config;
pub mod datastore;
pub mod error;

// Re-export key types for convenience
pub use {
    config::{QuantityKeyScheme, StoreConfig},
    datastore::{DataStore, Product, ProductDataStore, ProductRef, Subscription},
    error::StoreError,
};
