//! Product references consumed by the datastore.
//!
//! Products are owned by the catalog; the datastore only ever reads their
//! unique identifier.

use serde::{Deserialize, Serialize};

/// Anything that identifies a product.
pub trait ProductRef {
    /// Gets the product's unique identifier.
    fn product_id(&self) -> &str;
}

/// Catalog product as delivered to the app.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (SKU).
    pub product: String,
}

impl Product {
    /// Creates a product reference from its identifier.
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
        }
    }
}

impl ProductRef for Product {
    fn product_id(&self) -> &str {
        &self.product
    }
}

impl ProductRef for str {
    fn product_id(&self) -> &str {
        self
    }
}

impl ProductRef for String {
    fn product_id(&self) -> &str {
        self
    }
}
