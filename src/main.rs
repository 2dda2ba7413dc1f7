//! Product Datastore inspector
//!
//! Opens the default product container and logs its favorites, cart, and
//! stored quantities. Set `RUST_LOG` to control verbosity.

use {
    product_datastore::{
        ProductDataStore, StoreConfig,
        error::{ErrorReporter, Result, ResultExt},
    },
    tracing::{debug, info},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = StoreConfig::default();
    let store = match ProductDataStore::shared(config.clone())
        .await
        .add_contextf(format!("Failed to open {:?}", config.container_path()))
    {
        Ok(store) => store,
        Err(error) => {
            ErrorReporter::error(&error, "startup");
            return Err(error);
        }
    };

    let snapshot = store.snapshot();
    for (key, value) in snapshot.iter() {
        debug!(key = key, value = ?value, "Stored entry");
    }

    let favorites = store.favorites();
    let cart = store.cart();
    info!(
        path = ?store.path(),
        entries = snapshot.len(),
        favorites = ?favorites,
        cart = ?cart,
        "Loaded product datastore"
    );

    for product in &cart {
        info!(
            product = %product,
            quantity = store.quantity(product),
            stored_quantity = store.stored_quantity(product),
            "Cart item"
        );
    }

    Ok(())
}
