//! Favorites, cart, and quantity persistence for products.
//!
//! `ProductDataStore` is the accessor the app talks to. It keeps two string
//! sets (favorites and cart) and one integer quantity slot per product in a
//! single `DataStore` container.

use std::{collections::BTreeSet, path::Path, sync::Arc};

use {tokio::sync::OnceCell, tracing::debug};

use crate::{
    config::{QuantityKeyScheme, StoreConfig},
    datastore::{
        preferences::{Key, MutablePreferences, Preferences},
        product::ProductRef,
        store::DataStore,
        subscription::Subscription,
    },
    error::StoreError,
};

/// Stored name of the favorites set.
pub const FAVORITES_KEY: &str = "favoritos";

/// Stored name of the cart set.
pub const CART_KEY: &str = "carrito";

/// Prefix of the per-product quantity key read by `read_quantity`.
pub const QUANTITY_KEY_PREFIX: &str = "cantidad_";

/// Quantity reported for a product with no stored value.
pub const DEFAULT_QUANTITY: i32 = 1;

/// Process-wide instance handed out by `ProductDataStore::shared`.
static SHARED: OnceCell<Arc<ProductDataStore>> = OnceCell::const_new();

/// Persistent favorites, cart, and quantity accessor.
#[derive(Debug, Clone)]
pub struct ProductDataStore {
    /// Underlying container.
    store: DataStore,
    /// Configuration the container was opened with.
    config: StoreConfig,
}

impl ProductDataStore {
    /// Opens the container described by `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Container location and quantity key scheme.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `ProductDataStore` or a `StoreError`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the configuration is invalid or the container
    /// cannot be loaded.
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let store = DataStore::open(config.container_path()).await?;
        debug!(
            "ProductDataStore: Opened {:?} with {:?} quantity keys",
            store.path(),
            config.quantity_keys
        );

        Ok(Self { store, config })
    }

    /// Gets the process-wide instance, opening it on first access.
    ///
    /// Concurrent first callers share a single initialization; every caller
    /// receives the same instance. `config` is only used by the call that
    /// performs the initialization. A failed initialization is not cached,
    /// so a later call may retry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the instance has to be opened and opening fails.
    pub async fn shared(config: StoreConfig) -> Result<Arc<Self>, StoreError> {
        SHARED
            .get_or_try_init(|| async move { Self::open(config).await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Gets the process-wide instance if it has been opened.
    #[must_use]
    pub fn get() -> Option<Arc<Self>> {
        SHARED.get().cloned()
    }

    /// Gets the configuration this store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Gets the container file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Subscribes to the cart set.
    ///
    /// # Returns
    ///
    /// A live `Subscription` yielding the current cart first (empty if never
    /// written), then every change.
    pub fn read_cart(&self) -> Subscription<BTreeSet<String>> {
        let key = cart_key();
        self.store
            .watch(move |prefs| prefs.get(&key).unwrap_or_default())
    }

    /// Subscribes to the favorites set.
    ///
    /// # Returns
    ///
    /// A live `Subscription` yielding the current favorites first (empty if
    /// never written), then every change.
    pub fn read_favorites(&self) -> Subscription<BTreeSet<String>> {
        let key = favorites_key();
        self.store
            .watch(move |prefs| prefs.get(&key).unwrap_or_default())
    }

    /// Subscribes to a product's quantity.
    ///
    /// Reads the prefixed `cantidad_<id>` key regardless of the configured
    /// scheme.
    ///
    /// # Arguments
    ///
    /// * `product` - Product whose quantity to watch.
    ///
    /// # Returns
    ///
    /// A live `Subscription` yielding the quantity, 1 when absent.
    pub fn read_quantity(&self, product: &(impl ProductRef + ?Sized)) -> Subscription<i32> {
        let key = quantity_key(product.product_id());
        self.store
            .watch(move |prefs| prefs.get(&key).unwrap_or(DEFAULT_QUANTITY))
    }

    /// Adds a product to or removes it from the favorites.
    ///
    /// # Arguments
    ///
    /// * `product` - Product to update.
    /// * `is_favorite` - Whether the product should be a favorite.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KindMismatch` if the target key holds a value of
    /// another kind (nothing is written), or `StoreError` if the container
    /// cannot be persisted.
    pub async fn set_favorite(
        &self,
        product: &(impl ProductRef + ?Sized),
        is_favorite: bool,
    ) -> Result<(), StoreError> {
        let product_id = product.product_id().to_owned();
        debug!(product = %product_id, is_favorite, "ProductDataStore: Updating favorites");

        self.store
            .edit(move |prefs| set_membership(prefs, &favorites_key(), product_id, is_favorite))
            .await?;
        Ok(())
    }

    /// Adds a product to or removes it from the cart.
    ///
    /// # Arguments
    ///
    /// * `product` - Product to update.
    /// * `in_cart` - Whether the product should be in the cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KindMismatch` if the target key holds a value of
    /// another kind (nothing is written), or `StoreError` if the container
    /// cannot be persisted.
    pub async fn set_in_cart(
        &self,
        product: &(impl ProductRef + ?Sized),
        in_cart: bool,
    ) -> Result<(), StoreError> {
        let product_id = product.product_id().to_owned();
        debug!(product = %product_id, in_cart, "ProductDataStore: Updating cart");

        self.store
            .edit(move |prefs| set_membership(prefs, &cart_key(), product_id, in_cart))
            .await?;
        Ok(())
    }

    /// Increments a product's stored quantity, starting from 1.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KindMismatch` if the target key holds a value of
    /// another kind (nothing is written), or `StoreError` if the container
    /// cannot be persisted.
    pub async fn increase_quantity(
        &self,
        product: &(impl ProductRef + ?Sized),
    ) -> Result<(), StoreError> {
        let key = self.stored_quantity_key(product.product_id());
        debug!("ProductDataStore: Increasing quantity under {:?}", key);

        self.store
            .edit(move |prefs| {
                let current = prefs.get(&key)?.unwrap_or(DEFAULT_QUANTITY);
                prefs.set(&key, current.saturating_add(1))
            })
            .await?;
        Ok(())
    }

    /// Decrements a product's stored quantity, never going below 1.
    ///
    /// A quantity of 1 (or no stored quantity) is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KindMismatch` if the target key holds a value of
    /// another kind (nothing is written), or `StoreError` if the container
    /// cannot be persisted.
    pub async fn decrease_quantity(
        &self,
        product: &(impl ProductRef + ?Sized),
    ) -> Result<(), StoreError> {
        let key = self.stored_quantity_key(product.product_id());
        debug!("ProductDataStore: Decreasing quantity under {:?}", key);

        self.store
            .edit(move |prefs| {
                let current = prefs.get(&key)?.unwrap_or(DEFAULT_QUANTITY);
                if current > DEFAULT_QUANTITY {
                    prefs.set(&key, current - 1)?;
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Gets the raw container contents, including keys this type never reads.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Preferences> {
        self.store.snapshot()
    }

    /// Gets the current favorites set.
    #[must_use]
    pub fn favorites(&self) -> BTreeSet<String> {
        self.store.snapshot().get(&favorites_key()).unwrap_or_default()
    }

    /// Gets the current cart set.
    #[must_use]
    pub fn cart(&self) -> BTreeSet<String> {
        self.store.snapshot().get(&cart_key()).unwrap_or_default()
    }

    /// Gets a product's quantity as `read_quantity` reports it.
    pub fn quantity(&self, product: &(impl ProductRef + ?Sized)) -> i32 {
        self.store
            .snapshot()
            .get(&quantity_key(product.product_id()))
            .unwrap_or(DEFAULT_QUANTITY)
    }

    /// Gets a product's quantity from the slot increase/decrease write.
    ///
    /// Under `QuantityKeyScheme::Legacy` this is the bare identifier key,
    /// which `quantity` and `read_quantity` never see.
    pub fn stored_quantity(&self, product: &(impl ProductRef + ?Sized)) -> i32 {
        self.store
            .snapshot()
            .get(&self.stored_quantity_key(product.product_id()))
            .unwrap_or(DEFAULT_QUANTITY)
    }

    fn stored_quantity_key(&self, product_id: &str) -> Key<i32> {
        match self.config.quantity_keys {
            QuantityKeyScheme::Legacy => Key::int(product_id),
            QuantityKeyScheme::Prefixed => quantity_key(product_id),
        }
    }
}

fn favorites_key() -> Key<BTreeSet<String>> {
    Key::string_set(FAVORITES_KEY)
}

fn cart_key() -> Key<BTreeSet<String>> {
    Key::string_set(CART_KEY)
}

fn quantity_key(product_id: &str) -> Key<i32> {
    Key::int(format!("{QUANTITY_KEY_PREFIX}{product_id}"))
}

/// Inserts or removes `product_id` in the set under `key`.
fn set_membership(
    prefs: &mut MutablePreferences,
    key: &Key<BTreeSet<String>>,
    product_id: String,
    present: bool,
) -> Result<(), StoreError> {
    let mut members = prefs.get(key)?.unwrap_or_default();
    if present {
        members.insert(product_id);
    } else {
        members.remove(&product_id);
    }
    prefs.set(key, members)
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, fs::write, sync::Arc, time::Duration};

    use {
        tempfile::TempDir,
        tokio::{spawn, test as TokioTest, time::timeout},
    };

    use crate::{
        config::{QuantityKeyScheme, StoreConfig},
        datastore::{
            preferences::Key,
            product::Product,
            product_store::{ProductDataStore, quantity_key},
        },
        error::StoreError,
    };

    async fn open_store(temp_dir: &TempDir, scheme: QuantityKeyScheme) -> ProductDataStore {
        let config = StoreConfig::default()
            .with_data_dir(temp_dir.path())
            .with_quantity_keys(scheme);
        ProductDataStore::open(config).await.unwrap()
    }

    fn set_of(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[TokioTest]
    async fn test_favorite_toggle_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
        let product = Product::new("SKU1");

        assert!(!store.favorites().contains("SKU1"));

        store.set_favorite(&product, true).await.unwrap();
        assert!(store.favorites().contains("SKU1"));

        store.set_favorite(&product, false).await.unwrap();
        assert!(!store.favorites().contains("SKU1"));
    }

    #[TokioTest]
    async fn test_set_favorite_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;

        store.set_favorite("SKU1", true).await.unwrap();
        let once = store.favorites();
        store.set_favorite("SKU1", true).await.unwrap();
        assert_eq!(store.favorites(), once);

        store.set_favorite("MISSING", false).await.unwrap();
        assert_eq!(store.favorites(), once);
    }

    #[TokioTest]
    async fn test_cart_round_trip_restores_prior_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;

        store.set_in_cart("A", true).await.unwrap();
        let before = store.cart();

        store.set_in_cart("B", true).await.unwrap();
        assert_eq!(store.cart(), set_of(&["A", "B"]));
        store.set_in_cart("B", false).await.unwrap();
        assert_eq!(store.cart(), before);
    }

    #[TokioTest]
    async fn test_favorites_and_cart_are_independent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;

        store.set_in_cart("SKU1", true).await.unwrap();
        assert!(store.favorites().is_empty());

        store.set_favorite("SKU2", true).await.unwrap();
        assert_eq!(store.cart(), set_of(&["SKU1"]));
        assert_eq!(store.favorites(), set_of(&["SKU2"]));
    }

    #[TokioTest]
    async fn test_read_quantity_defaults_to_one() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;

        let mut quantity = store.read_quantity("never-written");
        assert_eq!(quantity.next().await, Some(1));
        assert_eq!(store.quantity("never-written"), 1);
    }

    #[TokioTest]
    async fn test_decrease_never_goes_below_one() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
        let product = Product::new("SKU1");

        // Absent slot stays absent.
        store.decrease_quantity(&product).await.unwrap();
        assert!(store.store.snapshot().is_empty());

        store.increase_quantity(&product).await.unwrap();
        assert_eq!(store.stored_quantity(&product), 2);

        for _ in 0..5 {
            store.decrease_quantity(&product).await.unwrap();
            assert!(store.stored_quantity(&product) >= 1);
        }
        assert_eq!(store.stored_quantity(&product), 1);
        assert_eq!(store.store.snapshot().get(&Key::int("SKU1")), Some(1));
    }

    #[TokioTest]
    async fn test_increase_saturates() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Prefixed).await;

        store
            .store
            .edit(|prefs| prefs.set(&quantity_key("SKU1"), i32::MAX))
            .await
            .unwrap();
        store.increase_quantity("SKU1").await.unwrap();
        assert_eq!(store.quantity("SKU1"), i32::MAX);
    }

    #[TokioTest]
    async fn test_legacy_scheme_key_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
        let product = Product::new("SKU1");

        store.set_favorite(&product, true).await.unwrap();
        store.set_in_cart(&product, true).await.unwrap();
        store.increase_quantity(&product).await.unwrap();
        store.increase_quantity(&product).await.unwrap();

        assert_eq!(store.favorites(), set_of(&["SKU1"]));
        assert_eq!(store.cart(), set_of(&["SKU1"]));
        assert_eq!(store.store.snapshot().get(&Key::int("SKU1")), Some(3));
        assert_eq!(store.stored_quantity(&product), 3);

        let mut quantity = store.read_quantity(&product);
        assert_eq!(quantity.next().await, Some(1));
        assert_eq!(store.quantity(&product), 1);
    }

    #[TokioTest]
    async fn test_legacy_quantity_cannot_clobber_reserved_sets() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;

        store.set_favorite("SKU1", true).await.unwrap();
        let result = store.increase_quantity("favoritos").await;
        assert!(matches!(
            result,
            Err(StoreError::KindMismatch { ref key }) if key == "favoritos"
        ));
        assert!(store.decrease_quantity("favoritos").await.is_err());
        assert_eq!(store.favorites(), set_of(&["SKU1"]));

        // A bare quantity written first keeps its slot; the set write fails.
        store.increase_quantity("carrito").await.unwrap();
        assert!(matches!(
            store.set_in_cart("SKU1", true).await,
            Err(StoreError::KindMismatch { .. })
        ));
        assert_eq!(store.stored_quantity("carrito"), 2);
        assert!(store.cart().is_empty());

        let reopened = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
        assert_eq!(reopened.favorites(), set_of(&["SKU1"]));
        assert_eq!(reopened.stored_quantity("carrito"), 2);
    }

    #[TokioTest]
    async fn test_dropped_write_still_completes() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
        let mut favorites = store.read_favorites();
        assert_eq!(favorites.next().await, Some(BTreeSet::new()));

        // The first poll spawns the write; the caller then gives up on it.
        let _ = timeout(Duration::from_nanos(1), store.set_favorite("SKU1", true)).await;

        let observed = timeout(Duration::from_secs(5), async {
            loop {
                match favorites.next().await {
                    Some(set) if set.contains("SKU1") => return set,
                    Some(_) => {}
                    None => panic!("favorites stream ended"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(observed, set_of(&["SKU1"]));

        let reopened = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
        assert_eq!(reopened.favorites(), set_of(&["SKU1"]));
    }

    #[TokioTest]
    async fn test_prefixed_scheme_unifies_quantity() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Prefixed).await;
        let product = Product::new("SKU1");

        let mut quantity = store.read_quantity(&product);
        assert_eq!(quantity.next().await, Some(1));

        store.increase_quantity(&product).await.unwrap();
        assert_eq!(quantity.next().await, Some(2));
        store.increase_quantity(&product).await.unwrap();
        assert_eq!(quantity.next().await, Some(3));
        store.decrease_quantity(&product).await.unwrap();
        assert_eq!(quantity.next().await, Some(2));

        assert_eq!(store.quantity(&product), store.stored_quantity(&product));
        assert_eq!(store.store.snapshot().get(&Key::int("SKU1")), None);
    }

    #[TokioTest]
    async fn test_live_readers_observe_writes() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;

        let mut favorites = store.read_favorites();
        let mut other_favorites = store.read_favorites();
        let mut cart = store.read_cart();

        assert_eq!(favorites.next().await, Some(BTreeSet::new()));
        assert_eq!(cart.next().await, Some(BTreeSet::new()));

        store.set_favorite("SKU1", true).await.unwrap();
        assert_eq!(favorites.next().await, Some(set_of(&["SKU1"])));

        // First poll yields the state at that moment, not at subscription time.
        assert_eq!(other_favorites.next().await, Some(set_of(&["SKU1"])));
        drop(other_favorites);

        store.set_in_cart("SKU7", true).await.unwrap();
        assert_eq!(cart.next().await, Some(set_of(&["SKU7"])));
        assert_eq!(cart.current(), store.cart());

        store.set_favorite("SKU1", false).await.unwrap();
        assert_eq!(favorites.next().await, Some(BTreeSet::new()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_do_not_lose_updates() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&temp_dir, QuantityKeyScheme::Legacy).await);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                spawn(async move { store.set_favorite(&format!("SKU{i}"), true).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let favorites = store.favorites();
        assert_eq!(favorites.len(), 16);
        assert!((0..16).all(|i| favorites.contains(&format!("SKU{i}"))));
    }

    #[TokioTest]
    async fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
            store.set_favorite("SKU1", true).await.unwrap();
            store.set_in_cart("SKU2", true).await.unwrap();
            store.increase_quantity("SKU2").await.unwrap();
        }

        let reopened = open_store(&temp_dir, QuantityKeyScheme::Legacy).await;
        assert_eq!(reopened.favorites(), set_of(&["SKU1"]));
        assert_eq!(reopened.cart(), set_of(&["SKU2"]));
        assert_eq!(reopened.stored_quantity("SKU2"), 2);
    }

    #[TokioTest]
    async fn test_open_rejects_corrupted_container() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::default().with_data_dir(temp_dir.path());
        write(config.container_path(), r#"{"favoritos": 12.5}"#).unwrap();

        let result = ProductDataStore::open(config).await;
        assert!(matches!(result, Err(StoreError::Corruption { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_instance_is_created_once() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::default().with_data_dir(temp_dir.path());

        let handles: Vec<_> = (0..8)
            .map(|_| spawn(ProductDataStore::shared(config.clone())))
            .collect();
        let mut instances = Vec::new();
        for handle in handles {
            instances.push(handle.await.unwrap().unwrap());
        }

        let first = &instances[0];
        assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, first)));
        assert!(Arc::ptr_eq(&ProductDataStore::get().unwrap(), first));
    }
}
