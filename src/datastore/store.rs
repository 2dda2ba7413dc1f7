//! File-backed preference container with atomic edits and live reads.
//!
//! A `DataStore` owns one container file. Every edit runs as a
//! read-modify-write transform serialized by an async mutex; the result is
//! persisted by writing and syncing a scratch file, renaming it over the
//! container and syncing the directory, and only then published to
//! subscribers.

use std::{
    ffi::OsString,
    io::{ErrorKind::NotFound, Result as IoResult},
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    serde_json::{from_slice, to_vec_pretty},
    tokio::{
        fs::{File, create_dir_all, read, remove_file, rename},
        io::AsyncWriteExt,
        spawn,
        sync::{
            Mutex,
            watch::{Sender, channel},
        },
    },
    tracing::{debug, warn},
};

use crate::{
    datastore::{
        preferences::{MutablePreferences, Preferences},
        subscription::Subscription,
    },
    error::StoreError,
};

/// Suffix appended to the container path for the scratch file.
const SCRATCH_SUFFIX: &str = ".tmp";

/// Persistent key-value container.
///
/// Cloning is cheap; clones share the same container, write lock, and
/// subscribers.
#[derive(Debug, Clone)]
pub struct DataStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Container file on disk.
    path: PathBuf,
    /// Serializes edit transforms.
    write_lock: Mutex<()>,
    /// Holds the latest persisted snapshot and wakes subscribers.
    publisher: Sender<Arc<Preferences>>,
}

impl DataStore {
    /// Opens the container at `path`, creating its directory if needed.
    ///
    /// A missing file is an empty container; it is created on first write.
    ///
    /// # Arguments
    ///
    /// * `path` - Container file path.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `DataStore` or a `StoreError`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory or file cannot be accessed,
    /// or `StoreError::Corruption` if the file is not a valid container.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).await?;
        }

        let preferences = match read(&path).await {
            Ok(bytes) => {
                debug!("Loading container from existing file: {:?}", path);
                from_slice(&bytes).map_err(|source| StoreError::Corruption {
                    path: path.clone(),
                    source,
                })?
            }
            Err(error) if error.kind() == NotFound => {
                debug!("Starting empty container: {:?}", path);
                Preferences::default()
            }
            Err(error) => return Err(error.into()),
        };

        let (publisher, _) = channel(Arc::new(preferences));

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                write_lock: Mutex::new(()),
                publisher,
            }),
        })
    }

    /// Gets the container file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Gets the latest persisted snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Preferences> {
        Arc::clone(&self.inner.publisher.borrow())
    }

    /// Subscribes to a value derived from the container.
    ///
    /// # Arguments
    ///
    /// * `project` - Maps each snapshot to the value the subscriber sees.
    ///
    /// # Returns
    ///
    /// A `Subscription` that yields the current value first, then each
    /// distinct change.
    pub fn watch<T, F>(&self, project: F) -> Subscription<T>
    where
        T: Clone + PartialEq,
        F: Fn(&Arc<Preferences>) -> T + Send + Sync + 'static,
    {
        Subscription::new(self.inner.publisher.subscribe(), project)
    }

    /// Atomically applies `transform` to the container.
    ///
    /// The transform runs on its own task, so dropping the returned future
    /// does not abort a write that has started. When the transform leaves
    /// the data unchanged, nothing is written and subscribers are not woken.
    ///
    /// # Arguments
    ///
    /// * `transform` - Read-modify-write step over the current values.
    ///
    /// # Returns
    ///
    /// The snapshot in effect after the edit.
    ///
    /// # Errors
    ///
    /// Returns the transform's own error, `StoreError` if the snapshot cannot
    /// be persisted, or `StoreError::WriteAborted` if the transform panicked.
    /// The container keeps its previous state in every case.
    pub async fn edit<F>(&self, transform: F) -> Result<Arc<Preferences>, StoreError>
    where
        F: FnOnce(&mut MutablePreferences) -> Result<(), StoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        spawn(async move { inner.apply(transform).await }).await?
    }
}

impl Inner {
    async fn apply<F>(&self, transform: F) -> Result<Arc<Preferences>, StoreError>
    where
        F: FnOnce(&mut MutablePreferences) -> Result<(), StoreError>,
    {
        let _guard = self.write_lock.lock().await;

        let current = Arc::clone(&self.publisher.borrow());
        let mut editable = current.to_mutable();
        if let Err(error) = transform(&mut editable) {
            debug!(path = ?self.path, error = %error, "Edit transform rejected");
            return Err(error);
        }
        let updated = editable.into_preferences();

        if updated == *current {
            debug!("Edit left container unchanged: {:?}", self.path);
            return Ok(current);
        }

        if let Err(error) = self.persist(&updated).await {
            warn!(path = ?self.path, error = %error, "Failed to persist container");
            return Err(error);
        }

        let updated = Arc::new(updated);
        self.publisher.send_replace(Arc::clone(&updated));
        Ok(updated)
    }

    async fn persist(&self, preferences: &Preferences) -> Result<(), StoreError> {
        let contents = to_vec_pretty(preferences)?;
        let scratch = scratch_path(&self.path);

        debug!("Saving container to file: {:?}", self.path);
        if let Err(error) = write_synced(&scratch, &contents).await {
            let _ = remove_file(&scratch).await;
            return Err(error.into());
        }
        if let Err(error) = rename(&scratch, &self.path).await {
            let _ = remove_file(&scratch).await;
            return Err(error.into());
        }

        // The rename is already visible; a failed directory sync only weakens
        // crash durability of this one write.
        if let Err(error) = sync_parent_dir(&self.path).await {
            warn!(path = ?self.path, error = %error, "Failed to sync container directory");
        }
        Ok(())
    }
}

/// Writes `contents` to `path` and flushes it to stable storage.
async fn write_synced(path: &Path, contents: &[u8]) -> IoResult<()> {
    let mut file = File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

/// Syncs the directory entry so a completed rename survives a crash.
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> IoResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            File::open(parent).await?.sync_all().await
        }
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> IoResult<()> {
    Ok(())
}

fn scratch_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(SCRATCH_SUFFIX);
    PathBuf::from(name)
}
