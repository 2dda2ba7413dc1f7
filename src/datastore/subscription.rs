//! Live, cancellable views over a container.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use tokio::sync::watch::Receiver;

use crate::datastore::preferences::Preferences;

/// Projection from a container snapshot to the value a subscriber sees.
type Projection<T> = Box<dyn Fn(&Arc<Preferences>) -> T + Send + Sync>;

/// Live view of one value derived from a container.
///
/// The first call to [`Subscription::next`] yields the current value. Each
/// later call waits until the derived value differs from the last one
/// delivered. Dropping the subscription cancels it without affecting other
/// subscribers or pending writes.
pub struct Subscription<T> {
    receiver: Receiver<Arc<Preferences>>,
    project: Projection<T>,
    last: Option<T>,
}

impl<T: Clone + PartialEq> Subscription<T> {
    pub(crate) fn new<F>(receiver: Receiver<Arc<Preferences>>, project: F) -> Self
    where
        F: Fn(&Arc<Preferences>) -> T + Send + Sync + 'static,
    {
        Self {
            receiver,
            project: Box::new(project),
            last: None,
        }
    }

    /// Waits for the next value.
    ///
    /// # Returns
    ///
    /// The current value on the first call, then the next distinct value.
    /// `None` once the store has been dropped and every published value
    /// has been delivered.
    pub async fn next(&mut self) -> Option<T> {
        if self.last.is_none() {
            let value = self.project_latest();
            self.last = Some(value.clone());
            return Some(value);
        }

        loop {
            self.receiver.changed().await.ok()?;
            let value = self.project_latest();
            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Some(value);
            }
        }
    }

    /// Gets the current value without waiting or marking it delivered.
    pub fn current(&self) -> T {
        let snapshot = Arc::clone(&self.receiver.borrow());
        (self.project)(&snapshot)
    }

    fn project_latest(&mut self) -> T {
        let snapshot = Arc::clone(&self.receiver.borrow_and_update());
        (self.project)(&snapshot)
    }
}

impl<T: Debug> Debug for Subscription<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Subscription")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}
