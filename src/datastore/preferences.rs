//! Typed preference keys, values, and snapshots.
//!
//! A container maps string keys to either an integer or a set of strings.
//! `Preferences` is the immutable snapshot published to readers;
//! `MutablePreferences` is the view handed to an edit transform.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Debug, Formatter, Result as FmtResult},
    marker::PhantomData,
};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A stored preference value.
///
/// Serialized untagged: integers as JSON numbers, string sets as arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    /// 32-bit integer value.
    Int(i32),
    /// Set of strings.
    StringSet(BTreeSet<String>),
}

/// Value kinds a `Key` can address.
pub trait PreferenceType: Sized {
    /// Extracts a value of this kind, or `None` if the stored kind differs.
    fn from_value(value: &PreferenceValue) -> Option<Self>;

    /// Wraps this value for storage.
    fn into_value(self) -> PreferenceValue;
}

impl PreferenceType for i32 {
    fn from_value(value: &PreferenceValue) -> Option<Self> {
        match value {
            PreferenceValue::Int(value) => Some(*value),
            PreferenceValue::StringSet(_) => None,
        }
    }

    fn into_value(self) -> PreferenceValue {
        PreferenceValue::Int(self)
    }
}

impl PreferenceType for BTreeSet<String> {
    fn from_value(value: &PreferenceValue) -> Option<Self> {
        match value {
            PreferenceValue::StringSet(set) => Some(set.clone()),
            PreferenceValue::Int(_) => None,
        }
    }

    fn into_value(self) -> PreferenceValue {
        PreferenceValue::StringSet(self)
    }
}

/// A typed preference key.
///
/// The type parameter fixes the value kind, so an integer key can never be
/// read back as a string set.
pub struct Key<T> {
    name: String,
    kind: PhantomData<fn() -> T>,
}

impl Key<i32> {
    /// Creates an integer key.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name)
    }
}

impl Key<BTreeSet<String>> {
    /// Creates a string-set key.
    pub fn string_set(name: impl Into<String>) -> Self {
        Self::new(name)
    }
}

impl<T> Key<T> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PhantomData,
        }
    }

    /// Gets the key name as stored in the container.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for Key<T> {}

impl<T> Debug for Key<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Immutable snapshot of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences {
    values: BTreeMap<String, PreferenceValue>,
}

impl Preferences {
    /// Gets the value stored under `key`.
    ///
    /// # Returns
    ///
    /// `None` if the key is absent or holds a value of another kind.
    pub fn get<T: PreferenceType>(&self, key: &Key<T>) -> Option<T> {
        self.values.get(key.name()).and_then(T::from_value)
    }

    /// Iterates over the raw key names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PreferenceValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the container holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Creates an editable copy of this snapshot.
    #[must_use]
    pub fn to_mutable(&self) -> MutablePreferences {
        MutablePreferences {
            values: self.values.clone(),
        }
    }
}

/// Editable view of a container, handed to `DataStore::edit` transforms.
///
/// Unlike snapshot reads, the edit view never treats a value of another
/// kind as absent: reading or writing a key that holds the other kind fails,
/// so a transform cannot replace a string set with an integer or the reverse.
#[derive(Debug, Clone, Default)]
pub struct MutablePreferences {
    values: BTreeMap<String, PreferenceValue>,
}

impl MutablePreferences {
    /// Gets the value stored under `key`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KindMismatch` if the key holds the other kind.
    pub fn get<T: PreferenceType>(&self, key: &Key<T>) -> Result<Option<T>, StoreError> {
        match self.values.get(key.name()) {
            None => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| StoreError::kind_mismatch(key.name())),
        }
    }

    /// Stores `value` under `key`, replacing any previous value of its kind.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::KindMismatch` if the key holds the other kind;
    /// the stored value is left untouched.
    pub fn set<T: PreferenceType>(&mut self, key: &Key<T>, value: T) -> Result<(), StoreError> {
        self.get(key)?;
        self.values.insert(key.name().to_owned(), value.into_value());
        Ok(())
    }

    /// Freezes the edited values into a snapshot.
    #[must_use]
    pub fn into_preferences(self) -> Preferences {
        Preferences {
            values: self.values,
        }
    }
}
