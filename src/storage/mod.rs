//! Namespaced JSON storage over a pluggable key-value medium
//!
//! A [`StorageMedium`] is a flat, synchronous string-to-string map (the
//! shape of a browser's `localStorage`).  [`JsonStore`] layers a namespace
//! and JSON (de)serialization on top of it, and optionally a reconstruction
//! function that turns the parsed JSON into a typed record.
//!
//! Several stores usually share one medium; see [`bindings`] for the three
//! stores used by the login orchestrator.
//!
//! # Key layout
//!
//! A store with namespace `oidc.clients` reads and writes:
//!
//! - `oidc.clients` when no sub-key is given
//! - `oidc.clients.<subkey>` otherwise
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use oidc_web::storage::{JsonStore, MemoryStorage};
//!
//! # #[tokio::main]
//! # async fn main() -> oidc_web::Result<()> {
//! let medium = Arc::new(MemoryStorage::new());
//! let store: JsonStore<String> = JsonStore::new("oidc.providers", medium);
//!
//! store.save(Some("abc"), "https://oidc.example.com".to_string()).await?;
//! assert_eq!(
//!     store.get(Some("abc")).await.as_deref(),
//!     Some("https://oidc.example.com")
//! );
//! assert!(store.get(Some("missing")).await.is_none());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{OidcWebError, Result};

pub mod bindings;
pub mod sqlite;

pub use sqlite::SqliteStorage;

// ---------------------------------------------------------------------------
// StorageMedium
// ---------------------------------------------------------------------------

/// Synchronous key-value medium backing one or more [`JsonStore`]s.
///
/// The medium is shared by every store built on it; implementations must be
/// safe to call from any task.
pub trait StorageMedium: Send + Sync {
    /// Returns the raw string stored under `key`, or `None` when absent.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes every item from the medium.
    fn clear(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-process [`StorageMedium`] backed by a `HashMap`.
///
/// This is the default medium for an embedded browsing context and for tests.
/// Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .items
            .lock()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn poisoned() -> OidcWebError {
        OidcWebError::Storage("memory storage lock poisoned".to_string())
    }
}

impl StorageMedium for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().map_err(|_| Self::poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| Self::poisoned())?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| Self::poisoned())?;
        items.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonStore
// ---------------------------------------------------------------------------

/// Reconstruction hook applied to successfully parsed, non-empty JSON on read.
pub type Reconstruct<T> = fn(Value) -> Result<T>;

/// A namespaced JSON repository over a shared [`StorageMedium`].
///
/// Reads never fail: a missing key, a medium read error, malformed JSON and
/// a record the reconstruction hook rejects are all reported as `None`.
/// Writes propagate serialization and medium errors.
///
/// All operations are `async` even though the medium is synchronous, so an
/// asynchronous medium can be substituted later without changing callers.
pub struct JsonStore<T> {
    namespace: String,
    medium: Arc<dyn StorageMedium>,
    reconstruct: Option<Reconstruct<T>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonStore<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            medium: Arc::clone(&self.medium),
            reconstruct: self.reconstruct,
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for JsonStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("namespace", &self.namespace)
            .field("reconstruct", &self.reconstruct.is_some())
            .finish()
    }
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a store that returns the parsed JSON deserialized as `T`.
    pub fn new(namespace: impl Into<String>, medium: Arc<dyn StorageMedium>) -> Self {
        Self {
            namespace: namespace.into(),
            medium,
            reconstruct: None,
            _record: PhantomData,
        }
    }

    /// Creates a store that passes parsed JSON through `reconstruct` on read.
    ///
    /// Falsy JSON (`false`, `0`, `""`) short-circuits to `None` without
    /// invoking the hook.
    pub fn with_reconstruct(
        namespace: impl Into<String>,
        medium: Arc<dyn StorageMedium>,
        reconstruct: Reconstruct<T>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            medium,
            reconstruct: Some(reconstruct),
            _record: PhantomData,
        }
    }

    /// The namespace this store writes under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The medium shared with sibling stores.
    pub fn medium(&self) -> &Arc<dyn StorageMedium> {
        &self.medium
    }

    /// Composes the medium key for an optional sub-key.
    ///
    /// An empty sub-key addresses the bare namespace.
    pub fn key_for(&self, key: Option<&str>) -> String {
        match key {
            Some(k) if !k.is_empty() => format!("{}.{}", self.namespace, k),
            _ => self.namespace.clone(),
        }
    }

    /// Loads the record stored under `key`.
    pub async fn get(&self, key: Option<&str>) -> Option<T> {
        let key = self.key_for(key);

        let contents = match self.medium.get_item(&key) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Storage read failed, treating as absent");
                return None;
            }
        };

        let value: Value = match serde_json::from_str(contents.as_deref().unwrap_or_default()) {
            Ok(value) => value,
            Err(e) => {
                if contents.is_some() {
                    tracing::debug!(key = %key, error = %e, "Discarding unparseable stored value");
                }
                return None;
            }
        };

        if value.is_null() {
            return None;
        }

        match self.reconstruct {
            Some(reconstruct) => {
                if is_falsy(&value) {
                    return None;
                }
                match reconstruct(value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(
                            key = %key,
                            error = %e,
                            "Stored record could not be reconstructed"
                        );
                        None
                    }
                }
            }
            None => match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Stored value has unexpected shape");
                    None
                }
            },
        }
    }

    /// Serializes `value` under `key` and hands it back.
    ///
    /// `save(None, value)` stores the value under the bare namespace.
    pub async fn save(&self, key: Option<&str>, value: T) -> Result<T> {
        let key = self.key_for(key);
        let contents = serde_json::to_string(&value)?;
        self.medium.set_item(&key, &contents)?;
        tracing::debug!(key = %key, "Saved record");
        Ok(value)
    }

    /// Clears the underlying medium.
    ///
    /// This removes every item in the medium, including records written by
    /// other namespaces sharing it, not only this store's keys.  The medium
    /// contract has no key enumeration to scope the removal with.
    pub async fn clear(&self) -> Result<()> {
        tracing::debug!(namespace = %self.namespace, "Clearing storage medium");
        self.medium.clear()
    }
}

/// JavaScript-style falsiness for parsed JSON.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
