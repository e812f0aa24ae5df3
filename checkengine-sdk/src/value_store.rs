//! Persistent per-service key/value state.
//!
//! Plugins that derive rates or averages need the previous observation. The
//! [`ValueStoreManager`] owns all of that state, partitioned by
//! `(host, check plugin, item)`. Each evaluation gets a [`ValueStore`] handle
//! for its own partition, so two services never share a key.
//!
//! The owner of the manager decides when state hits the disk: load it before
//! a check cycle, [`save`](ValueStoreManager::save) it when the cycle is done.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use checkengine_types::CheckPluginName;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors loading or saving the value store.
#[derive(Debug, Error)]
pub enum ValueStoreError {
    /// Reading or writing the backing file failed.
    #[error("value store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file is not a valid value store.
    #[error("value store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Identifies the partition of one service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub host: String,
    pub plugin: CheckPluginName,
    #[serde(default)]
    pub item: Option<String>,
}

type ScopeData = BTreeMap<String, Value>;

#[derive(Serialize, Deserialize)]
struct PersistedScope {
    #[serde(flatten)]
    key: ScopeKey,
    values: ScopeData,
}

/// Owner of all value store partitions.
///
/// # Example
///
/// ```rust
/// use checkengine_sdk::ValueStoreManager;
/// use checkengine_types::CheckPluginName;
///
/// let manager = ValueStoreManager::new();
/// let plugin = CheckPluginName::new("interfaces").unwrap();
///
/// let store = manager.scope("web01", &plugin, Some("eth0"));
/// store.set("in_octets", 1024);
///
/// // Another handle for the same service sees the same data
/// let again = manager.scope("web01", &plugin, Some("eth0"));
/// assert_eq!(again.get_as::<u64>("in_octets"), Some(1024));
///
/// // A different item does not
/// let other = manager.scope("web01", &plugin, Some("eth1"));
/// assert!(other.get("in_octets").is_none());
/// ```
#[derive(Debug, Default)]
pub struct ValueStoreManager {
    scopes: RwLock<BTreeMap<ScopeKey, Arc<Mutex<ScopeData>>>>,
}

impl ValueStoreManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manager from a file written by [`save`](Self::save).
    ///
    /// A missing file yields an empty store; the first check cycle after
    /// installation has no history.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ValueStoreError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No value store file yet, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(ValueStoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let persisted: Vec<PersistedScope> =
            serde_json::from_str(&content).map_err(|source| ValueStoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        let scopes = persisted
            .into_iter()
            .map(|scope| (scope.key, Arc::new(Mutex::new(scope.values))))
            .collect::<BTreeMap<_, _>>();
        debug!(path = %path.display(), scopes = scopes.len(), "Loaded value store");

        Ok(Self {
            scopes: RwLock::new(scopes),
        })
    }

    /// Write all non-empty partitions to `path`.
    ///
    /// The data goes to a sibling temporary file first and is renamed into
    /// place, so a crash never leaves a half-written store behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ValueStoreError> {
        let path = path.as_ref();
        let persisted: Vec<PersistedScope> = self
            .scopes
            .read()
            .iter()
            .filter_map(|(key, data)| {
                let values = data.lock().clone();
                (!values.is_empty()).then(|| PersistedScope {
                    key: key.clone(),
                    values,
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&persisted).map_err(|source| {
            ValueStoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let io_err = |source| ValueStoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "value_store".to_string());
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        debug!(path = %path.display(), scopes = persisted.len(), "Saved value store");
        Ok(())
    }

    /// Get the handle for one service's partition, creating it if needed.
    pub fn scope(&self, host: &str, plugin: &CheckPluginName, item: Option<&str>) -> ValueStore {
        let key = ScopeKey {
            host: host.to_string(),
            plugin: plugin.clone(),
            item: item.map(str::to_string),
        };

        // Fast path: check if it exists
        {
            let scopes = self.scopes.read();
            if let Some(data) = scopes.get(&key) {
                return ValueStore { data: data.clone() };
            }
        }

        // Slow path: create it
        let mut scopes = self.scopes.write();
        let data = scopes.entry(key).or_default().clone();
        ValueStore { data }
    }

    /// Drop a partition entirely. Returns whether it existed.
    pub fn clear_scope(&self, key: &ScopeKey) -> bool {
        self.scopes.write().remove(key).is_some()
    }

    /// All known partition keys.
    pub fn keys(&self) -> Vec<ScopeKey> {
        self.scopes.read().keys().cloned().collect()
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.scopes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.read().is_empty()
    }
}

/// Handle to one service's partition of the value store.
///
/// Cloning is cheap; clones share the same data. A handle created with
/// [`ValueStore::new`] is detached from any manager, which is what tests
/// and one-off evaluations use.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    data: Arc<Mutex<ScopeData>>,
}

impl ValueStore {
    /// Create a detached, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().get(key).cloned()
    }

    /// Deserialize a stored value. Values of the wrong shape read as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).ok()
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}
