//! Persistence of a [`TrekStore`] as JSON
//!
//! [`StoreSnapshot`] is the flat, serializable shape of the store. Loading a
//! snapshot re-checks every ordering and reference invariant, so a hand-edited
//! or truncated file is rejected instead of producing gapped positions.
//!
//! Snapshots are kept in a [`StorageBackend`], a string key/value store.
//! [`FileStorage`] keeps all keys in one JSON file on disk.

use crate::model::{Marker, Route, Trek, User};
use crate::store::TrekStore;
use crate::{Result, TrekError};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Key under which [`save_store`] and [`load_store`] keep the snapshot
pub const STORE_KEY: &str = "trek-store";

pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable image of a [`TrekStore`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub next_id: u64,
    pub users: Vec<User>,
    pub treks: Vec<Trek>,
    pub routes: Vec<Route>,
    pub markers: Vec<Marker>,
}

impl TrekStore {
    pub fn to_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            next_id: self.next_id,
            users: self.users.values().cloned().collect(),
            treks: self.treks.values().cloned().collect(),
            routes: self.routes.values().cloned().collect(),
            markers: self.markers.values().cloned().collect(),
        }
    }

    /// Rebuild a store, rejecting snapshots that break any store invariant
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TrekError::CorruptSnapshot(format!(
                "unsupported version {}",
                snapshot.version
            )));
        }

        let store = TrekStore {
            next_id: snapshot.next_id,
            users: index_by(snapshot.users, |u| u.id)?,
            treks: index_by(snapshot.treks, |t| t.id)?,
            routes: index_by(snapshot.routes, |r| r.id)?,
            markers: index_by(snapshot.markers, |m| m.id)?,
        };

        let max_id = store
            .users
            .keys()
            .map(|id| id.0)
            .chain(store.treks.keys().map(|id| id.0))
            .chain(store.routes.keys().map(|id| id.0))
            .chain(store.markers.keys().map(|id| id.0))
            .max()
            .unwrap_or(0);
        if max_id > store.next_id {
            return Err(TrekError::CorruptSnapshot(format!(
                "id {max_id} beyond counter {}",
                store.next_id
            )));
        }

        store.check_invariants()?;
        Ok(store)
    }
}

fn index_by<K, V>(values: Vec<V>, key: impl Fn(&V) -> K) -> Result<BTreeMap<K, V>>
where
    K: Ord + std::fmt::Display,
{
    let mut map = BTreeMap::new();
    for value in values {
        let k = key(&value);
        if map.contains_key(&k) {
            return Err(TrekError::CorruptSnapshot(format!("duplicate {k}")));
        }
        map.insert(k, value);
    }
    Ok(map)
}

/// String key/value storage
pub trait StorageBackend: Send + Sync {
    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// `Ok(None)` when the key is missing
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// No-op if the key does not exist
    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;
}

pub fn save_json_backend<T: Serialize>(backend: &dyn StorageBackend, key: &str, value: &T) -> Result<()> {
    backend.set_string(key, &serde_json::to_string(value)?)
}

pub fn load_json_backend<T: DeserializeOwned>(backend: &dyn StorageBackend, key: &str) -> Result<Option<T>> {
    match backend.get_string(key)? {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

/// Save the whole store under [`STORE_KEY`]
pub fn save_store(backend: &dyn StorageBackend, store: &TrekStore) -> Result<()> {
    save_json_backend(backend, STORE_KEY, &store.to_snapshot())?;
    tracing::info!(
        "Saved snapshot: {} treks, {} routes, {} markers",
        store.trek_count(),
        store.route_count(),
        store.marker_count()
    );
    Ok(())
}

/// Load the store saved under [`STORE_KEY`], or an empty one if there is none
pub fn load_store(backend: &dyn StorageBackend) -> Result<TrekStore> {
    match load_json_backend::<StoreSnapshot>(backend, STORE_KEY)? {
        Some(snapshot) => {
            let store = TrekStore::from_snapshot(snapshot)?;
            tracing::info!(
                "Loaded snapshot: {} treks, {} routes, {} markers",
                store.trek_count(),
                store.route_count(),
                store.marker_count()
            );
            Ok(store)
        }
        None => {
            tracing::debug!("No snapshot under {STORE_KEY}, starting empty");
            Ok(TrekStore::new())
        }
    }
}

/// File-based storage: one JSON object mapping keys to string values
///
/// The file is read once on open; every mutation rewrites it synchronously.
pub struct FileStorage {
    path: PathBuf,
    inner: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, creating its parent directory; a missing file is an empty store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let map = if path.exists() {
            let s = fs::read_to_string(&path)?;
            if s.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&s)?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush_locked(&self, map: &HashMap<String, String>) -> Result<()> {
        // Sorted keys keep the file stable across writes
        let sorted: BTreeMap<&String, &String> = map.iter().collect();
        fs::write(&self.path, serde_json::to_string_pretty(&sorted)?)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_string(), value.to_string());
        self.flush_locked(&guard)
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.remove(key).is_some() {
            self.flush_locked(&guard)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = guard.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
