//! Structured-store capability and its in-process implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::StoreError;
use crate::hive::{HiveNode, RegValue};
use crate::paths::KeyPath;

/// A hierarchical key/value store addressed by [`KeyPath`]s.
///
/// Keys hold named typed values and child keys. Lookups never fail: a missing
/// key or value is `None`. Mutations report why they could not be applied.
pub trait Registry: Send + Sync {
    fn key_exists(&self, path: &KeyPath) -> bool;

    /// Creates `path` and any missing ancestors. Existing keys are kept.
    fn create_key(&self, path: &KeyPath) -> Result<(), StoreError>;

    fn query_value(&self, path: &KeyPath, name: &str) -> Option<RegValue>;

    /// Sets a value on an existing key.
    fn set_value(&self, path: &KeyPath, name: &str, value: RegValue) -> Result<(), StoreError>;

    /// Returns whether a value was removed.
    fn delete_value(&self, path: &KeyPath, name: &str) -> Result<bool, StoreError>;

    /// Removes a key and its whole subtree. Returns whether anything was removed.
    fn delete_key(&self, path: &KeyPath) -> Result<bool, StoreError>;

    /// Names of the direct child keys, in store order.
    fn subkeys(&self, path: &KeyPath) -> Vec<String>;

    /// Every value stored directly on `path`, in store order.
    fn values(&self, path: &KeyPath) -> Vec<(String, RegValue)>;
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn set_in(root: &mut HiveNode, path: &KeyPath, name: &str, value: RegValue) -> Result<(), StoreError> {
    let node = root
        .find_mut(path)
        .ok_or_else(|| StoreError::RegistryKeyMissing {
            path: path.to_string(),
        })?;
    node.values.insert(name.to_string(), value);
    Ok(())
}

fn delete_value_in(root: &mut HiveNode, path: &KeyPath, name: &str) -> bool {
    root.find_mut(path)
        .map(|node| node.values.remove(name).is_some())
        .unwrap_or(false)
}

fn values_in(root: &HiveNode, path: &KeyPath) -> Vec<(String, RegValue)> {
    root.find(path)
        .map(|node| {
            node.values
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

fn subkeys_in(root: &HiveNode, path: &KeyPath) -> Vec<String> {
    root.find(path)
        .map(|node| node.children.keys().cloned().collect())
        .unwrap_or_default()
}

/// Structured store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    root: Mutex<HiveNode>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> HiveNode {
        lock_unpoisoned(&self.root).clone()
    }
}

impl Registry for MemoryRegistry {
    fn key_exists(&self, path: &KeyPath) -> bool {
        lock_unpoisoned(&self.root).find(path).is_some()
    }

    fn create_key(&self, path: &KeyPath) -> Result<(), StoreError> {
        lock_unpoisoned(&self.root).find_or_create(path);
        Ok(())
    }

    fn query_value(&self, path: &KeyPath, name: &str) -> Option<RegValue> {
        lock_unpoisoned(&self.root)
            .find(path)
            .and_then(|node| node.values.get(name).cloned())
    }

    fn set_value(&self, path: &KeyPath, name: &str, value: RegValue) -> Result<(), StoreError> {
        set_in(&mut lock_unpoisoned(&self.root), path, name, value)
    }

    fn delete_value(&self, path: &KeyPath, name: &str) -> Result<bool, StoreError> {
        Ok(delete_value_in(&mut lock_unpoisoned(&self.root), path, name))
    }

    fn delete_key(&self, path: &KeyPath) -> Result<bool, StoreError> {
        Ok(lock_unpoisoned(&self.root).remove(path))
    }

    fn subkeys(&self, path: &KeyPath) -> Vec<String> {
        subkeys_in(&lock_unpoisoned(&self.root), path)
    }

    fn values(&self, path: &KeyPath) -> Vec<(String, RegValue)> {
        values_in(&lock_unpoisoned(&self.root), path)
    }
}

/// Structured store persisted as a single JSON hive file.
///
/// Every successful mutation rewrites the hive. A missing hive file is an
/// empty store.
#[derive(Debug)]
pub struct JsonRegistry {
    path: PathBuf,
    root: Mutex<HiveNode>,
}

impl JsonRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let root = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HiveNode::default(),
            Ok(bytes) => serde_json::from_slice::<HiveNode>(&bytes)
                .map_err(|source| StoreError::hive_parse(&path, source))?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "registry hive missing; starting empty");
                HiveNode::default()
            }
            Err(source) => return Err(StoreError::io("reading registry hive", &path, source)),
        };

        Ok(Self {
            path,
            root: Mutex::new(root),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, root: &HiveNode) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::io("creating registry hive directory", parent, source))?;
        }
        let encoded = serde_json::to_vec_pretty(root)
            .map_err(|source| StoreError::hive_serialize(&self.path, source))?;
        fs::write(&self.path, encoded)
            .map_err(|source| StoreError::io("writing registry hive", &self.path, source))
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut HiveNode) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut root = lock_unpoisoned(&self.root);
        let mut updated = root.clone();
        let result = apply(&mut updated)?;
        if updated != *root {
            self.save(&updated)?;
            *root = updated;
        }
        Ok(result)
    }
}

impl Registry for JsonRegistry {
    fn key_exists(&self, path: &KeyPath) -> bool {
        lock_unpoisoned(&self.root).find(path).is_some()
    }

    fn create_key(&self, path: &KeyPath) -> Result<(), StoreError> {
        self.mutate(|root| {
            root.find_or_create(path);
            Ok(())
        })
    }

    fn query_value(&self, path: &KeyPath, name: &str) -> Option<RegValue> {
        lock_unpoisoned(&self.root)
            .find(path)
            .and_then(|node| node.values.get(name).cloned())
    }

    fn set_value(&self, path: &KeyPath, name: &str, value: RegValue) -> Result<(), StoreError> {
        self.mutate(|root| set_in(root, path, name, value))
    }

    fn delete_value(&self, path: &KeyPath, name: &str) -> Result<bool, StoreError> {
        self.mutate(|root| Ok(delete_value_in(root, path, name)))
    }

    fn delete_key(&self, path: &KeyPath) -> Result<bool, StoreError> {
        self.mutate(|root| Ok(root.remove(path)))
    }

    fn subkeys(&self, path: &KeyPath) -> Vec<String> {
        subkeys_in(&lock_unpoisoned(&self.root), path)
    }

    fn values(&self, path: &KeyPath) -> Vec<(String, RegValue)> {
        values_in(&lock_unpoisoned(&self.root), path)
    }
}
