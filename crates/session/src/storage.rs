//! Durable token storage

use crate::api::TokenPair;
use crate::config::AuthConfig;
use crate::error::StorageError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// Key/value string store in the shape of browser Web Storage
pub trait TokenStorage: Send + Sync {
    /// Read an item
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write an item, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove an item; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Load the persisted pair; both entries must be present
pub(crate) fn load_pair(storage: &dyn TokenStorage) -> Result<Option<TokenPair>, StorageError> {
    let access = storage.get_item(AuthConfig::ACCESS_TOKEN_KEY)?;
    let refresh = storage.get_item(AuthConfig::REFRESH_TOKEN_KEY)?;
    Ok(match (access, refresh) {
        (Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
        _ => None,
    })
}

/// Persist both entries
///
/// If the refresh entry cannot be written the previous access entry is put
/// back, so storage never holds a pair mixed from two sessions. When that
/// also fails both entries are removed.
pub(crate) fn store_pair(storage: &dyn TokenStorage, pair: &TokenPair) -> Result<(), StorageError> {
    let previous_access = storage.get_item(AuthConfig::ACCESS_TOKEN_KEY)?;
    storage.set_item(AuthConfig::ACCESS_TOKEN_KEY, &pair.access)?;

    let Err(e) = storage.set_item(AuthConfig::REFRESH_TOKEN_KEY, &pair.refresh) else {
        return Ok(());
    };

    let restored = match previous_access {
        Some(access) => storage.set_item(AuthConfig::ACCESS_TOKEN_KEY, &access),
        None => storage.remove_item(AuthConfig::ACCESS_TOKEN_KEY),
    };
    if let Err(rollback) = restored {
        warn!(error = %rollback, "Failed to restore previous access token, clearing storage");
        let _ = clear_pair(storage);
    }
    Err(e)
}

/// Remove both entries, attempting each even if the first fails
pub(crate) fn clear_pair(storage: &dyn TokenStorage) -> Result<(), StorageError> {
    let access = storage.remove_item(AuthConfig::ACCESS_TOKEN_KEY);
    let refresh = storage.remove_item(AuthConfig::REFRESH_TOKEN_KEY);
    access.and(refresh)
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// Storage backed by a JSON object file
///
/// Every write replaces the file through a temporary sibling and a rename,
/// so a crash never leaves a half-written token file behind. On Unix the
/// file is created owner-only.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Corrupt(format!(
                "expected a JSON object in {}, found {}",
                self.path.display(),
                type_name(&other)
            ))),
        }
    }

    fn write_all(&self, items: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(items)?;
        let tmp_path = self.path.with_extension("tmp");
        write_private(&tmp_path, content.as_bytes())?;
        std::fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "Token storage written");
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let items = self.read_all()?;
        Ok(items.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_all()?;
        items.insert(key.to_string(), Value::String(value.to_string()));
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut items, corrupt) = match self.read_all() {
            Ok(items) => (items, false),
            // A corrupt file cannot hold a usable token; start over
            Err(StorageError::Corrupt(_)) => (Map::new(), true),
            Err(e) => return Err(e),
        };
        if items.remove(key).is_none() && !corrupt {
            return Ok(());
        }
        if items.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
        self.write_all(&items)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access: "a.b.c".into(),
            refresh: "r.e.f".into(),
        }
    }

    #[test]
    fn test_memory_pair_lifecycle() {
        let storage = MemoryStorage::new();
        assert_eq!(load_pair(&storage).unwrap(), None);

        store_pair(&storage, &pair()).unwrap();
        assert_eq!(load_pair(&storage).unwrap(), Some(pair()));
        assert_eq!(storage.len(), 2);

        clear_pair(&storage).unwrap();
        assert!(storage.is_empty());
    }

    /// Memory storage whose writes to one key always fail
    #[derive(Default)]
    struct FailingKey {
        inner: MemoryStorage,
        key: &'static str,
    }

    impl TokenStorage for FailingKey {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::Io("disk full".into()));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn test_failed_refresh_write_restores_previous_access() {
        let storage = FailingKey {
            key: AuthConfig::REFRESH_TOKEN_KEY,
            ..FailingKey::default()
        };
        storage
            .inner
            .set_item(AuthConfig::ACCESS_TOKEN_KEY, "access-alice")
            .unwrap();
        storage
            .inner
            .set_item(AuthConfig::REFRESH_TOKEN_KEY, "refresh-alice")
            .unwrap();

        let bob = TokenPair {
            access: "access-bob".into(),
            refresh: "refresh-bob".into(),
        };
        assert!(matches!(
            store_pair(&storage, &bob),
            Err(StorageError::Io(_))
        ));
        assert_eq!(
            load_pair(&storage).unwrap(),
            Some(TokenPair {
                access: "access-alice".into(),
                refresh: "refresh-alice".into(),
            })
        );
    }

    #[test]
    fn test_failed_refresh_write_on_empty_storage_leaves_nothing() {
        let storage = FailingKey {
            key: AuthConfig::REFRESH_TOKEN_KEY,
            ..FailingKey::default()
        };
        assert!(store_pair(&storage, &pair()).is_err());
        assert!(storage.inner.is_empty());
    }

    #[test]
    fn test_half_pair_is_absent() {
        let storage = MemoryStorage::new();
        storage
            .set_item(AuthConfig::ACCESS_TOKEN_KEY, "only-access")
            .unwrap();
        assert_eq!(load_pair(&storage).unwrap(), None);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let storage = FileStorage::new(&path);

        assert_eq!(storage.get_item("access").unwrap(), None);

        store_pair(&storage, &pair()).unwrap();
        let reopened = FileStorage::new(&path);
        assert_eq!(load_pair(&reopened).unwrap(), Some(pair()));

        clear_pair(&reopened).unwrap();
        assert!(!path.exists());
        assert_eq!(load_pair(&storage).unwrap(), None);
    }

    #[test]
    fn test_file_storage_keeps_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));

        storage.set_item("theme", "dark").unwrap();
        store_pair(&storage, &pair()).unwrap();
        clear_pair(&storage).unwrap();

        assert_eq!(storage.get_item("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_file_storage_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get_item("access"),
            Err(StorageError::Corrupt(_))
        ));

        clear_pair(&storage).unwrap();
        assert_eq!(storage.get_item("access").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);
        storage.set_item("access", "token").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
