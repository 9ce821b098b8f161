use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;
use crate::models::HttpResponse;

/// File extension for store files inside the cache directory.
const STORE_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes().max(0)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    entries: BTreeMap<String, CachedData<HttpResponse>>,
}

/// Durable named cache stores, one JSON file per store.
///
/// Writes replace the whole file through a temporary file and a rename so a
/// crash never leaves a half-written store behind.
pub struct CacheStorage {
    cache_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CacheStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn store_path(&self, name: &str) -> Result<PathBuf, CacheError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(CacheError::InvalidName(name.to_string()));
        }
        Ok(self.cache_dir.join(format!("{}.{}", name, STORE_EXTENSION)))
    }

    fn load(&self, name: &str) -> Result<StoreFile, CacheError> {
        let path = self.store_path(name)?;
        if !path.exists() {
            return Ok(StoreFile::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, name: &str, store: &StoreFile) -> Result<(), CacheError> {
        let path = self.store_path(name)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(store)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Create the store if it does not exist yet.
    pub fn open(&self, name: &str) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().map_err(|_| CacheError::Poisoned)?;
        if !self.store_path(name)?.exists() {
            self.save(name, &StoreFile::default())?;
        }
        Ok(())
    }

    /// Names of every store on disk, sorted.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STORE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn has(&self, name: &str) -> bool {
        self.store_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Delete a store. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let _guard = self.write_lock.lock().map_err(|_| CacheError::Poisoned)?;
        let path = self.store_path(name)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        debug!(store = name, "Deleted cache store");
        Ok(true)
    }

    pub fn lookup(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<CachedData<HttpResponse>>, CacheError> {
        Ok(self.load(name)?.entries.remove(key))
    }

    /// Store a response, replacing any earlier entry for the same key.
    pub fn put(&self, name: &str, key: &str, response: &HttpResponse) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().map_err(|_| CacheError::Poisoned)?;
        let mut store = self.load(name)?;
        store
            .entries
            .insert(key.to_string(), CachedData::new(response.clone()));
        self.save(name, &store)
    }

    pub fn len(&self, name: &str) -> Result<usize, CacheError> {
        Ok(self.load(name)?.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, CacheStorage) {
        let dir = TempDir::new().unwrap();
        let storage = CacheStorage::new(dir.path().join("caches")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_put_and_lookup() {
        let (_dir, storage) = storage();
        let response = HttpResponse::new(200, "hello").with_header("content-type", "text/plain");
        storage.put("shell-v1", "GET http://app.test/", &response).unwrap();

        let cached = storage.lookup("shell-v1", "GET http://app.test/").unwrap().unwrap();
        assert_eq!(cached.data, response);
        assert!(cached.age_minutes() <= 1);
        assert!(storage.lookup("shell-v1", "GET http://app.test/missing").unwrap().is_none());
        assert!(storage.lookup("never-opened", "GET http://app.test/").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let (_dir, storage) = storage();
        storage.put("data-v1", "k", &HttpResponse::new(200, "old")).unwrap();
        storage.put("data-v1", "k", &HttpResponse::new(200, "new")).unwrap();
        assert_eq!(storage.len("data-v1").unwrap(), 1);
        assert_eq!(storage.lookup("data-v1", "k").unwrap().unwrap().data.body, b"new".to_vec());
    }

    #[test]
    fn test_keys_and_delete() {
        let (_dir, storage) = storage();
        storage.open("shell-v1").unwrap();
        storage.open("data-v1").unwrap();
        storage.open("shell-v0").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["data-v1", "shell-v0", "shell-v1"]);

        assert!(storage.delete("shell-v0").unwrap());
        assert!(!storage.delete("shell-v0").unwrap());
        assert!(!storage.has("shell-v0"));
        assert_eq!(storage.keys().unwrap(), vec!["data-v1", "shell-v1"]);
    }

    #[test]
    fn test_stores_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
            storage.put("shell-v1", "k", &HttpResponse::new(200, "x")).unwrap();
        }
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        assert!(storage.lookup("shell-v1", "k").unwrap().is_some());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (_dir, storage) = storage();
        assert!(matches!(storage.open("../escape"), Err(CacheError::InvalidName(_))));
        assert!(matches!(storage.open(""), Err(CacheError::InvalidName(_))));
        assert!(!storage.has(".hidden"));
    }
}
