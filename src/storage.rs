//! Image store: fetch raw bytes by key and list keys under a prefix.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no image stored under {0}")]
    NotFound(String),

    #[error("io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait ImageStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Store backed by a directory; keys are `/`-separated paths relative to the root.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key to a path under the root, refusing anything that could escape it.
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty()) {
            return None;
        }
        let rel = Path::new(key);
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }

    fn walk(&self, dir: &Path, keys: &mut Vec<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.walk(&path, keys)?;
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let parts: Option<Vec<&str>> = rel
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect();
            match parts {
                Some(parts) => keys.push(parts.join("/")),
                None => log::warn!("skipping non utf-8 path {}", path.display()),
            }
        }
        Ok(())
    }
}

impl ImageStore for FsStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self
            .resolve(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if !path.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        std::fs::read(&path).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            self.walk(&self.root, &mut keys)
                .map_err(|source| StoreError::Io {
                    key: prefix.to_string(),
                    source,
                })?;
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, data: Vec<u8>) {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.insert(key.into(), data);
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.remove(key)
    }
}

impl ImageStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs_fixture() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let photos = dir.path().join("Photos").join("nested");
        std::fs::create_dir_all(&photos).unwrap();
        std::fs::write(dir.path().join("Photos").join("b.png"), b"b").unwrap();
        std::fs::write(dir.path().join("Photos").join("a.jpg"), b"a").unwrap();
        std::fs::write(photos.join("c.jpeg"), b"c").unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"s").unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_fs_list_sorted_and_prefixed() {
        let (_dir, store) = fs_fixture();
        assert_eq!(
            store.list("Photos/").unwrap(),
            vec!["Photos/a.jpg", "Photos/b.png", "Photos/nested/c.jpeg"]
        );
        assert_eq!(store.list("").unwrap().len(), 4);
    }

    #[test]
    fn test_fs_get() {
        let (_dir, store) = fs_fixture();
        assert_eq!(store.get("Photos/nested/c.jpeg").unwrap(), b"c");
        assert!(matches!(
            store.get("Photos/missing.jpg"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.get("Photos"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_fs_rejects_escaping_keys() {
        let (_dir, store) = fs_fixture();
        for key in ["Photos/../secret.txt", "/etc/passwd", "Photos//a.jpg", "./secret.txt", ""] {
            assert!(
                matches!(store.get(key), Err(StoreError::NotFound(_))),
                "{key} should not resolve"
            );
        }
    }

    #[test]
    fn test_fs_missing_root_lists_nothing() {
        let store = FsStore::new("/nonexistent/sketchrs-store");
        assert!(store.list("Photos/").unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.insert("Photos/x.png", vec![1, 2]);
        store.insert("Sketches/y.png", vec![3]);
        assert_eq!(store.list("Photos/").unwrap(), vec!["Photos/x.png"]);
        assert_eq!(store.get("Photos/x.png").unwrap(), vec![1, 2]);
        assert!(store.remove("Photos/x.png").is_some());
        assert!(matches!(store.get("Photos/x.png"), Err(StoreError::NotFound(_))));
    }
}
