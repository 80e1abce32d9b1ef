//! Key/value record stores.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::storage::{StorageError, WindowRecord};

/// Minimal object-store seam: write, read and list keys by prefix.
///
/// Keys are `/`-separated relative paths.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Store `body` under `key`, replacing any previous value.
    async fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError>;

    /// Fetch the value under `key`, if present.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// All keys starting with `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Suffix reserved for in-progress writes; keys may not end with it.
const TEMP_SUFFIX: &str = ".tmp";

/// Filesystem-backed store. Each key is a file below `root`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with('/')
            && !key.ends_with(TEMP_SUFFIX)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

#[async_trait::async_trait]
impl RecordStore for FileStore {
    async fn put(&self, key: &str, body: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // write to a sibling temp file first so readers never see a partial record
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(key = %key, bytes = body.len(), "Record stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, dir_key)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = format!("{dir_key}{name}");
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    let dir_prefix = format!("{key}/");
                    // only descend where a match is still possible
                    if dir_prefix.starts_with(prefix) || prefix.starts_with(&dir_prefix) {
                        pending.push((entry.path(), dir_prefix));
                    }
                } else if file_type.is_file()
                    && !name.ends_with(TEMP_SUFFIX)
                    && key.starts_with(prefix)
                {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Serialize and store a window record under `prefix`. Returns the key.
pub async fn save_record(
    store: &dyn RecordStore,
    prefix: &str,
    record: &WindowRecord,
) -> Result<String, StorageError> {
    let key = record.key(prefix);
    let body = serde_json::to_vec_pretty(record)?;
    store.put(&key, &body).await?;
    Ok(key)
}

/// Load and parse the record under `key`.
pub async fn load_record(
    store: &dyn RecordStore,
    key: &str,
) -> Result<Option<WindowRecord>, StorageError> {
    match store.get(key).await? {
        Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
        None => Ok(None),
    }
}

/// Most recent record under `prefix`, relying on chronologically sortable keys.
pub async fn latest_record(
    store: &dyn RecordStore,
    prefix: &str,
) -> Result<Option<(String, WindowRecord)>, StorageError> {
    let Some(key) = store.list(prefix).await?.pop() else {
        return Ok(None);
    };
    Ok(load_record(store, &key).await?.map(|record| (key, record)))
}
