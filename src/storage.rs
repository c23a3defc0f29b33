//! Storage Capabilities - Blob and Key-Value Stores
//!
//! The core only ever writes blobs and reads/writes the version pointer.
//! Backends: in-memory maps and a plain directory tree.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutOptions {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl PutOptions {
    pub fn content_type(content_type: &str) -> Self {
        Self {
            metadata: BTreeMap::new(),
            content_type: Some(content_type.to_string()),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Write-only object storage. `put` is an upsert.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, value: &str, options: PutOptions) -> Result<(), StorageError>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

// --- In-memory backends ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub value: String,
    pub options: PutOptions,
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.blobs.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, value: &str, options: PutOptions) -> Result<(), StorageError> {
        self.blobs.lock().await.insert(
            key.to_string(),
            StoredBlob { value: value.to_string(), options },
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// --- Filesystem backends ---

const META_SUFFIX: &str = ".meta.json";

/// Resolve a slash-separated key to a path under `root`.
///
/// Rejects empty keys, empty segments, absolute paths and `..`.
fn resolve_key(root: &Path, key: &str) -> Result<PathBuf, StorageError> {
    if key.is_empty() || key.split('/').any(|segment| segment.is_empty()) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let relative = Path::new(key);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(root.join(relative))
}

async fn write_file(path: &Path, contents: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

/// Blobs as files under `root`; options go to a `<key>.meta.json` sidecar.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn read(&self, key: &str) -> Result<Option<StoredBlob>, StorageError> {
        let path = resolve_key(&self.root, key)?;
        let value = match tokio::fs::read_to_string(&path).await {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta_path = resolve_key(&self.root, &format!("{key}{META_SUFFIX}"))?;
        let options = match tokio::fs::read_to_string(&meta_path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PutOptions::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StoredBlob { value, options }))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, value: &str, options: PutOptions) -> Result<(), StorageError> {
        let path = resolve_key(&self.root, key)?;
        let meta_path = resolve_key(&self.root, &format!("{key}{META_SUFFIX}"))?;
        write_file(&path, value).await?;
        write_file(&meta_path, &serde_json::to_string_pretty(&options)?).await?;
        Ok(())
    }
}

/// One file per key under `root`. Keys must be single path segments.
#[derive(Debug, Clone)]
pub struct FsKeyValueStore {
    root: PathBuf,
}

impl FsKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.contains('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        resolve_key(&self.root, key)
    }
}

#[async_trait]
impl KeyValueStore for FsKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        write_file(&path, value).await
    }
}
