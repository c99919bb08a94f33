//! Object store adapters: a rooted directory on disk and an in-memory map.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

use crate::application::store::{ObjectStore, StoreError, StoredObject};

/// Filesystem-backed object store.
///
/// The directory is expected to be served as-is by a static file server at
/// the configured public base URL; content types follow the file extension.
#[derive(Debug)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the absolute filesystem path for a key.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        if key.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StoreError> {
        let absolute = self.resolve(key)?;
        let parent = absolute
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent).await?;

        // Readers never observe a half-written object.
        let staging = parent.join(format!(".{}.partial", Uuid::new_v4()));
        if let Err(err) = write_staged(&staging, &body).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&staging, &absolute).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::Io(err));
        }

        let stored = StoredObject {
            key: key.to_string(),
            checksum: checksum(&body),
            size_bytes: body.len() as u64,
        };

        debug!(
            target = "signoff::storage",
            key = key,
            content_type = content_type,
            size_bytes = stored.size_bytes,
            "object written"
        );

        Ok(stored)
    }
}

async fn write_staged(path: &Path, body: &[u8]) -> Result<(), std::io::Error> {
    let mut file = fs::File::create(path).await?;
    file.write_all(body).await?;
    file.flush().await
}

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub body: Bytes,
    pub content_type: String,
}

/// In-process object store for demos and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, MemoryObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<MemoryObject> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StoreError> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let stored = StoredObject {
            key: key.to_string(),
            checksum: checksum(&body),
            size_bytes: body.len() as u64,
        };

        let mut objects = self
            .objects
            .write()
            .map_err(|_| StoreError::rejected("memory store lock poisoned"))?;
        objects.insert(
            key.to_string(),
            MemoryObject {
                body,
                content_type: content_type.to_string(),
            },
        );

        Ok(stored)
    }
}

fn checksum(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
