//! Object store port consumed by the artifact publisher.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("object store rejected the write: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn rejected(err: impl std::fmt::Display) -> Self {
        Self::Rejected(err.to_string())
    }
}

/// Metadata describing an object after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub checksum: String,
    pub size_bytes: u64,
}

/// Narrow write-only view of the artifact store.
///
/// Objects are publicly readable once `put` returns. Writes are not read back.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StoreError>;
}
