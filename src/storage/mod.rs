//! Object storage gateways.
//!
//! The streaming engine only needs two primitives from a backend: the size of
//! an object and a reader over a byte range of it. [`ObjectStore`] captures
//! that seam; [`S3ObjectStore`] talks to S3-compatible services such as
//! MinIO, [`FsObjectStore`] maps buckets to directories and
//! [`MemoryObjectStore`] backs tests and demos.

mod fs;
mod memory;
mod s3;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::config::{StorageBackend, StorageConfig};

/// Reader over the requested byte range of an object.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Object metadata reported by a stat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
}

/// Errors raised by object store backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object store request failed: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

/// Minimal object store surface used by the streaming engine.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Report the size of an object.
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat, StorageError>;

    /// Open a reader over `[offset, offset + length)` of an object.
    ///
    /// Callers only request ranges inside the size reported by
    /// [`stat`](Self::stat). Dropping the reader releases the underlying
    /// connection or file handle.
    async fn open_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ByteReader, StorageError>;
}

/// Construct the configured backend.
pub async fn build_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::S3 => Arc::new(S3ObjectStore::connect(config).await),
        StorageBackend::Fs => {
            let root = config
                .root
                .as_ref()
                .context("storage.root is required for the fs backend")?;
            Arc::new(FsObjectStore::new(root))
        }
        StorageBackend::Memory => Arc::new(MemoryObjectStore::new()),
    };

    tracing::info!(backend = store.name(), "Object store ready");
    Ok(store)
}
