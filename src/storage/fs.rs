//! Local filesystem backend: `<root>/<bucket>/<key>`.

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{ByteReader, ObjectStat, ObjectStore, StorageError};

/// Serves objects from a directory tree, one sub-directory per bucket.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path, refusing anything that could escape the root.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let rel = Path::new(part);
            if part.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(StorageError::InvalidKey(format!("{bucket}/{key}")));
            }
            path.push(rel);
        }
        Ok(path)
    }
}

fn map_io(err: std::io::Error, bucket: &str, key: &str) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::not_found(bucket, key)
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat, StorageError> {
        let path = self.object_path(bucket, key)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io(e, bucket, key))?;

        if !metadata.is_file() {
            return Err(StorageError::not_found(bucket, key));
        }
        Ok(ObjectStat {
            size: metadata.len(),
        })
    }

    async fn open_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ByteReader, StorageError> {
        let path = self.object_path(bucket, key)?;
        let mut file = File::open(&path)
            .await
            .map_err(|e| map_io(e, bucket, key))?;

        file.seek(SeekFrom::Start(offset)).await?;
        Ok(Box::new(file.take(length)))
    }
}
