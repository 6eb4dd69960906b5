//! In-memory backend with call accounting and fault injection.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::io::{AsyncRead, ReadBuf};

use super::{ByteReader, ObjectStat, ObjectStore, StorageError};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    /// Absolute object offset at which reads start failing.
    fail_at: Option<u64>,
}

/// Objects held in a map keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    stat_calls: AtomicUsize,
    open_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any previous value.
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.objects.write().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                fail_at: None,
            },
        );
    }

    /// Store an object whose readers error once they reach `fail_at`.
    pub fn insert_faulty(&self, bucket: &str, key: &str, data: impl Into<Bytes>, fail_at: u64) {
        self.objects.write().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                fail_at: Some(fail_at),
            },
        );
    }

    /// Number of `stat` calls served so far.
    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::Relaxed)
    }

    /// Number of `open_range` calls served so far.
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::Relaxed)
    }

    fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat, StorageError> {
        self.stat_calls.fetch_add(1, Ordering::Relaxed);
        let object = self.get(bucket, key)?;
        Ok(ObjectStat {
            size: object.data.len() as u64,
        })
    }

    async fn open_range(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ByteReader, StorageError> {
        self.open_calls.fetch_add(1, Ordering::Relaxed);
        let object = self.get(bucket, key)?;

        let size = object.data.len() as u64;
        let start = offset.min(size);
        let end = offset.saturating_add(length).min(size);
        // Bytes::slice is a refcount bump; nothing is copied here.
        let data = object.data.slice(start as usize..end as usize);
        let fail_after = object.fail_at.map(|at| at.saturating_sub(start));

        Ok(Box::new(SliceReader {
            data,
            pos: 0,
            fail_after,
        }))
    }
}

/// Reader over a shared slice, optionally failing part way through.
struct SliceReader {
    data: Bytes,
    pos: usize,
    fail_after: Option<u64>,
}

impl AsyncRead for SliceReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut end = self.data.len();
        if let Some(limit) = self.fail_after {
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            if self.pos >= limit {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "injected object store failure",
                )));
            }
            end = end.min(limit);
        }

        let n = (end - self.pos).min(buf.remaining());
        let pos = self.pos;
        buf.put_slice(&self.data[pos..pos + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}
