//! Chunked relay from an object store reader to a response sink.
//!
//! The relay reads at most one chunk ahead of what the sink has accepted:
//! read chunk N, hand it over, then read chunk N+1. Paired with a
//! capacity-1 channel this keeps per-response payload memory at
//! O(chunk size) and lets a slow client throttle the upstream read.

use std::future::Future;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use vidserve_common::StreamTarget;

use super::plan::StreamPlan;
use crate::config::StreamingConfig;
use crate::storage::{ByteReader, ObjectStore, StorageError};

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default per-chunk deadline.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning for a single relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    pub chunk_size: usize,
    /// Deadline applied to every upstream read and every sink write.
    pub chunk_timeout: Option<Duration>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_timeout: Some(DEFAULT_CHUNK_TIMEOUT),
        }
    }
}

impl From<&StreamingConfig> for RelayOptions {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            chunk_timeout: config.chunk_timeout(),
        }
    }
}

/// Counters reported when a relay finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub bytes_sent: u64,
    pub chunks: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream read failed: {0}")]
    Upstream(#[from] StorageError),

    #[error("upstream ended after {delivered} of {expected} bytes")]
    Truncated { expected: u64, delivered: u64 },

    #[error("client disconnected after {0} bytes")]
    Disconnected(u64),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// The receiving side of a sink went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sink closed")]
pub struct SinkClosed;

/// Destination for relayed chunks.
#[async_trait]
pub trait ChunkSink: Send {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed>;

    /// Lets the relay stop before pulling another chunk nobody will read.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Body channel feeding `axum::body::Body::from_stream`.
#[async_trait]
impl ChunkSink for mpsc::Sender<Result<Bytes, io::Error>> {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.send(Ok(chunk)).await.map_err(|_| SinkClosed)
    }

    fn is_closed(&self) -> bool {
        mpsc::Sender::is_closed(self)
    }
}

/// Collects everything in memory. Used by tests and benches.
#[async_trait]
impl ChunkSink for Vec<Bytes> {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.push(chunk);
        Ok(())
    }
}

/// An upstream stream opened for a plan, not yet relayed.
///
/// Opening is split from relaying so the endpoint can still answer with a
/// clean error status when the open fails, before any header is sent.
pub struct OpenRelay {
    reader: ByteReader,
    expected: u64,
    options: RelayOptions,
}

impl std::fmt::Debug for OpenRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRelay")
            .field("expected", &self.expected)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Open one upstream read stream covering exactly `plan.range`.
pub async fn open(
    store: &dyn ObjectStore,
    target: &StreamTarget,
    plan: &StreamPlan,
    options: RelayOptions,
) -> Result<OpenRelay, RelayError> {
    let reader: ByteReader = match plan.range {
        Some(range) => {
            let fut = store.open_range(&target.bucket, &target.object_key, range.start, range.len());
            with_deadline(options.chunk_timeout, "upstream open", fut).await??
        }
        None => Box::new(tokio::io::empty()),
    };

    Ok(OpenRelay {
        reader,
        expected: plan.content_length,
        options,
    })
}

impl OpenRelay {
    /// Planned byte count.
    pub fn expected(&self) -> u64 {
        self.expected
    }

    /// Pump the stream into `sink` until the planned bytes are delivered.
    ///
    /// The upstream reader is dropped when this returns, on every path.
    pub async fn run<S>(mut self, sink: &mut S) -> Result<RelayStats, RelayError>
    where
        S: ChunkSink + ?Sized,
    {
        let chunk_size = self.options.chunk_size.max(1) as u64;
        let timeout = self.options.chunk_timeout;
        let mut stats = RelayStats::default();

        while stats.bytes_sent < self.expected {
            if sink.is_closed() {
                return Err(RelayError::Disconnected(stats.bytes_sent));
            }

            let want = (self.expected - stats.bytes_sent).min(chunk_size) as usize;
            let chunk = with_deadline(timeout, "upstream read", read_chunk(&mut self.reader, want))
                .await?
                .map_err(StorageError::Io)?;

            if chunk.is_empty() {
                return Err(RelayError::Truncated {
                    expected: self.expected,
                    delivered: stats.bytes_sent,
                });
            }

            let len = chunk.len() as u64;
            with_deadline(timeout, "client write", sink.send_chunk(chunk))
                .await?
                .map_err(|SinkClosed| RelayError::Disconnected(stats.bytes_sent))?;

            stats.bytes_sent += len;
            stats.chunks += 1;
        }

        Ok(stats)
    }
}

/// Open and relay in one step.
pub async fn relay<S>(
    store: &dyn ObjectStore,
    target: &StreamTarget,
    plan: &StreamPlan,
    options: RelayOptions,
    sink: &mut S,
) -> Result<RelayStats, RelayError>
where
    S: ChunkSink + ?Sized,
{
    open(store, target, plan, options).await?.run(sink).await
}

/// Read up to `want` bytes, stopping early only at end of stream.
async fn read_chunk(reader: &mut ByteReader, want: usize) -> io::Result<Bytes> {
    let mut buf = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}

async fn with_deadline<F>(
    timeout: Option<Duration>,
    stage: &'static str,
    fut: F,
) -> Result<F::Output, RelayError>
where
    F: Future,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RelayError::Timeout(stage)),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryObjectStore, ObjectStat};
    use crate::streaming::plan::plan;
    use crate::streaming::range::ByteRange;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn target() -> StreamTarget {
        StreamTarget::new("video-files", "clip.mp4", "video/mp4")
    }

    fn options(chunk_size: usize) -> RelayOptions {
        RelayOptions {
            chunk_size,
            chunk_timeout: Some(Duration::from_secs(5)),
        }
    }

    fn concat(chunks: &[Bytes]) -> Vec<u8> {
        chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }

    #[tokio::test]
    async fn test_full_round_trip() {
        let data = sample(10_000);
        let store = MemoryObjectStore::new();
        store.insert("video-files", "clip.mp4", data.clone());

        let mut sink: Vec<Bytes> = Vec::new();
        let stats = relay(&store, &target(), &plan(None, 10_000), options(4096), &mut sink)
            .await
            .unwrap();

        assert_eq!(concat(&sink), data);
        assert_eq!(stats.bytes_sent, 10_000);
        assert_eq!(stats.chunks, 3);
        assert_eq!(store.open_calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_round_trip() {
        let data = sample(1000);
        let store = MemoryObjectStore::new();
        store.insert("video-files", "clip.mp4", data.clone());

        let p = plan(Some(ByteRange { start: 500, end: 699 }), 1000);
        let mut sink: Vec<Bytes> = Vec::new();
        let stats = relay(&store, &target(), &p, options(64), &mut sink)
            .await
            .unwrap();

        assert_eq!(concat(&sink), &data[500..700]);
        assert_eq!(stats.bytes_sent, 200);
    }

    #[tokio::test]
    async fn test_chunks_never_exceed_chunk_size() {
        let store = MemoryObjectStore::new();
        store.insert("video-files", "clip.mp4", sample(1000));

        let mut sink: Vec<Bytes> = Vec::new();
        relay(&store, &target(), &plan(None, 1000), options(128), &mut sink)
            .await
            .unwrap();

        assert!(sink.iter().all(|c| !c.is_empty() && c.len() <= 128));
        assert_eq!(sink.len(), 8);
    }

    #[tokio::test]
    async fn test_empty_plan_skips_upstream() {
        let store = MemoryObjectStore::new();
        let mut sink: Vec<Bytes> = Vec::new();
        let stats = relay(&store, &target(), &plan(None, 0), options(16), &mut sink)
            .await
            .unwrap();

        assert_eq!(stats, RelayStats::default());
        assert!(sink.is_empty());
        assert_eq!(store.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_is_upstream_error() {
        let store = MemoryObjectStore::new();
        let err = open(&store, &target(), &plan(None, 10), options(16))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Upstream(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_mid_stream_failure() {
        let store = MemoryObjectStore::new();
        store.insert_faulty("video-files", "clip.mp4", sample(1000), 300);

        let mut sink: Vec<Bytes> = Vec::new();
        let err = relay(&store, &target(), &plan(None, 1000), options(100), &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Upstream(StorageError::Io(_))));
        assert_eq!(concat(&sink).len(), 300);
    }

    #[tokio::test]
    async fn test_short_object_is_truncated() {
        let store = MemoryObjectStore::new();
        store.insert("video-files", "clip.mp4", sample(50));

        // Stat claimed 100 bytes; the object only has 50.
        let mut sink: Vec<Bytes> = Vec::new();
        let err = relay(&store, &target(), &plan(None, 100), options(32), &mut sink)
            .await
            .unwrap_err();

        match err {
            RelayError::Truncated { expected, delivered } => {
                assert_eq!(expected, 100);
                assert_eq!(delivered, 50);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_channel_stops_relay() {
        let store = MemoryObjectStore::new();
        store.insert("video-files", "clip.mp4", sample(1000));

        let (mut tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(1);
        drop(rx);

        let err = relay(&store, &target(), &plan(None, 1000), options(100), &mut tx)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Disconnected(0)));
    }

    #[tokio::test]
    async fn test_disconnect_mid_stream() {
        let store = MemoryObjectStore::new();
        store.insert("video-files", "clip.mp4", sample(1000));

        let (mut tx, mut rx) = mpsc::channel::<Result<Bytes, io::Error>>(1);
        let consumer = tokio::spawn(async move {
            let first = rx.recv().await;
            drop(rx);
            first
        });

        let err = relay(&store, &target(), &plan(None, 1000), options(100), &mut tx)
            .await
            .unwrap_err();

        let first = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(first.len(), 100);
        match err {
            RelayError::Disconnected(sent) => assert!(sent <= 200),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Reader that never yields.
    struct Stalled;

    impl AsyncRead for Stalled {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    /// Reader that tallies every byte pulled from upstream.
    struct Counting {
        inner: ByteReader,
        pulled: Arc<AtomicU64>,
    }

    impl AsyncRead for Counting {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let before = buf.filled().len();
            let res = Pin::new(&mut self.inner).poll_read(cx, buf);
            let read = (buf.filled().len() - before) as u64;
            self.pulled.fetch_add(read, Ordering::SeqCst);
            res
        }
    }

    enum Behaviour {
        Stall,
        Count(Arc<AtomicU64>),
    }

    struct ScriptedStore {
        inner: MemoryObjectStore,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectStat, StorageError> {
            self.inner.stat(bucket, key).await
        }

        async fn open_range(
            &self,
            bucket: &str,
            key: &str,
            offset: u64,
            length: u64,
        ) -> Result<ByteReader, StorageError> {
            match &self.behaviour {
                Behaviour::Stall => Ok(Box::new(Stalled)),
                Behaviour::Count(pulled) => {
                    let inner = self.inner.open_range(bucket, key, offset, length).await?;
                    Ok(Box::new(Counting {
                        inner,
                        pulled: pulled.clone(),
                    }))
                }
            }
        }
    }

    /// Sink asserting upstream never runs more than one chunk ahead.
    struct ReadAheadProbe {
        pulled: Arc<AtomicU64>,
        delivered: u64,
        chunk_size: u64,
        max_ahead: u64,
    }

    #[async_trait]
    impl ChunkSink for ReadAheadProbe {
        async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
            let ahead = self.pulled.load(Ordering::SeqCst) - self.delivered;
            self.max_ahead = self.max_ahead.max(ahead);
            assert!(ahead <= self.chunk_size, "read {ahead} bytes ahead of the client");
            self.delivered += chunk.len() as u64;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reads_at_most_one_chunk_ahead() {
        let pulled = Arc::new(AtomicU64::new(0));
        let inner = MemoryObjectStore::new();
        inner.insert("video-files", "clip.mp4", sample(5000));
        let store = ScriptedStore {
            inner,
            behaviour: Behaviour::Count(pulled.clone()),
        };

        let mut probe = ReadAheadProbe {
            pulled,
            delivered: 0,
            chunk_size: 512,
            max_ahead: 0,
        };
        let stats = relay(&store, &target(), &plan(None, 5000), options(512), &mut probe)
            .await
            .unwrap();

        assert_eq!(stats.bytes_sent, 5000);
        assert_eq!(probe.delivered, 5000);
        assert_eq!(probe.max_ahead, 512);
    }

    #[tokio::test]
    async fn test_stalled_upstream_times_out() {
        let store = ScriptedStore {
            inner: MemoryObjectStore::new(),
            behaviour: Behaviour::Stall,
        };
        let opts = RelayOptions {
            chunk_size: 64,
            chunk_timeout: Some(Duration::from_millis(20)),
        };

        let mut sink: Vec<Bytes> = Vec::new();
        let err = relay(&store, &target(), &plan(None, 100), opts, &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout("upstream read")));
    }

    #[tokio::test]
    async fn test_stalled_client_times_out() {
        let store = MemoryObjectStore::new();
        store.insert("video-files", "clip.mp4", sample(300));
        let opts = RelayOptions {
            chunk_size: 100,
            chunk_timeout: Some(Duration::from_millis(20)),
        };

        // Capacity 1 and nobody reading: the second send blocks.
        let (mut tx, _rx) = mpsc::channel::<Result<Bytes, io::Error>>(1);
        let err = relay(&store, &target(), &plan(None, 300), opts, &mut tx)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout("client write")));
    }

    #[test]
    fn test_options_from_config() {
        let config = StreamingConfig {
            chunk_size: 4096,
            chunk_timeout_secs: 0,
        };
        let opts = RelayOptions::from(&config);
        assert_eq!(opts.chunk_size, 4096);
        assert_eq!(opts.chunk_timeout, None);
        assert_eq!(RelayOptions::default().chunk_size, 1024 * 1024);
    }
}
