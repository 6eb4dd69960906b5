//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory catalog, an in-memory
//! object store, default config and a full [`AppContext`]. The
//! [`TestHarness::with_server`] constructor starts Axum on a random port for
//! socket-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use tower::ServiceExt;

use vidserve::config::Config;
use vidserve::server::{create_router, AppContext};
use vidserve::storage::MemoryObjectStore;
use vidserve_common::VideoId;
use vidserve_db::pool::{get_conn, init_memory_pool, DbPool};
use vidserve_db::queries::videos::{self, NewVideo};

/// Test harness wrapping a fully-constructed [`AppContext`] backed by an
/// in-memory database and object store.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub store: Arc<MemoryObjectStore>,
}

/// Status, headers and collected body of one response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }
}

impl TestHarness {
    /// Create a new harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration.
    pub fn with_config(config: Config) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let store = Arc::new(MemoryObjectStore::new());
        let ctx = AppContext::new(config, db.clone(), store.clone());
        Self { ctx, db, store }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    pub fn video_bucket(&self) -> &str {
        &self.ctx.config.storage.video_bucket
    }

    pub fn cover_bucket(&self) -> &str {
        &self.ctx.config.storage.cover_bucket
    }

    /// Register a catalog row and store its media and cover objects.
    pub fn add_video(&self, title: &str, video_key: &str, video: &[u8], cover_key: &str, cover: &[u8]) -> VideoId {
        self.store.insert(self.video_bucket(), video_key, video.to_vec());
        self.store.insert(self.cover_bucket(), cover_key, cover.to_vec());
        self.insert_row(NewVideo::new(title, "tester", video_key, cover_key))
    }

    /// Register a catalog row without touching the object store.
    pub fn insert_row(&self, new: NewVideo) -> VideoId {
        let conn = get_conn(&self.db).expect("failed to get connection");
        videos::create_video(&conn, &new)
            .expect("failed to create video")
            .id
    }

    /// Send a request through the router and collect the whole response.
    pub async fn request(&self, method: Method, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, &[]).await
    }

    pub async fn get_range(&self, uri: &str, range: &str) -> TestResponse {
        self.request(Method::GET, uri, &[("range", range)]).await
    }
}

/// Deterministic, non-repeating-looking payload.
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 256) as u8).collect()
}
