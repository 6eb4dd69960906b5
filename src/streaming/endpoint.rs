//! Range-aware HTTP responses for catalog media.
//!
//! A request flows resolve → stat → parse/plan → relay. Everything up to the
//! relay can still fail with a proper status code; once headers are out, an
//! upstream failure can only abort the connection.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;
use vidserve_common::{MediaKind, StreamTarget, VideoId};

use super::plan::{plan, unsatisfiable_range, StreamPlan};
use super::range::{parse_range, RangeError};
use super::relay::{self, OpenRelay, RelayError, RelayOptions};
use crate::catalog::MetadataLookup;
use crate::server::AppContext;
use crate::storage::{ObjectStore, StorageError};

/// Failures that end a streaming request before the body starts.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("video not found: {0}")]
    NotFound(VideoId),

    #[error("stat failed for {bucket}/{key}: {source}")]
    Stat {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("{reason} (object size {total_size})")]
    Range { reason: RangeError, total_size: u64 },

    #[error("catalog lookup failed: {0}")]
    Lookup(#[from] vidserve_common::Error),

    #[error("failed to open upstream stream: {0}")]
    Open(RelayError),

    #[error("failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl StreamError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Range { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Stat { .. } | Self::Lookup(_) | Self::Open(_) | Self::Response(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::NotFound(id) => {
                tracing::debug!(video_id = %id, "Unknown video requested");
                (status, Json(json!({ "error": "Video not found." }))).into_response()
            }
            Self::Range { total_size, .. } => {
                tracing::debug!(error = %self, "Unsatisfiable range");
                (
                    status,
                    [(header::CONTENT_RANGE, unsatisfiable_range(*total_size))],
                )
                    .into_response()
            }
            Self::Stat { .. } => {
                tracing::error!(error = %self, "Catalog entry points at an unavailable object");
                (
                    status,
                    Json(json!({ "error": "Media object unavailable in storage." })),
                )
                    .into_response()
            }
            _ => {
                tracing::error!(error = %self, "Streaming request failed");
                (status, Json(json!({ "error": "Internal server error." }))).into_response()
            }
        }
    }
}

/// Serves the video and cover objects behind catalog ids.
pub struct StreamingEndpoint {
    lookup: Arc<dyn MetadataLookup>,
    store: Arc<dyn ObjectStore>,
    options: RelayOptions,
}

impl StreamingEndpoint {
    pub fn new(
        lookup: Arc<dyn MetadataLookup>,
        store: Arc<dyn ObjectStore>,
        options: RelayOptions,
    ) -> Self {
        Self {
            lookup,
            store,
            options,
        }
    }

    pub fn options(&self) -> RelayOptions {
        self.options
    }

    /// Build the response for one request.
    ///
    /// `HEAD` gets the same status and headers as `GET` without touching the
    /// object body.
    pub async fn handle(
        &self,
        video_id: &VideoId,
        kind: MediaKind,
        range_header: Option<&str>,
        method: &Method,
    ) -> Result<Response, StreamError> {
        let target = self
            .lookup
            .resolve(video_id, kind)
            .await?
            .ok_or_else(|| StreamError::NotFound(video_id.clone()))?;

        let stat = self
            .store
            .stat(&target.bucket, &target.object_key)
            .await
            .map_err(|source| StreamError::Stat {
                bucket: target.bucket.clone(),
                key: target.object_key.clone(),
                source,
            })?;

        let parsed = parse_range(range_header, stat.size).map_err(|reason| StreamError::Range {
            reason,
            total_size: stat.size,
        })?;
        let plan = plan(parsed, stat.size);

        tracing::debug!(
            video_id = %video_id,
            kind = %kind,
            status = plan.status_code().as_u16(),
            range = ?plan.range,
            total_size = plan.total_size,
            "Serving media"
        );

        let response = response_head(&target, &plan);
        if *method == Method::HEAD || plan.content_length == 0 {
            return Ok(response.body(Body::empty())?);
        }

        let relay = relay::open(self.store.as_ref(), &target, &plan, self.options)
            .await
            .map_err(StreamError::Open)?;

        let (tx, rx) = mpsc::channel(1);
        let span = tracing::debug_span!(
            "relay",
            video_id = %video_id,
            kind = %kind,
            backend = self.store.name(),
        );
        tokio::spawn(pump(relay, tx, self.options.chunk_timeout).instrument(span));

        Ok(response.body(Body::from_stream(ReceiverStream::new(rx)))?)
    }
}

/// Status and framing headers for a plan.
fn response_head(target: &StreamTarget, plan: &StreamPlan) -> axum::http::response::Builder {
    let content_type = HeaderValue::from_str(&target.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut builder = Response::builder()
        .status(plan.status_code())
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, plan.content_length)
        .header(header::CONTENT_DISPOSITION, content_disposition(&target.object_key))
        .header(header::ACCEPT_RANGES, "bytes");

    if let Some(content_range) = plan.content_range() {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    builder
}

/// `inline; filename=<key>` with bytes a header cannot carry replaced.
fn content_disposition(object_key: &str) -> String {
    let filename: String = object_key
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    format!("inline; filename={filename}")
}

/// Drive the relay into the body channel, aborting the body on failure.
async fn pump(
    relay: OpenRelay,
    mut tx: mpsc::Sender<Result<Bytes, io::Error>>,
    timeout: Option<Duration>,
) {
    let expected = relay.expected();
    match relay.run(&mut tx).await {
        Ok(stats) => {
            tracing::debug!(bytes = stats.bytes_sent, chunks = stats.chunks, "Relay complete");
        }
        Err(RelayError::Disconnected(sent)) => {
            tracing::warn!(bytes_sent = sent, expected, "Client disconnected mid-stream");
        }
        Err(e) => {
            tracing::warn!(error = %e, expected, "Aborting stream");
            // An error item makes hyper drop the connection instead of ending
            // the body short of its Content-Length.
            let abort = tx.send(Err(io::Error::other(e.to_string())));
            match timeout {
                Some(limit) => {
                    let _ = tokio::time::timeout(limit, abort).await;
                }
                None => {
                    let _ = abort.await;
                }
            }
        }
    }
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    // A non-ASCII Range value cannot be a byte range; surface it as malformed.
    headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or(""))
}

async fn serve(
    ctx: &AppContext,
    video_id: String,
    kind: MediaKind,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    let video_id = VideoId::from(video_id);
    ctx.streaming
        .handle(&video_id, kind, range_header(&headers), &method)
        .await
}

/// `GET|HEAD /video/stream/:video_id`
pub async fn stream_video(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    serve(&ctx, video_id, MediaKind::Video, method, headers).await
}

/// `GET|HEAD /cover/:video_id`
pub async fn stream_cover(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    serve(&ctx, video_id, MediaKind::Cover, method, headers).await
}
