//! Range-request streaming of catalog media.
//!
//! # Routes
//!
//! - `GET|HEAD /video/stream/{video_id}` - Primary media, range-aware
//! - `GET|HEAD /cover/{video_id}` - Cover image, range-aware
//!
//! # Pipeline
//!
//! - [`range`] parses a `Range` header against the object size
//! - [`plan`] decides 200 vs 206 and the framing headers
//! - [`relay`] moves bytes from the object store to the client in chunks
//! - [`endpoint`] wires them together behind the HTTP handlers

pub mod endpoint;
pub mod plan;
pub mod range;
pub mod relay;

pub use endpoint::{stream_cover, stream_video, StreamError, StreamingEndpoint};
pub use plan::{plan, PlanStatus, StreamPlan};
pub use range::{parse_range, ByteRange, RangeError};
pub use relay::{relay, ChunkSink, OpenRelay, RelayError, RelayOptions, RelayStats, SinkClosed};

use axum::{routing::get, Router};

use crate::server::AppContext;

/// Create the media streaming router.
pub fn stream_router() -> Router<AppContext> {
    Router::new()
        .route("/video/stream/:video_id", get(stream_video))
        .route("/cover/:video_id", get(stream_cover))
}
