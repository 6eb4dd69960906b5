//! Resolution of catalog ids to object store locations.

use async_trait::async_trait;
use vidserve_common::{Error, MediaKind, Result, StreamTarget, VideoId};
use vidserve_db::pool::{get_conn, DbPool};
use vidserve_db::queries::videos;

use crate::config::StorageConfig;

/// Maps a video id and media kind to the object holding its bytes.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// `Ok(None)` when the catalog has no such video.
    async fn resolve(&self, id: &VideoId, kind: MediaKind) -> Result<Option<StreamTarget>>;
}

/// Lookup backed by the SQLite catalog.
#[derive(Clone)]
pub struct CatalogLookup {
    pool: DbPool,
    video_bucket: String,
    cover_bucket: String,
}

impl CatalogLookup {
    pub fn new(pool: DbPool, video_bucket: impl Into<String>, cover_bucket: impl Into<String>) -> Self {
        Self {
            pool,
            video_bucket: video_bucket.into(),
            cover_bucket: cover_bucket.into(),
        }
    }

    pub fn from_config(pool: DbPool, storage: &StorageConfig) -> Self {
        Self::new(pool, &storage.video_bucket, &storage.cover_bucket)
    }

    fn bucket_for(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Video => &self.video_bucket,
            MediaKind::Cover => &self.cover_bucket,
        }
    }
}

#[async_trait]
impl MetadataLookup for CatalogLookup {
    async fn resolve(&self, id: &VideoId, kind: MediaKind) -> Result<Option<StreamTarget>> {
        let pool = self.pool.clone();
        let lookup_id = id.clone();
        let video = tokio::task::spawn_blocking(move || {
            let conn = get_conn(&pool)?;
            videos::get_video(&conn, &lookup_id)
        })
        .await
        .map_err(|e| Error::internal(format!("catalog lookup task failed: {e}")))??;

        Ok(video.map(|video| {
            let (key, mime_type) = video.object_for(kind);
            StreamTarget::new(self.bucket_for(kind), key, mime_type)
        }))
    }
}
