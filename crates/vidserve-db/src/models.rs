//! Rust models matching the catalog schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vidserve_common::{MediaKind, VideoId};

/// Catalog row for one video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub id: VideoId,
    pub title: String,
    pub creator: String,
    pub description: Option<String>,
    /// Object key of the media file in the video bucket.
    pub video_filename: String,
    pub video_mime_type: String,
    /// Object key of the cover image in the cover bucket.
    pub cover_filename: String,
    pub cover_mime_type: String,
    pub upload_date: DateTime<Utc>,
}

impl VideoMetadata {
    /// Object key and MIME type stored for the given kind of media.
    pub fn object_for(&self, kind: MediaKind) -> (&str, &str) {
        match kind {
            MediaKind::Video => (&self.video_filename, &self.video_mime_type),
            MediaKind::Cover => (&self.cover_filename, &self.cover_mime_type),
        }
    }

    /// Compact representation used in search results.
    pub fn listing(&self) -> VideoListing {
        VideoListing {
            id: self.id.clone(),
            title: self.title.clone(),
            creator: self.creator.clone(),
            upload_date: self.upload_date,
        }
    }
}

/// Search result entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoListing {
    pub id: VideoId,
    pub title: String,
    pub creator: String,
    pub upload_date: DateTime<Utc>,
}

/// One page of query results plus the totals needed to page through them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pages: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, per_page: u32) -> Self {
        let pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(u64::from(per_page))
        };
        Self {
            items,
            total,
            pages,
            page,
            per_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pages: self.pages,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
