//! Core type definitions shared by the catalog and the streaming engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which object of a catalog entry a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// The primary video file.
    Video,
    /// The cover image.
    Cover,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Cover => write!(f, "cover"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "cover" => Ok(Self::Cover),
            _ => Err(format!("Unknown media kind: {}", s)),
        }
    }
}

/// Where the bytes for one request live in the object store.
///
/// Resolved once per request and never shared between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTarget {
    pub bucket: String,
    pub object_key: String,
    pub mime_type: String,
}

impl StreamTarget {
    pub fn new(
        bucket: impl Into<String>,
        object_key: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: object_key.into(),
            mime_type: mime_type.into(),
        }
    }
}
