//! Serving plan: status, interval and framing headers for one response.

use axum::http::StatusCode;

use super::range::ByteRange;

/// Whether the response carries the whole object or a slice of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Full,
    Partial,
}

/// What to fetch from the store and how to frame it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPlan {
    pub status: PlanStatus,
    /// Interval to fetch. `None` only for a zero-byte object served in full.
    pub range: Option<ByteRange>,
    pub total_size: u64,
    pub content_length: u64,
}

impl StreamPlan {
    pub fn is_partial(&self) -> bool {
        self.status == PlanStatus::Partial
    }

    pub fn status_code(&self) -> StatusCode {
        match self.status {
            PlanStatus::Full => StatusCode::OK,
            PlanStatus::Partial => StatusCode::PARTIAL_CONTENT,
        }
    }

    /// `Content-Range` value for a partial response.
    pub fn content_range(&self) -> Option<String> {
        match (self.status, self.range) {
            (PlanStatus::Partial, Some(r)) => {
                Some(format!("bytes {}-{}/{}", r.start, r.end, self.total_size))
            }
            _ => None,
        }
    }
}

/// Build the plan for a parsed range (or its absence) against `total_size`.
pub fn plan(parsed: Option<ByteRange>, total_size: u64) -> StreamPlan {
    match parsed {
        Some(range) => StreamPlan {
            status: PlanStatus::Partial,
            range: Some(range),
            total_size,
            content_length: range.len(),
        },
        None => {
            let range = ByteRange::full(total_size);
            StreamPlan {
                status: PlanStatus::Full,
                range,
                total_size,
                content_length: range.map_or(0, |r| r.len()),
            }
        }
    }
}

/// `Content-Range` value sent with a 416.
pub fn unsatisfiable_range(total_size: u64) -> String {
    format!("bytes */{total_size}")
}
