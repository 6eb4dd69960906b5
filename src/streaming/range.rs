//! HTTP `Range` header parsing.
//!
//! Only the single-range form `bytes=<start>-<end?>` is served. Suffix ranges
//! (`bytes=-500`) and multi-range requests are refused; an end past the last
//! byte is clamped rather than rejected.

/// Inclusive byte interval `[start, end]` inside an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// The whole of a non-empty object.
    pub fn full(total_size: u64) -> Option<Self> {
        total_size.checked_sub(1).map(|end| Self { start: 0, end })
    }
}

/// Why a `Range` header cannot be served. Both map to 416.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("multiple byte ranges are not supported")]
    Unsupported,

    #[error("malformed or unsatisfiable byte range")]
    Invalid,
}

/// Parse a `Range` header against an object of `total_size` bytes.
///
/// Returns `Ok(None)` when no header was sent.
pub fn parse_range(header: Option<&str>, total_size: u64) -> Result<Option<ByteRange>, RangeError> {
    let Some(header) = header else {
        return Ok(None);
    };

    let header = header.trim();
    let ranges = match header.split_once('=') {
        Some((unit, ranges)) if unit.trim().eq_ignore_ascii_case("bytes") => ranges,
        _ => return Err(RangeError::Invalid),
    };

    if ranges.contains(',') {
        return Err(RangeError::Unsupported);
    }

    let (start, end) = ranges.split_once('-').ok_or(RangeError::Invalid)?;
    let start = parse_position(start.trim()).ok_or(RangeError::Invalid)?;
    let end = match end.trim() {
        "" => None,
        end => Some(parse_position(end).ok_or(RangeError::Invalid)?),
    };

    let last = total_size.checked_sub(1).ok_or(RangeError::Invalid)?;
    if start > last {
        return Err(RangeError::Invalid);
    }

    let end = end.map_or(last, |end| end.min(last));
    if start > end {
        return Err(RangeError::Invalid);
    }

    Ok(Some(ByteRange { start, end }))
}

/// Digits only; values beyond `u64::MAX` saturate so an absurd end still clamps.
fn parse_position(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(s.parse().unwrap_or(u64::MAX))
}
