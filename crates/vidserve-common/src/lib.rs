//! Vidserve-Common: Shared types, identifiers, and errors.
//!
//! This crate provides common functionality used across vidserve:
//!
//! - **Typed IDs**: [`VideoId`], the opaque catalog identifier
//! - **Core Types**: [`MediaKind`] and [`StreamTarget`]
//! - **Error Handling**: Common error type and result alias
//!
//! # Examples
//!
//! ```
//! use vidserve_common::{Error, MediaKind, Result, VideoId};
//!
//! let id = VideoId::from("intro-2024");
//! assert_eq!(id.as_str(), "intro-2024");
//! assert_eq!(MediaKind::Cover.to_string(), "cover");
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("video"))
//! }
//! assert!(example().is_err());
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
