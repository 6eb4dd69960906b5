//! Database query modules.
//!
//! - videos: video catalog CRUD and filtered search

pub mod videos;
