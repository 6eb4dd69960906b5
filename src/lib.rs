//! Vidserve - Range-request streaming of videos and covers from object storage
//!
//! This library crate exposes the server components for integration testing.

pub mod catalog;
pub mod config;
pub mod server;
pub mod storage;
pub mod streaming;
