//! Vidserve-DB: Catalog schema, migrations, and query operations
//!
//! This crate stores video metadata in SQLite using rusqlite and r2d2
//! connection pooling. It knows nothing about object storage; a catalog row
//! only records which object keys hold a video's media and cover bytes.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use vidserve_db::pool::{init_pool, get_conn};
//! use vidserve_db::queries::videos::{self, NewVideo};
//!
//! let pool = init_pool("/var/lib/vidserve/catalog.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let video = videos::create_video(&conn, &NewVideo::new("Intro", "alice", "intro.mp4", "intro.jpg")).unwrap();
//! println!("Registered video: {}", video.id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
